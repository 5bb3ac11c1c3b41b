//! Synthetic input generation
//!
//! Each simulated client plays one entity of one match and emits one command per
//! tick, counting up from zero, with a uniformly random action. Clients are seeded
//! by id, so a roster always produces the same streams.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Action, Command, CommandSource};

pub struct SimulatedClient {
    client_id: u32,
    match_id: u32,
    entity_id: u32,
    total_inputs: u32,
    next_tick: u32,
    rng: StdRng,
}

impl SimulatedClient {
    pub fn new(client_id: u32, match_id: u32, entity_id: u32, total_inputs: u32) -> Self {
        Self {
            client_id,
            match_id,
            entity_id,
            total_inputs,
            next_tick: 0,
            rng: StdRng::seed_from_u64(client_id as u64),
        }
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    pub fn match_id(&self) -> u32 {
        self.match_id
    }

    pub fn entity_id(&self) -> u32 {
        self.entity_id
    }

    pub fn total_inputs(&self) -> u32 {
        self.total_inputs
    }

    /// Inputs not yet generated.
    pub fn remaining(&self) -> u32 {
        self.total_inputs - self.next_tick
    }

    /// Generates the rest of this client's stream in one go.
    pub fn generate_all(&mut self) -> Vec<Command> {
        self.next_batch(self.remaining() as usize)
    }
}

impl CommandSource for SimulatedClient {
    fn next_batch(&mut self, max: usize) -> Vec<Command> {
        let count = (max as u64).min(self.remaining() as u64) as u32;
        let end = self.next_tick + count;

        let batch = (self.next_tick..end)
            .map(|tick| {
                let action = Action::ALL[self.rng.gen_range(0..Action::ALL.len())];
                Command::new(self.match_id, self.entity_id, tick, action)
            })
            .collect();

        self.next_tick = end;
        batch
    }

    fn is_finished(&self) -> bool {
        self.next_tick >= self.total_inputs
    }
}

/// The full set of simulated clients for a run.
///
/// Client `i` plays entity `i mod 2` of match `(i / 2) mod matches`, so
/// consecutive clients pair up into matches and surplus clients wrap around.
pub struct ClientRoster {
    clients: Vec<SimulatedClient>,
}

impl ClientRoster {
    pub fn new(num_clients: usize, num_matches: usize, inputs_per_client: u32) -> Self {
        let num_matches = num_matches.max(1);
        let clients = (0..num_clients)
            .map(|i| {
                let match_id = (i / 2) % num_matches;
                SimulatedClient::new(i as u32, match_id as u32, (i % 2) as u32, inputs_per_client)
            })
            .collect();

        debug!(
            "Created {} clients across {} matches ({} inputs each)",
            num_clients, num_matches, inputs_per_client
        );
        Self { clients }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn total_inputs(&self) -> usize {
        self.clients
            .iter()
            .map(|client| client.total_inputs() as usize)
            .sum()
    }

    /// Every client's complete stream, concatenated client by client.
    ///
    /// Within a match the second entity's whole stream follows the first's, so
    /// by the time it is processed each of its commands is late.
    pub fn all_commands(&self) -> Vec<Command> {
        let mut commands = Vec::with_capacity(self.total_inputs());
        for client in &self.clients {
            let mut fresh = SimulatedClient::new(
                client.client_id(),
                client.match_id(),
                client.entity_id(),
                client.total_inputs(),
            );
            commands.extend(fresh.generate_all());
        }
        commands
    }

    /// Hands the clients over as command sources for a streaming run.
    pub fn into_clients(self) -> Vec<SimulatedClient> {
        self.clients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_emits_consecutive_ticks() {
        let mut client = SimulatedClient::new(3, 1, 1, 10);

        let first = client.next_batch(4);
        let rest = client.next_batch(100);

        assert_eq!(first.len(), 4);
        assert_eq!(rest.len(), 6);
        assert!(client.is_finished());
        assert!(client.next_batch(5).is_empty());

        let ticks: Vec<u32> = first.iter().chain(&rest).map(|c| c.tick).collect();
        assert_eq!(ticks, (0..10).collect::<Vec<_>>());
        assert!(first
            .iter()
            .all(|c| c.match_id == 1 && c.entity_id == 1));
    }

    #[test]
    fn test_same_seed_same_stream() {
        let a = SimulatedClient::new(7, 0, 0, 200).generate_all();
        let mut b = SimulatedClient::new(7, 0, 0, 200);
        let mut streamed = Vec::new();
        while !b.is_finished() {
            streamed.extend(b.next_batch(13));
        }

        assert_eq!(a, streamed);
        assert_ne!(a, SimulatedClient::new(8, 0, 0, 200).generate_all());
    }

    #[test]
    fn test_roster_assignment() {
        let roster = ClientRoster::new(6, 2, 5);
        let clients = roster.into_clients();

        let assignment: Vec<(u32, u32)> = clients
            .iter()
            .map(|c| (c.match_id(), c.entity_id()))
            .collect();
        assert_eq!(
            assignment,
            vec![(0, 0), (0, 1), (1, 0), (1, 1), (0, 0), (0, 1)]
        );
    }

    #[test]
    fn test_all_commands_concatenated_per_client() {
        let roster = ClientRoster::new(4, 2, 3);
        let commands = roster.all_commands();

        assert_eq!(roster.total_inputs(), 12);
        assert_eq!(commands.len(), 12);
        assert_eq!(
            commands.iter().map(|c| c.tick).collect::<Vec<_>>(),
            vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0, 1, 2]
        );
        assert_eq!(commands[3].entity_id, 1);
        assert_eq!(commands[6].match_id, 1);
        assert_eq!(roster.all_commands(), commands);
    }
}
