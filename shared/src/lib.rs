use serde::{Deserialize, Serialize};

pub const ARENA_WIDTH: i32 = 20;
pub const ARENA_HEIGHT: i32 = 20;
pub const ENTITIES_PER_MATCH: usize = 2;

/// Spawn columns for the two entities of a freshly created match.
pub const SPAWN_POSITIONS: [(i32, i32); ENTITIES_PER_MATCH] = [(5, 10), (15, 10)];

/// Directional action carried by a command. Each one moves exactly one axis by one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::MoveLeft,
        Action::MoveRight,
        Action::MoveUp,
        Action::MoveDown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::MoveLeft => "MOVE_LEFT",
            Action::MoveRight => "MOVE_RIGHT",
            Action::MoveUp => "MOVE_UP",
            Action::MoveDown => "MOVE_DOWN",
        }
    }
}

/// A single input routed to one match. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub match_id: u32,
    pub entity_id: u32,
    pub tick: u32,
    pub action: Action,
}

impl Command {
    pub fn new(match_id: u32, entity_id: u32, tick: u32, action: Action) -> Self {
        Self {
            match_id,
            entity_id,
            tick,
            action,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityState {
    pub id: u32,
    pub x: i32,
    pub y: i32,
}

impl EntityState {
    pub fn new(id: u32, x: i32, y: i32) -> Self {
        Self {
            id,
            x: x.clamp(0, ARENA_WIDTH - 1),
            y: y.clamp(0, ARENA_HEIGHT - 1),
        }
    }

    /// Moves one cell in the direction of `action`, staying inside the arena.
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::MoveLeft => self.x = (self.x - 1).max(0),
            Action::MoveRight => self.x = (self.x + 1).min(ARENA_WIDTH - 1),
            Action::MoveUp => self.y = (self.y - 1).max(0),
            Action::MoveDown => self.y = (self.y + 1).min(ARENA_HEIGHT - 1),
        }
    }

    pub fn in_bounds(&self) -> bool {
        (0..ARENA_WIDTH).contains(&self.x) && (0..ARENA_HEIGHT).contains(&self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchState {
    pub match_id: u32,
    pub current_tick: u32,
    pub running: bool,
    pub entities: [EntityState; ENTITIES_PER_MATCH],
}

impl MatchState {
    pub fn new(match_id: u32) -> Self {
        Self::with_positions(match_id, SPAWN_POSITIONS)
    }

    pub fn with_positions(match_id: u32, positions: [(i32, i32); ENTITIES_PER_MATCH]) -> Self {
        let [(x0, y0), (x1, y1)] = positions;
        Self {
            match_id,
            current_tick: 0,
            running: false,
            entities: [EntityState::new(0, x0, y0), EntityState::new(1, x1, y1)],
        }
    }
}

/// Deep copy of a match state captured at `tick`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub tick: u32,
    pub state: MatchState,
}

impl Snapshot {
    pub fn capture(state: &MatchState) -> Self {
        Self {
            tick: state.current_tick,
            state: state.clone(),
        }
    }
}

/// Applies `command` to `state`.
///
/// Pure and deterministic: the entity is picked by `entity_id mod ENTITIES_PER_MATCH`,
/// only its position changes, and the result is clamped into the arena. The tick
/// counter is left untouched; advancing time belongs to the caller.
pub fn apply_command(state: &mut MatchState, command: &Command) {
    let index = command.entity_id as usize % ENTITIES_PER_MATCH;
    state.entities[index].apply(command.action);
}

/// A producer of commands that can be polled in batches until exhausted.
pub trait CommandSource: Send {
    /// Returns up to `max` commands. An empty batch does not imply exhaustion.
    fn next_batch(&mut self, max: usize) -> Vec<Command>;

    fn is_finished(&self) -> bool;
}
