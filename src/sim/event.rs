/// Events emitted during a simulation step.
/// The presentation layer consumes these for sound effects and the
/// coin-particle overlay; the core fires and forgets.

#[derive(Clone, Debug)]
#[allow(dead_code)]
pub enum GameEvent {
    TipAwarded { floor: usize, amount: u64, combo: u32 },
    ComboBroken { length: u32 },
    DoorsOpened { floor: usize },
    DoorsClosed,
    CharacterSpawned { floor: usize },
    CharacterBoarded { floor: usize },
    ScareStarted,
    GhostVanished,
    RenovationStarted { floor: usize },
    FloorReplaced { floor: usize },
    FloorOverflowed { floor: usize },
}
