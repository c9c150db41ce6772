/// Static game data: floor templates and character templates.
///
/// These tables are immutable configuration. `GameData::standard()` is
/// built once at startup and passed by reference into the Level; nothing
/// ever mutates it. The simulation treats the tables as read-only input
/// the same way it treats the tuning config.

/// Behavior variant tag. One concrete Character struct serves all of
/// these; the tag selects the per-variant hooks in the character system.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Variant {
    Customer,
    Heavy,
    Runner,
    Horse,
    Ghost,
    Car,
    Renovator,
    BandMember,
    Reverser,
    Cat,
}

/// One entry of a floor's spawn table: a character template id plus a
/// relative weight for the weighted random draw.
#[derive(Clone, Copy, Debug)]
pub struct SpawnEntry {
    pub character: &'static str,
    pub weight: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct FloorTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub spawn: &'static [SpawnEntry],
    /// Floors like Security never appear as a character's goal.
    pub exclude_as_destination: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct CharacterTemplate {
    pub id: &'static str,
    pub variant: Variant,
    /// Affects elevator speed; negative weight lifts the car (ghosts).
    pub weight: f32,
    /// Occupancy footprint in world units, on floors and in the car.
    pub width: f32,
    pub min_tip: u32,
    pub max_tip: u32,
    /// Seconds of waiting over which the tip decays from max to min.
    pub max_queue_time: f32,
    /// Companion template ids spawned on nearby floors in the same tick.
    pub spawn_with: &'static [&'static str],
    /// Maximum live population of this template, or None for unlimited.
    pub population_cap: Option<usize>,
}

// ── Spawn tables ──

const SPAWN_ACME: &[SpawnEntry] = &[
    SpawnEntry { character: "customer", weight: 3.0 },
    SpawnEntry { character: "heavy", weight: 1.0 },
    SpawnEntry { character: "runner", weight: 1.0 },
    SpawnEntry { character: "renovator", weight: 0.4 },
];

const SPAWN_STABLES: &[SpawnEntry] = &[
    SpawnEntry { character: "horse", weight: 2.0 },
    SpawnEntry { character: "customer", weight: 1.0 },
];

const SPAWN_GRAVEYARD: &[SpawnEntry] = &[
    SpawnEntry { character: "ghost", weight: 1.5 },
    SpawnEntry { character: "customer", weight: 0.5 },
];

const SPAWN_LOUNGE: &[SpawnEntry] = &[
    SpawnEntry { character: "customer", weight: 3.0 },
    SpawnEntry { character: "runner", weight: 1.0 },
    SpawnEntry { character: "reverser", weight: 0.7 },
];

const SPAWN_GARAGE: &[SpawnEntry] = &[
    SpawnEntry { character: "car", weight: 1.5 },
    SpawnEntry { character: "customer", weight: 1.0 },
];

const SPAWN_GYM: &[SpawnEntry] = &[
    SpawnEntry { character: "heavy", weight: 2.0 },
    SpawnEntry { character: "runner", weight: 2.0 },
];

const SPAWN_CARWASH: &[SpawnEntry] = &[
    SpawnEntry { character: "car", weight: 1.0 },
    SpawnEntry { character: "customer", weight: 2.0 },
];

const SPAWN_TRAVEL: &[SpawnEntry] = &[
    SpawnEntry { character: "cat", weight: 2.0 },
    SpawnEntry { character: "customer", weight: 2.0 },
];

const SPAWN_BALLROOM: &[SpawnEntry] = &[
    SpawnEntry { character: "bandmember", weight: 1.0 },
    SpawnEntry { character: "customer", weight: 1.5 },
];

const SPAWN_HEAVYSTUFF: &[SpawnEntry] = &[
    SpawnEntry { character: "heavy", weight: 3.0 },
];

/// Floor template pool. A level draws its floors from a shuffled copy,
/// and renovation later swaps in templates that are not currently in use.
const FLOORS: &[FloorTemplate] = &[
    FloorTemplate { id: "acme", name: "Acme", spawn: SPAWN_ACME, exclude_as_destination: false },
    FloorTemplate { id: "stables", name: "Stables", spawn: SPAWN_STABLES, exclude_as_destination: false },
    FloorTemplate { id: "graveyard", name: "Graveyard", spawn: SPAWN_GRAVEYARD, exclude_as_destination: false },
    FloorTemplate { id: "lounge", name: "Business lounge", spawn: SPAWN_LOUNGE, exclude_as_destination: false },
    FloorTemplate { id: "garage", name: "Garage", spawn: SPAWN_GARAGE, exclude_as_destination: false },
    FloorTemplate { id: "security", name: "Security", spawn: &[], exclude_as_destination: true },
    FloorTemplate { id: "gym", name: "Gym", spawn: SPAWN_GYM, exclude_as_destination: false },
    FloorTemplate { id: "carwash", name: "Car wash & cocktail bar", spawn: SPAWN_CARWASH, exclude_as_destination: false },
    FloorTemplate { id: "travel", name: "Cat travel agency", spawn: SPAWN_TRAVEL, exclude_as_destination: false },
    FloorTemplate { id: "ballroom", name: "Grand ballroom", spawn: SPAWN_BALLROOM, exclude_as_destination: false },
    FloorTemplate { id: "heavystuff", name: "Anvils & grand pianos", spawn: SPAWN_HEAVYSTUFF, exclude_as_destination: false },
];

const NO_COMPANIONS: &[&str] = &[];
const BAND_COMPANIONS: &[&str] = &["bandmember", "bandmember"];

const CHARACTERS: &[CharacterTemplate] = &[
    CharacterTemplate {
        id: "customer", variant: Variant::Customer,
        weight: 1.0, width: 2.0,
        min_tip: 1, max_tip: 5, max_queue_time: 30.0,
        spawn_with: NO_COMPANIONS, population_cap: None,
    },
    CharacterTemplate {
        id: "heavy", variant: Variant::Heavy,
        weight: 4.0, width: 2.0,
        min_tip: 5, max_tip: 20, max_queue_time: 30.0,
        spawn_with: NO_COMPANIONS, population_cap: None,
    },
    CharacterTemplate {
        id: "runner", variant: Variant::Runner,
        weight: 1.0, width: 2.0,
        min_tip: 20, max_tip: 50, max_queue_time: 15.0,
        spawn_with: NO_COMPANIONS, population_cap: Some(3),
    },
    CharacterTemplate {
        id: "horse", variant: Variant::Horse,
        weight: 2.0, width: 3.0,
        min_tip: 5, max_tip: 15, max_queue_time: 30.0,
        spawn_with: NO_COMPANIONS, population_cap: None,
    },
    CharacterTemplate {
        id: "ghost", variant: Variant::Ghost,
        weight: -2.0, width: 2.0,
        min_tip: 0, max_tip: 0, max_queue_time: 30.0,
        spawn_with: NO_COMPANIONS, population_cap: Some(2),
    },
    CharacterTemplate {
        id: "car", variant: Variant::Car,
        weight: 4.0, width: 4.0,
        min_tip: 10, max_tip: 30, max_queue_time: 40.0,
        spawn_with: NO_COMPANIONS, population_cap: Some(2),
    },
    CharacterTemplate {
        id: "renovator", variant: Variant::Renovator,
        weight: 1.0, width: 2.0,
        min_tip: 0, max_tip: 0, max_queue_time: 30.0,
        spawn_with: NO_COMPANIONS, population_cap: Some(1),
    },
    CharacterTemplate {
        id: "bandmember", variant: Variant::BandMember,
        weight: 1.0, width: 2.0,
        min_tip: 3, max_tip: 12, max_queue_time: 25.0,
        spawn_with: BAND_COMPANIONS, population_cap: Some(4),
    },
    CharacterTemplate {
        id: "reverser", variant: Variant::Reverser,
        weight: 1.0, width: 2.0,
        min_tip: 10, max_tip: 25, max_queue_time: 30.0,
        spawn_with: NO_COMPANIONS, population_cap: Some(1),
    },
    CharacterTemplate {
        id: "cat", variant: Variant::Cat,
        weight: 0.5, width: 1.0,
        min_tip: 1, max_tip: 3, max_queue_time: 20.0,
        spawn_with: NO_COMPANIONS, population_cap: Some(3),
    },
];

/// The read-only data tables a Level is constructed from.
#[derive(Clone, Copy, Debug)]
pub struct GameData {
    pub floors: &'static [FloorTemplate],
    pub characters: &'static [CharacterTemplate],
}

impl GameData {
    pub fn standard() -> Self {
        GameData { floors: FLOORS, characters: CHARACTERS }
    }

    pub fn character(&self, id: &str) -> Option<&'static CharacterTemplate> {
        self.characters.iter().find(|c| c.id == id)
    }

    pub fn floor_template(&self, idx: usize) -> &'static FloorTemplate {
        &self.floors[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_tables_reference_real_characters() {
        let data = GameData::standard();
        for floor in data.floors {
            for entry in floor.spawn {
                assert!(
                    data.character(entry.character).is_some(),
                    "floor {} spawns unknown character {}",
                    floor.id, entry.character
                );
                assert!(entry.weight > 0.0);
            }
        }
    }

    #[test]
    fn companions_reference_real_characters() {
        let data = GameData::standard();
        for ch in data.characters {
            for comp in ch.spawn_with {
                assert!(data.character(comp).is_some());
            }
        }
    }

    #[test]
    fn enough_destination_floors_for_a_level() {
        let data = GameData::standard();
        let eligible = data.floors.iter().filter(|f| !f.exclude_as_destination).count();
        // 6-floor level: even with one excluded floor in play, every spawn
        // floor must still find at least one foreign destination.
        assert!(eligible >= 6);
    }

    #[test]
    fn tips_are_ordered() {
        for ch in GameData::standard().characters {
            assert!(ch.min_tip <= ch.max_tip, "{}", ch.id);
            assert!(ch.max_queue_time > 0.0);
            assert!(ch.width > 0.0);
        }
    }

    #[test]
    fn ghost_is_lighter_than_air() {
        let ghost = GameData::standard().character("ghost").unwrap();
        assert!(ghost.weight < 0.0);
    }
}
