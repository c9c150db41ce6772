/// Level: the complete state of a running game.
///
/// The Level owns everything: the floors, the elevator, and the
/// character arena. Floors and the elevator reference characters only
/// through `CharacterId` handles; the arena is the single owner, so a
/// character lives in exactly one occupant list at a time and transfer
/// between lists is one handle move.
///
/// Per-frame simulation lives in `sim::step`; this module holds
/// construction, arena queries, and the scoring/combo operations.
///
/// ## Geometry
///
/// Continuous world units, x growing rightwards:
///   - floor interior: x in [0, DOOR_THRESHOLD_X)
///   - DOOR_THRESHOLD_X is the single coordinate whose crossing moves a
///     character between floor and elevator occupancy
///   - elevator interior: (DOOR_THRESHOLD_X, DOOR_THRESHOLD_X + depth],
///     depth = capacity + 1
///   - characters that reached their goal exit left and despawn once
///     x < -EXIT_MARGIN

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::Tuning;
use crate::domain::character::{self, Character, CharacterId};
use crate::domain::data::GameData;
use crate::domain::elevator::Elevator;
use crate::domain::floor::Floor;
use super::event::GameEvent;

/// Width of a floor's interior; the door threshold sits at its right edge.
pub const DOOR_THRESHOLD_X: f32 = 23.0;
/// Exit walk target for characters leaving the level.
pub const EXIT_X: f32 = -4.0;
/// A goal-reached character is removed once x drops below -EXIT_MARGIN.
pub const EXIT_MARGIN: f32 = 2.0;
/// Where frightened characters run to on a floor.
pub const ESCAPE_X: f32 = 2.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Title,
    Playing,
    Failed,
}

pub struct Level {
    pub phase: Phase,

    pub score: u64,
    pub combo_count: u32,
    /// Tips of every character in the running combo, in scoring order.
    pub combo_tips: Vec<u32>,
    /// Floor of the previous scoring event; a match continues the combo.
    pub combo_floor: Option<usize>,

    /// Total in-progress play time; spawn pacing accelerates with it.
    pub time: f32,
    pub spawn_timer: f32,

    pub floors: Vec<Floor>,
    pub elevator: Elevator,
    /// Character arena: the single owner of all character structs.
    pub characters: Vec<Character>,

    pub data: GameData,
    pub tuning: Tuning,
    pub rng: StdRng,

    pub message: String,
    pub message_timer: f32,

    next_id: CharacterId,
}

impl Level {
    pub fn new(data: GameData, tuning: Tuning, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        // Draw this level's floor templates from a shuffled pool.
        let mut pool: Vec<usize> = (0..data.floors.len()).collect();
        pool.shuffle(&mut rng);
        let floors: Vec<Floor> = pool
            .iter()
            .take(tuning.num_floors)
            .enumerate()
            .map(|(number, &template)| {
                let mut floor = Floor::new(number, template);
                // Opening lineup starts settled, not sliding in.
                floor.change_state(crate::domain::floor::FloorState::Idle);
                floor
            })
            .collect();

        let spawn_timer = tuning.spawn_base_interval;
        Level {
            phase: Phase::Title,
            score: 0,
            combo_count: 0,
            combo_tips: Vec::new(),
            combo_floor: None,
            time: 0.0,
            spawn_timer,
            floors,
            elevator: Elevator::new(tuning.max_width_capacity),
            characters: Vec::new(),
            data,
            tuning,
            rng,
            message: String::new(),
            message_timer: 0.0,
            next_id: 1,
        }
    }

    /// Rebuild the level from scratch with a fresh floor draw.
    /// The only way back from Failed.
    pub fn restart(&mut self) {
        let seed = self.rng.gen();
        *self = Level::new(self.data, self.tuning.clone(), seed);
        self.phase = Phase::Playing;
    }

    pub fn set_message(&mut self, msg: &str, duration: f32) {
        self.message = msg.to_string();
        self.message_timer = duration;
    }

    // ── Arena queries ──

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        character::find(&self.characters, id)
    }

    pub fn character_mut(&mut self, id: CharacterId) -> Option<&mut Character> {
        character::find_mut(&mut self.characters, id)
    }

    /// Live population of a character template, for spawn caps.
    pub fn population(&self, template_id: &str) -> usize {
        self.characters
            .iter()
            .filter(|c| c.template_id == template_id && !c.dead)
            .count()
    }

    /// Sum of occupant widths. Used for elevator capacity; floor queues
    /// additionally skip non-line-space variants in the packing loop.
    pub fn total_width(&self, ids: &[CharacterId]) -> f32 {
        ids.iter()
            .filter_map(|&id| self.character(id))
            .map(|c| c.width)
            .sum()
    }

    pub fn total_weight(&self, ids: &[CharacterId]) -> f32 {
        ids.iter()
            .filter_map(|&id| self.character(id))
            .map(|c| c.weight)
            .sum()
    }

    /// Depth of the elevator interior beyond the door threshold.
    pub fn elevator_depth(&self) -> f32 {
        self.elevator.max_width_capacity + 1.0
    }

    // ── Spawning ──

    /// Floor numbers a character spawned on `from` may travel to.
    pub fn eligible_destinations(&self, from: usize) -> Vec<usize> {
        self.floors
            .iter()
            .filter(|f| {
                f.number != from && !self.data.floor_template(f.template).exclude_as_destination
            })
            .map(|f| f.number)
            .collect()
    }

    /// Spawn one character on a floor. Returns None when the template is
    /// unknown or its population cap is already reached; caps are checked
    /// against the live list at this moment, so companion spawns later in
    /// the same tick see this one.
    pub fn spawn_character(
        &mut self,
        template_id: &str,
        floor: usize,
        events: &mut Vec<GameEvent>,
    ) -> Option<CharacterId> {
        let template = self.data.character(template_id)?;
        if let Some(cap) = template.population_cap {
            if self.population(template_id) >= cap {
                return None;
            }
        }

        let eligible = self.eligible_destinations(floor);
        let prefer_down = template.weight / template.width > 1.0;
        let goal = character::choose_destination(&mut self.rng, eligible, floor, prefer_down);

        let id = self.next_id;
        self.next_id += 1;
        self.characters.push(Character::new(id, template, floor, goal));
        self.floors[floor].occupants.push(id);
        events.push(GameEvent::CharacterSpawned { floor });
        Some(id)
    }

    // ── Scoring ──

    /// A character stepped out of the elevator onto its goal floor.
    ///
    /// Consecutive deliveries to the same floor with the car parked form
    /// a combo: every earlier combo tip is awarded once more, then the
    /// new tip counts multiplied by the grown combo length.
    pub fn reached_goal(&mut self, id: CharacterId, events: &mut Vec<GameEvent>) {
        let (floor, tip) = match self.character(id) {
            Some(c) => (c.goal_floor, c.tip()),
            None => return,
        };

        let amount;
        if self.combo_floor == Some(floor) {
            let repeat: u64 = self.combo_tips.iter().map(|&t| t as u64).sum();
            self.combo_count += 1;
            amount = repeat + tip as u64 * self.combo_count as u64;
            self.combo_tips.push(tip);
        } else {
            self.combo_floor = Some(floor);
            self.combo_count = 1;
            self.combo_tips.clear();
            self.combo_tips.push(tip);
            amount = tip as u64;
        }
        self.score += amount;
        events.push(GameEvent::TipAwarded { floor, amount, combo: self.combo_count });
    }

    /// Any elevator movement intent ends the current combo.
    pub fn reset_combo(&mut self, events: &mut Vec<GameEvent>) {
        if self.combo_count > 1 {
            events.push(GameEvent::ComboBroken { length: self.combo_count });
        }
        self.combo_count = 0;
        self.combo_tips.clear();
        self.combo_floor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;

    fn test_level(seed: u64) -> Level {
        let mut level = Level::new(GameData::standard(), Tuning::default(), seed);
        level.phase = Phase::Playing;
        level
    }

    #[test]
    fn combo_awards_stack_prior_tips() {
        let mut level = test_level(1);
        let mut events = Vec::new();

        let a = level.spawn_character("customer", 0, &mut events).unwrap();
        let b = level.spawn_character("customer", 1, &mut events).unwrap();
        // Pin both on the same goal floor with known tips.
        for &(id, tip) in &[(a, 10u32), (b, 7u32)] {
            let c = level.character_mut(id).unwrap();
            c.goal_floor = 3;
            c.min_tip = tip;
            c.max_tip = tip;
        }

        level.reached_goal(a, &mut events);
        assert_eq!(level.score, 10);
        assert_eq!(level.combo_count, 1);

        // Second delivery to the same floor: first tip again + 7 * 2.
        level.reached_goal(b, &mut events);
        assert_eq!(level.score, 10 + 10 + 7 * 2);
        assert_eq!(level.combo_count, 2);
        assert_eq!(level.combo_tips, vec![10, 7]);
    }

    #[test]
    fn different_floor_restarts_the_combo() {
        let mut level = test_level(2);
        let mut events = Vec::new();
        let a = level.spawn_character("customer", 0, &mut events).unwrap();
        let b = level.spawn_character("customer", 0, &mut events).unwrap();
        {
            let c = level.character_mut(a).unwrap();
            c.goal_floor = 2;
            c.min_tip = 4;
            c.max_tip = 4;
        }
        {
            let c = level.character_mut(b).unwrap();
            c.goal_floor = 5;
            c.min_tip = 9;
            c.max_tip = 9;
        }

        level.reached_goal(a, &mut events);
        level.reached_goal(b, &mut events);
        assert_eq!(level.score, 4 + 9);
        assert_eq!(level.combo_count, 1);
        assert_eq!(level.combo_floor, Some(5));
    }

    #[test]
    fn reset_combo_clears_everything() {
        let mut level = test_level(3);
        let mut events = Vec::new();
        let a = level.spawn_character("customer", 0, &mut events).unwrap();
        level.character_mut(a).unwrap().goal_floor = 1;
        level.reached_goal(a, &mut events);

        level.reset_combo(&mut events);
        assert_eq!(level.combo_count, 0);
        assert!(level.combo_tips.is_empty());
        assert_eq!(level.combo_floor, None);
    }

    #[test]
    fn population_cap_refuses_spawn() {
        let mut level = test_level(4);
        let mut events = Vec::new();
        assert!(level.spawn_character("reverser", 0, &mut events).is_some());
        assert!(level.spawn_character("reverser", 1, &mut events).is_none());
        assert_eq!(level.population("reverser"), 1);
    }

    #[test]
    fn goals_avoid_spawn_floor_and_excluded_templates() {
        let mut level = test_level(5);
        let mut events = Vec::new();
        for i in 0..20 {
            let floor = i % level.floors.len();
            if let Some(id) = level.spawn_character("customer", floor, &mut events) {
                let goal = level.character(id).unwrap().goal_floor;
                assert_ne!(goal, floor);
                let template = level.data.floor_template(level.floors[goal].template);
                assert!(!template.exclude_as_destination);
            }
        }
    }

    #[test]
    fn spawned_character_joins_the_floor_queue() {
        let mut level = test_level(6);
        let mut events = Vec::new();
        let id = level.spawn_character("horse", 2, &mut events).unwrap();
        assert!(level.floors[2].occupants.contains(&id));
        assert!(!level.character(id).unwrap().in_elevator);
    }
}
