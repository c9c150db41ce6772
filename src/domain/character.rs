/// Character entity and state machine.
///
/// One concrete struct serves every variant; behavior differences are
/// dispatched on the `Variant` tag inside the character system
/// (`sim::step`). The struct itself only knows the invariants that hold
/// for all variants:
///   - all state changes go through `change_state`, which resets
///     `state_time` (the uniform entry/exit hook),
///   - the tip is a monotonically non-increasing step function of
///     `queue_time`, bounded by [min_tip, max_tip],
///   - a character is listed by exactly one occupant list at a time;
///     `in_elevator` mirrors which one.

use rand::seq::SliceRandom;
use rand::Rng;

use super::data::{CharacterTemplate, Variant};

/// Non-owning handle into the Level's character arena. Occupant lists on
/// Floor and Elevator store these, never the structs themselves.
pub type CharacterId = u32;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CharacterState {
    /// Just spawned, brief settle before acting.
    Initializing,
    /// Runner only: closing in on the door, watching for a gap.
    Approaching,
    /// Runner only: sprinting for an open door.
    Rushing,
    Normal,
    /// Fleeing a scary elevator occupant.
    Escaping,
    /// Variant-specific pose: ghost scare, cat grooming, renovator work.
    DoingAction,
    /// Ghost only: fading out after its last scare.
    Disappearing,
}

#[derive(Clone, Debug)]
pub struct Character {
    pub id: CharacterId,
    pub template_id: &'static str,
    pub variant: Variant,
    pub width: f32,
    pub weight: f32,

    /// Continuous; integer when settled on a floor, fractional while
    /// riding a moving elevator.
    pub floor_number: f32,
    pub x: f32,
    pub facing_right: bool,

    pub goal_floor: usize,
    /// Set at the elevator→floor transfer onto the goal floor; from then
    /// on the character walks left and exits the level.
    pub goal_reached: bool,

    /// Membership flag only; the occupant lists are owned by
    /// Floor/Elevator.
    pub in_elevator: bool,

    pub state: CharacterState,
    pub state_time: f32,

    pub queue_time: f32,
    pub max_queue_time: f32,
    pub min_tip: u32,
    pub max_tip: u32,

    pub dead: bool,
    pub scary: bool,
    pub immune_to_scary: bool,
    pub takes_space_in_line: bool,
    pub reverses_controls: bool,

    /// Desired x assigned externally each frame; elevator target wins
    /// over the floor queue slot when both are present.
    pub elevator_target_x: Option<f32>,
    pub floor_target_x: Option<f32>,

    pub walk_phase: f32,
    /// Ghost: completed scares so far.
    pub scare_count: u32,
    /// Runner: accumulated stall time while rushing.
    pub rush_stall: f32,
}

impl Character {
    pub fn new(id: CharacterId, template: &CharacterTemplate, floor: usize, goal: usize) -> Self {
        Character {
            id,
            template_id: template.id,
            variant: template.variant,
            width: template.width,
            weight: template.weight,
            floor_number: floor as f32,
            x: 1.0,
            facing_right: true,
            goal_floor: goal,
            goal_reached: false,
            in_elevator: false,
            state: CharacterState::Initializing,
            state_time: 0.0,
            queue_time: 0.0,
            max_queue_time: template.max_queue_time,
            min_tip: template.min_tip,
            max_tip: template.max_tip,
            dead: false,
            scary: false,
            immune_to_scary: matches!(template.variant, Variant::Cat | Variant::Ghost),
            takes_space_in_line: template.variant != Variant::Ghost,
            reverses_controls: template.variant == Variant::Reverser,
            elevator_target_x: None,
            floor_target_x: None,
            walk_phase: 0.0,
            scare_count: 0,
            rush_stall: 0.0,
        }
    }

    /// The single transition operation. Resetting `state_time` here is
    /// the invariant every timed behavior relies on.
    pub fn change_state(&mut self, state: CharacterState) {
        self.state = state;
        self.state_time = 0.0;
    }

    /// Tip earned if served right now. Decays stepwise from `max_tip`
    /// (immediate service) to `min_tip` (fully elapsed wait).
    pub fn tip(&self) -> u32 {
        let waited = (self.queue_time / self.max_queue_time).clamp(0.0, 1.0);
        let span = (self.max_tip - self.min_tip) as f32;
        self.min_tip + ((1.0 - waited) * span).round() as u32
    }

    /// Walk speed factor for the current state.
    pub fn speed_multiplier(&self) -> f32 {
        match self.state {
            CharacterState::Rushing => 2.2,
            CharacterState::Escaping => 1.5,
            CharacterState::DoingAction => 0.0,
            CharacterState::Disappearing => 0.0,
            CharacterState::Initializing => 0.0,
            _ => 1.0,
        }
    }

    pub fn is_band(&self) -> bool {
        self.variant == Variant::BandMember
    }

    /// Heavier-than-wide characters head for lower floors when they can.
    pub fn prefers_going_down(&self) -> bool {
        self.weight / self.width > 1.0
    }
}

// ── Arena lookup ──

pub fn find(characters: &[Character], id: CharacterId) -> Option<&Character> {
    characters.iter().find(|c| c.id == id)
}

pub fn find_mut(characters: &mut [Character], id: CharacterId) -> Option<&mut Character> {
    characters.iter_mut().find(|c| c.id == id)
}

// ── Destination selection ──

/// Pick a goal floor at spawn time. `eligible` is every floor number the
/// character may travel to (current floor and excluded templates already
/// filtered out by the caller). With no eligible floor at all the choice
/// falls back to floor 0.
pub fn choose_destination<R: Rng>(
    rng: &mut R,
    mut eligible: Vec<usize>,
    spawn_floor: usize,
    prefer_down: bool,
) -> usize {
    eligible.shuffle(rng);
    if eligible.is_empty() {
        return 0;
    }
    if prefer_down {
        if let Some(&below) = eligible.iter().find(|&&f| f < spawn_floor) {
            return below;
        }
    }
    eligible[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::data::GameData;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn customer(id: CharacterId) -> Character {
        let data = GameData::standard();
        Character::new(id, data.character("customer").unwrap(), 0, 3)
    }

    #[test]
    fn change_state_resets_state_time() {
        let mut c = customer(1);
        c.state_time = 4.2;
        c.change_state(CharacterState::Normal);
        assert_eq!(c.state, CharacterState::Normal);
        assert_eq!(c.state_time, 0.0);
    }

    #[test]
    fn tip_interpolates_exactly() {
        let mut c = customer(1);
        c.min_tip = 5;
        c.max_tip = 10;
        c.max_queue_time = 10.0;

        c.queue_time = 0.0;
        assert_eq!(c.tip(), 10);
        c.queue_time = 10.0;
        assert_eq!(c.tip(), 5);
        // Exact formula: min + round((1 - q/max) * span)
        c.queue_time = 3.0;
        assert_eq!(c.tip(), 5 + ((0.7f32 * 5.0).round() as u32));
    }

    #[test]
    fn tip_is_monotonically_non_increasing() {
        let mut c = customer(1);
        c.min_tip = 2;
        c.max_tip = 17;
        c.max_queue_time = 12.0;

        let mut last = u32::MAX;
        let mut q = 0.0;
        while q <= 15.0 {
            c.queue_time = q;
            let tip = c.tip();
            assert!(tip <= last);
            assert!(tip >= c.min_tip && tip <= c.max_tip);
            last = tip;
            q += 0.25;
        }
        // Past max_queue_time the tip stays pinned at min.
        assert_eq!(last, 2);
    }

    #[test]
    fn destination_falls_back_to_ground_floor() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(choose_destination(&mut rng, vec![], 3, false), 0);
        assert_eq!(choose_destination(&mut rng, vec![], 3, true), 0);
    }

    #[test]
    fn destination_prefers_below_when_heavy() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..20 {
            let goal = choose_destination(&mut rng, vec![1, 2, 4, 5], 3, true);
            assert!(goal < 3, "heavy character went up to {goal}");
        }
    }

    #[test]
    fn destination_takes_any_eligible_when_nothing_below() {
        let mut rng = StdRng::seed_from_u64(3);
        let goal = choose_destination(&mut rng, vec![4, 5], 3, true);
        assert!(goal == 4 || goal == 5);
    }

    #[test]
    fn down_bias_follows_weight_to_width_ratio() {
        let data = GameData::standard();
        let heavy = Character::new(1, data.character("heavy").unwrap(), 2, 0);
        let customer = Character::new(2, data.character("customer").unwrap(), 2, 0);
        let ghost = Character::new(3, data.character("ghost").unwrap(), 2, 0);
        assert!(heavy.prefers_going_down());
        assert!(!customer.prefers_going_down());
        assert!(!ghost.prefers_going_down());
    }
}
