/// One floor of the tower: occupancy queue and lifecycle.
///
/// A Floor object binds a fixed floor number to a template drawn from
/// the shuffled pool. Renovation replaces the template by building a
/// fresh Floor that carries the occupant list over, so no character is
/// ever orphaned by the swap.
///
/// Queue packing, overflow detection and door mirroring need the
/// character arena and the elevator, so they live in `sim::step`; this
/// struct keeps the per-floor state those systems read and write.

use crate::domain::character::CharacterId;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FloorState {
    /// Fresh template sliding in; doors stay shut.
    Appearing,
    Idle,
    /// Being torn out; doors stay shut.
    Renovating,
    /// Work finished, waiting for the Level to swap in a new template.
    Renovated,
}

#[derive(Clone, Debug)]
pub struct Floor {
    /// Fixed slot in the tower; rises upwards.
    pub number: usize,
    /// Index into `GameData::floors`.
    pub template: usize,

    /// Arrival order; packing assigns queue slots in this order.
    pub occupants: Vec<CharacterId>,

    pub state: FloorState,
    pub state_time: f32,

    /// Continuous [0, 1] proximity-to-overflow warning.
    pub alarm: f32,

    pub door_open: bool,
    /// 1.0 closed, 0.0 open; mirrors the elevator while aligned.
    pub door_visual: f32,
}

impl Floor {
    pub fn new(number: usize, template: usize) -> Self {
        Floor {
            number,
            template,
            occupants: Vec::new(),
            state: FloorState::Appearing,
            state_time: 0.0,
            alarm: 0.0,
            door_open: false,
            door_visual: 1.0,
        }
    }

    /// Build the replacement floor after a renovation, reusing the
    /// occupant list of the floor being swapped out.
    pub fn replacement(old: &Floor, template: usize) -> Self {
        let mut floor = Floor::new(old.number, template);
        floor.occupants = old.occupants.clone();
        floor
    }

    pub fn change_state(&mut self, state: FloorState) {
        self.state = state;
        self.state_time = 0.0;
    }

    /// Timed lifecycle transitions. Door and queue handling are driven
    /// by the floor system each frame.
    pub fn advance_state(&mut self, dt: f32, appear_time: f32, renovate_time: f32) {
        self.state_time += dt;
        match self.state {
            FloorState::Appearing if self.state_time >= appear_time => {
                self.change_state(FloorState::Idle);
            }
            FloorState::Renovating if self.state_time >= renovate_time => {
                self.change_state(FloorState::Renovated);
            }
            _ => {}
        }
    }

    /// May the elevator open its doors here right now?
    pub fn permits_door(&self) -> bool {
        self.state == FloorState::Idle
    }

    pub fn remove_occupant(&mut self, id: CharacterId) {
        self.occupants.retain(|&o| o != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appearing_settles_into_idle() {
        let mut floor = Floor::new(2, 0);
        assert!(!floor.permits_door());
        for _ in 0..100 {
            floor.advance_state(0.02, 1.5, 4.0);
        }
        assert_eq!(floor.state, FloorState::Idle);
        assert!(floor.permits_door());
    }

    #[test]
    fn renovation_runs_to_completion() {
        let mut floor = Floor::new(0, 0);
        floor.change_state(FloorState::Renovating);
        for _ in 0..100 {
            floor.advance_state(0.05, 1.5, 4.0);
        }
        assert_eq!(floor.state, FloorState::Renovated);
        assert!(!floor.permits_door());
    }

    #[test]
    fn replacement_carries_occupants_over() {
        let mut floor = Floor::new(3, 1);
        floor.occupants = vec![7, 8, 9];
        floor.change_state(FloorState::Renovated);

        let fresh = Floor::replacement(&floor, 5);
        assert_eq!(fresh.number, 3);
        assert_eq!(fresh.template, 5);
        assert_eq!(fresh.occupants, vec![7, 8, 9]);
        assert_eq!(fresh.state, FloorState::Appearing);
    }

    #[test]
    fn idle_state_is_stable() {
        let mut floor = Floor::new(0, 0);
        floor.change_state(FloorState::Idle);
        for _ in 0..1000 {
            floor.advance_state(0.1, 1.5, 4.0);
        }
        assert_eq!(floor.state, FloorState::Idle);
    }
}
