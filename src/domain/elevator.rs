/// Elevator car: motion, door timing, capacity queries.
///
/// The car approaches its target like a critically damped spring rather
/// than ticking between floors: speed decays with distance, the position
/// blends toward the target once close, and a snap rule guarantees exact
/// alignment eventually. The door timer uses hysteresis (open above half
/// of the timer range) so the door never flickers at the boundary.
///
/// Anything that needs character widths or weights (capacity, slowdown,
/// occupant packing) lives in `sim::step`, which owns the arena lookups;
/// this struct only carries the car's own state.

use crate::domain::character::CharacterId;

pub struct Elevator {
    /// Continuous floor position; rises upwards.
    pub floor_number: f32,
    pub current_movement_speed: f32,
    /// Lazily chosen when intent drops to zero; cleared while driving.
    pub target_floor: Option<f32>,

    pub door_open_timer: f32,
    pub door_open: bool,
    /// 1.0 fully closed, 0.0 fully open. Drives the door animation,
    /// decoupled from the boolean gate.
    pub door_visual: f32,

    /// Order matters: packing and band grouping use list order.
    pub occupants: Vec<CharacterId>,
    pub max_width_capacity: f32,

    /// Player press intent, written each frame from input.
    pub move_up: f32,
    pub move_down: f32,
    /// True while any occupant reverses the controls.
    pub reverse_controls: bool,
}

impl Elevator {
    pub fn new(max_width_capacity: f32) -> Self {
        Elevator {
            floor_number: 0.0,
            current_movement_speed: 0.0,
            target_floor: Some(0.0),
            door_open_timer: 0.0,
            door_open: false,
            door_visual: 1.0,
            occupants: Vec::new(),
            max_width_capacity,
            move_up: 0.0,
            move_down: 0.0,
            reverse_controls: false,
        }
    }

    pub fn remove_occupant(&mut self, id: CharacterId) {
        self.occupants.retain(|&o| o != id);
    }

    /// Distance from the nearest integer floor. Doors may only open
    /// while this is essentially zero.
    pub fn snappiness(&self) -> f32 {
        (self.floor_number - self.floor_number.round()).abs()
    }

    /// Floor index the car is closest to.
    pub fn aligned_floor(&self, num_floors: usize) -> usize {
        (self.floor_number.round().max(0.0) as usize).min(num_floors - 1)
    }

    /// Advance car position for one frame. `intent` is the already
    /// clamped/slowed/reversed movement intent in [-1, 1]; door-open
    /// freezing is applied here. Returns true when raw intent was
    /// nonzero, which is the combo-breaking condition.
    pub fn advance_motion(&mut self, dt: f32, intent: f32, num_floors: usize, move_speed: f32) -> bool {
        let applied = if self.door_open { 0.0 } else { intent };

        if intent == 0.0 {
            let target = *self.target_floor.get_or_insert_with(|| {
                (self.floor_number + self.current_movement_speed * 0.15).round()
            });
            let distance = (self.floor_number - target).abs();
            self.current_movement_speed *= (0.8 + distance * 0.3).clamp(0.0, 0.99);
            // Snap blend. The lower bound keeps a trickle of pull even
            // when the car stalls outside the 0.2 snap window, so an idle
            // car always reaches an exact floor and the doors can open.
            let c = (0.2 - distance).clamp(0.02, 0.1);
            self.floor_number = self.floor_number * (1.0 - c) + target * c;
        } else {
            self.target_floor = None;
            self.current_movement_speed =
                self.current_movement_speed * 0.9 + applied * move_speed * 0.1;
        }

        self.floor_number += self.current_movement_speed * dt;

        let top = (num_floors - 1) as f32;
        if self.floor_number <= 0.0 {
            self.floor_number = 0.0;
            if self.current_movement_speed < 0.0 {
                self.current_movement_speed = 0.0;
            }
        }
        if self.floor_number >= top {
            self.floor_number = top;
            if self.current_movement_speed > 0.0 {
                self.current_movement_speed = 0.0;
            }
        }

        intent != 0.0
    }

    /// Advance the door timer for one frame. The timer only accumulates
    /// while aligned with a floor that currently permits opening, and
    /// drains whenever the car is off-alignment or being driven.
    pub fn advance_door(&mut self, dt: f32, intent_active: bool, floor_permits: bool, door_open_time: f32) {
        let snappiness = self.snappiness();
        if !intent_active && snappiness < 0.01 && floor_permits {
            self.door_open_timer += dt;
        }
        if snappiness > 0.01 || intent_active {
            self.door_open_timer -= dt;
        }
        self.door_open_timer = self.door_open_timer.clamp(0.0, door_open_time);
        self.door_open = self.door_open_timer > door_open_time * 0.5;

        self.door_visual = if !self.door_open {
            1.0
        } else {
            let half = door_open_time * 0.5;
            (1.0 - (self.door_open_timer - half) / half).clamp(0.0, 1.0)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;
    const DOOR_TIME: f32 = 1.0;

    #[test]
    fn door_opens_only_past_half_timer() {
        let mut ev = Elevator::new(6.0);
        let mut was_open = false;
        for _ in 0..120 {
            ev.advance_door(DT, false, true, DOOR_TIME);
            let expect = ev.door_open_timer > DOOR_TIME * 0.5;
            assert_eq!(ev.door_open, expect);
            was_open |= ev.door_open;
        }
        assert!(was_open);
        assert!(ev.door_open_timer <= DOOR_TIME);
    }

    #[test]
    fn door_timer_stays_clamped() {
        let mut ev = Elevator::new(6.0);
        for _ in 0..600 {
            ev.advance_door(DT, false, true, DOOR_TIME);
        }
        assert_eq!(ev.door_open_timer, DOOR_TIME);
        for _ in 0..600 {
            ev.advance_door(DT, true, true, DOOR_TIME);
        }
        assert_eq!(ev.door_open_timer, 0.0);
        assert!(!ev.door_open);
    }

    #[test]
    fn door_blocked_while_floor_not_ready() {
        let mut ev = Elevator::new(6.0);
        for _ in 0..600 {
            ev.advance_door(DT, false, false, DOOR_TIME);
        }
        assert!(!ev.door_open);
        assert_eq!(ev.door_open_timer, 0.0);
    }

    #[test]
    fn idle_car_converges_to_nearest_floor() {
        let mut ev = Elevator::new(6.0);
        ev.floor_number = 2.4;
        ev.target_floor = None;
        for _ in 0..(5.0 / DT) as usize {
            ev.advance_motion(DT, 0.0, 6, 2.0);
            ev.advance_door(DT, false, true, DOOR_TIME);
        }
        assert!((ev.floor_number - 2.0).abs() < 0.01, "at {}", ev.floor_number);
        assert!(ev.door_open);
    }

    #[test]
    fn driving_clears_target_and_breaks_combo() {
        let mut ev = Elevator::new(6.0);
        ev.target_floor = Some(0.0);
        let broke = ev.advance_motion(DT, 1.0, 6, 2.0);
        assert!(broke);
        assert!(ev.target_floor.is_none());
        assert!(ev.current_movement_speed > 0.0);
    }

    #[test]
    fn car_pins_at_shaft_boundaries() {
        let mut ev = Elevator::new(6.0);
        for _ in 0..1200 {
            ev.advance_motion(DT, 1.0, 6, 4.0);
        }
        assert_eq!(ev.floor_number, 5.0);
        assert_eq!(ev.current_movement_speed, 0.0);

        for _ in 0..1200 {
            ev.advance_motion(DT, -1.0, 6, 4.0);
        }
        assert_eq!(ev.floor_number, 0.0);
        assert_eq!(ev.current_movement_speed, 0.0);
    }

    #[test]
    fn door_freezes_the_car() {
        let mut ev = Elevator::new(6.0);
        ev.door_open = true;
        ev.advance_motion(DT, 1.0, 6, 2.0);
        // Intent is ignored while the door is open, but still breaks combos.
        assert_eq!(ev.current_movement_speed, 0.0);
    }
}
