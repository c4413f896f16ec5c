//! Per-module cleanroom state: particle accumulation, decay, and the yield
//! impact on contamination-sensitive recipes.

use serde::{Deserialize, Serialize};

/// Base particle count per ISO-style class. Lower class = stricter room.
pub fn base_particle_count(class: u32) -> f32 {
    match class {
        0..=1 => 35.2,
        2..=10 => 352.0,
        11..=100 => 3_520.0,
        101..=1_000 => 35_200.0,
        1_001..=10_000 => 352_000.0,
        _ => 3_520_000.0,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanroomState {
    pub class: u32,
    pub particle_count: f32,
    pub time_since_cleaning_h: f32,
}

impl CleanroomState {
    pub fn new(class: u32) -> Self {
        Self {
            class,
            particle_count: base_particle_count(class),
            time_since_cleaning_h: 0.0,
        }
    }

    /// Task activity stirs up particles: +100 per activity-hour.
    pub fn record_activity(&mut self, hours: f32, activity_level: f32) {
        self.particle_count += activity_level * 100.0 * hours;
        self.time_since_cleaning_h += hours;
    }

    /// Idle drift back toward dirtier: slow compounding growth.
    pub fn idle_drift(&mut self, hours: f32) {
        self.particle_count *= 1.001_f32.powf(hours);
        self.time_since_cleaning_h += hours;
    }

    /// Scheduled cleaning: back to the class baseline.
    pub fn clean(&mut self) {
        self.particle_count = base_particle_count(self.class);
        self.time_since_cleaning_h = 0.0;
    }

    /// Yield multiplier for a recipe of the given cleanroom class.
    ///
    /// `1 - (particles / 1e6) * (1 / class)`, floored at zero. Stricter
    /// recipes (smaller class) are hit harder by the same particle load.
    pub fn contamination_yield(&self, recipe_class: u32) -> f32 {
        let sensitivity = 1.0 / recipe_class.max(1) as f32;
        (1.0 - (self.particle_count / 1e6) * sensitivity).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn particle_floor_is_class_baseline() {
        let room = CleanroomState::new(100);
        assert_eq!(room.particle_count, 3_520.0);
        let strict = CleanroomState::new(1);
        assert_eq!(strict.particle_count, 35.2);
    }

    #[test]
    fn activity_accumulates_and_cleaning_resets() {
        let mut room = CleanroomState::new(1_000);
        let base = room.particle_count;
        room.record_activity(2.0, 1.0);
        assert!((room.particle_count - (base + 200.0)).abs() < 1e-3);
        assert!(room.time_since_cleaning_h > 0.0);

        room.clean();
        assert_eq!(room.particle_count, base);
        assert_eq!(room.time_since_cleaning_h, 0.0);
    }

    #[test]
    fn strict_recipes_lose_more_yield() {
        let mut room = CleanroomState::new(1_000);
        room.particle_count = 100_000.0;
        let loose = room.contamination_yield(10_000);
        let strict = room.contamination_yield(10);
        assert!(strict < loose);
        assert!(strict >= 0.0);
    }

    #[test]
    fn yield_floors_at_zero() {
        let mut room = CleanroomState::new(100_000);
        room.particle_count = 1e9;
        assert_eq!(room.contamination_yield(1), 0.0);
    }
}
