//! Resource generators and world locations

use serde::{Deserialize, Serialize};

use crate::game::constants::generator;
use crate::game::countdown::Countdown;
use crate::game::team::TeamColor;

/// Generator identifier, unique within one arena
pub type GeneratorId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneratorKind {
    Iron,
    Gold,
    Diamond,
    Emerald,
}

impl GeneratorKind {
    /// Seconds between drops at a given tier
    pub fn delay(&self, tier: u8) -> u32 {
        let idx = usize::from(tier.clamp(1, generator::MAX_TIER) - 1);
        match self {
            GeneratorKind::Iron => generator::IRON_DELAY,
            GeneratorKind::Gold => generator::GOLD_DELAY,
            GeneratorKind::Diamond => generator::DIAMOND_DELAY[idx],
            GeneratorKind::Emerald => generator::EMERALD_DELAY[idx],
        }
    }
}

/// A point inside a world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Euclidean distance, None when the points are in different worlds
    pub fn distance(&self, other: &Location) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        Some((dx * dx + dy * dy + dz * dz).sqrt())
    }
}

/// Resource generator, either shared (diamond/emerald) or owned by a team
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    pub id: GeneratorId,
    pub kind: GeneratorKind,
    pub location: Location,
    pub owner: Option<TeamColor>,
    pub tier: u8,
    next_drop: Countdown,
}

impl Generator {
    pub fn new(id: GeneratorId, kind: GeneratorKind, location: Location, owner: Option<TeamColor>) -> Self {
        Self {
            id,
            kind,
            location,
            owner,
            tier: 1,
            next_drop: Countdown::new(kind.delay(1)),
        }
    }

    /// Advance the drop timer; true when a resource should drop this tick
    pub fn tick(&mut self) -> bool {
        if self.next_drop.tick() {
            self.next_drop.reset(self.kind.delay(self.tier));
            return true;
        }
        false
    }

    pub fn upgrade(&mut self, tier: u8) {
        self.tier = tier.min(generator::MAX_TIER);
        // Shorter delay applies from the next drop on
        let delay = self.kind.delay(self.tier);
        if self.next_drop.remaining() > delay {
            self.next_drop.reset(delay);
        }
    }

    /// Reset to tier I
    pub fn reset(&mut self) {
        self.tier = 1;
        self.next_drop.reset(self.kind.delay(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_same_world() {
        let a = Location::new("bw_1", 0.0, 64.0, 0.0);
        let b = Location::new("bw_1", 3.0, 64.0, 4.0);
        assert_eq!(a.distance(&b), Some(5.0));
    }

    #[test]
    fn test_distance_other_world() {
        let a = Location::new("bw_1", 0.0, 64.0, 0.0);
        let b = Location::new("bw_2", 0.0, 64.0, 0.0);
        assert_eq!(a.distance(&b), None);
    }

    #[test]
    fn test_generator_drops_on_delay() {
        let mut gen = Generator::new(1, GeneratorKind::Iron, Location::new("w", 0.0, 0.0, 0.0), Some(TeamColor::Red));
        assert!(!gen.tick());
        assert!(gen.tick());
        assert!(!gen.tick());
        assert!(gen.tick());
    }

    #[test]
    fn test_upgrade_shortens_delay() {
        let mut gen = Generator::new(1, GeneratorKind::Diamond, Location::new("w", 0.0, 0.0, 0.0), None);
        gen.upgrade(3);
        assert_eq!(gen.tier, 3);
        let ticks_to_drop = (1..=100).find(|_| gen.tick()).unwrap();
        assert_eq!(ticks_to_drop, generator::DIAMOND_DELAY[2]);
    }

    #[test]
    fn test_upgrade_caps_at_max_tier() {
        let mut gen = Generator::new(1, GeneratorKind::Emerald, Location::new("w", 0.0, 0.0, 0.0), None);
        gen.upgrade(9);
        assert_eq!(gen.tier, generator::MAX_TIER);
    }
}
