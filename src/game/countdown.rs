//! Countdown registry
//!
//! Numeric countdowns owned by one arena. Each counter is decremented at most
//! once per tick and never goes below zero; reaching exactly zero is the only
//! transition trigger.

use crate::config::GameplayConfig;

/// A non-negative countdown in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Countdown(u32);

impl Countdown {
    pub const fn new(ticks: u32) -> Self {
        Self(ticks)
    }

    /// Remaining ticks
    pub fn remaining(&self) -> u32 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Decrement once. Returns true only on the tick that reaches zero.
    /// A counter already at zero stays there.
    pub fn tick(&mut self) -> bool {
        if self.0 == 0 {
            return false;
        }
        self.0 -= 1;
        self.0 == 0
    }

    pub fn reset(&mut self, ticks: u32) {
        self.0 = ticks;
    }
}

/// All countdowns governing one arena's phase clock
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountdownRegistry {
    pub starting: Countdown,
    pub restarting: Countdown,
    pub diamond_upgrade: Countdown,
    pub emerald_upgrade: Countdown,
    pub beds_destroy: Countdown,
    pub dragon_spawn: Countdown,
    pub game_end: Countdown,
}

impl CountdownRegistry {
    /// Fresh counters for a new match
    pub fn from_config(config: &GameplayConfig) -> Self {
        Self {
            starting: Countdown::new(config.start_countdown),
            restarting: Countdown::new(config.restart_countdown),
            diamond_upgrade: Countdown::new(config.diamond_tier_ii_start),
            emerald_upgrade: Countdown::new(config.emerald_tier_ii_start),
            beds_destroy: Countdown::new(config.beds_destroy_countdown),
            dragon_spawn: Countdown::new(config.dragon_spawn_countdown),
            game_end: Countdown::new(config.game_end_countdown),
        }
    }

    pub fn reset(&mut self, config: &GameplayConfig) {
        *self = Self::from_config(config);
    }
}
