//! Game constants - tick rate, default countdowns and shared-store layout

/// Scheduler timing
pub mod tick {
    /// Arena tick rate in Hz
    pub const TICK_RATE: u32 = 1;
    /// Tick duration in milliseconds
    pub const TICK_DURATION_MS: u64 = 1000 / TICK_RATE as u64;
    /// Log arena stats every N ticks
    pub const STATS_INTERVAL: u64 = 60;
}

/// Default phase/event countdowns (seconds)
pub mod countdown {
    /// Lobby countdown once the minimum player count is reached
    pub const START: u32 = 20;
    /// Time spent in restarting before the arena is back to waiting
    pub const RESTART: u32 = 10;
    /// Beds are destroyed this long after the last generator upgrade
    pub const BEDS_DESTROY: u32 = 360;
    /// Sudden death starts this long after beds are destroyed
    pub const DRAGON_SPAWN: u32 = 600;
    /// The match ends this long after sudden death
    pub const GAME_END: u32 = 120;
}

/// Generator upgrade timings (seconds after the previous upgrade of the same track)
pub mod generator {
    pub const DIAMOND_TIER_II_START: u32 = 360;
    pub const DIAMOND_TIER_III_START: u32 = 360;
    pub const EMERALD_TIER_II_START: u32 = 720;
    pub const EMERALD_TIER_III_START: u32 = 720;

    /// Highest generator tier
    pub const MAX_TIER: u8 = 3;

    /// Seconds between drops, indexed by tier - 1
    pub const DIAMOND_DELAY: [u32; 3] = [30, 23, 12];
    pub const EMERALD_DELAY: [u32; 3] = [65, 50, 35];
    pub const IRON_DELAY: u32 = 2;
    pub const GOLD_DELAY: u32 = 8;
}

/// Per-player session timers
pub mod session {
    /// Idle ticks before a player is flagged AFK
    pub const AFK_THRESHOLD: u32 = 45;
    /// Default respawn delay in seconds
    pub const RESPAWN_COUNTDOWN: u32 = 5;
    /// Invisibility potion duration in seconds
    pub const INVISIBILITY_DURATION: u32 = 30;
}

/// Shared store layout
pub mod store {
    /// Prefix of every per-arena record key
    pub const ARENA_KEY_PREFIX: &str = "bwa-";
    /// Hash holding fleet-wide settings
    pub const SETTINGS_KEY: &str = "settings";
    /// Type tag of relayed addon messages
    pub const ADDON_MESSAGE_TYPE: &str = "AM";
    /// Delay before resubscribing after the channel stream ends
    pub const RESUBSCRIBE_DELAY_MS: u64 = 2000;
    /// Upper bound of the resubscribe backoff
    pub const RESUBSCRIBE_MAX_DELAY_MS: u64 = 30_000;
    /// Default pub/sub channel
    pub const DEFAULT_CHANNEL: &str = "bw2023";
}
