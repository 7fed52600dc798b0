//! Per-player session timers
//!
//! Respawn and invisibility countdowns plus the AFK idle counter. One registry
//! is owned by each arena room; nothing here is shared between arenas.

use hashbrown::{HashMap, HashSet};

use crate::game::constants::session::AFK_THRESHOLD;
use crate::game::countdown::Countdown;
use crate::game::state::PlayerId;

/// Result of advancing the respawn or invisibility map by one tick
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TimerTick {
    /// Players still waiting, with the value shown before this tick's decrement
    pub pending: Vec<(PlayerId, u32)>,
    /// Players whose countdown was consumed this tick (already removed)
    pub expired: Vec<PlayerId>,
}

#[derive(Debug, Default)]
pub struct SessionTimers {
    respawn: HashMap<PlayerId, Countdown>,
    show_time: HashMap<PlayerId, Countdown>,
    afk_ticks: HashMap<PlayerId, u32>,
    afk: HashSet<PlayerId>,
}

impl SessionTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a respawn; replaces any running countdown for the player
    pub fn start_respawn(&mut self, player: PlayerId, seconds: u32) {
        self.respawn.insert(player, Countdown::new(seconds));
    }

    pub fn is_respawning(&self, player: PlayerId) -> bool {
        self.respawn.contains_key(&player)
    }

    pub fn respawn_remaining(&self, player: PlayerId) -> Option<u32> {
        self.respawn.get(&player).map(Countdown::remaining)
    }

    /// Start temporary invisibility
    pub fn start_invisibility(&mut self, player: PlayerId, seconds: u32) {
        self.show_time.insert(player, Countdown::new(seconds));
    }

    pub fn is_invisible(&self, player: PlayerId) -> bool {
        self.show_time.contains_key(&player)
    }

    /// End invisibility early (e.g. the player took damage)
    pub fn cancel_invisibility(&mut self, player: PlayerId) -> bool {
        self.show_time.remove(&player).is_some()
    }

    pub fn respawn_count(&self) -> usize {
        self.respawn.len()
    }

    /// Reset the idle counter to zero. Returns true if the player was AFK.
    pub fn record_activity(&mut self, player: PlayerId) -> bool {
        self.afk_ticks.insert(player, 0);
        self.afk.remove(&player)
    }

    pub fn is_afk(&self, player: PlayerId) -> bool {
        self.afk.contains(&player)
    }

    pub fn afk_ticks(&self, player: PlayerId) -> Option<u32> {
        self.afk_ticks.get(&player).copied()
    }

    /// Advance idle counters for the active roster. A player seen for the first
    /// time starts at zero. Returns players that reached the threshold this tick.
    pub fn tick_afk(&mut self, roster: &[PlayerId]) -> Vec<PlayerId> {
        self.afk_ticks.retain(|player, _| roster.contains(player));
        self.afk.retain(|player| roster.contains(player));

        let mut flagged = Vec::new();
        for player in roster {
            match self.afk_ticks.get_mut(player) {
                None => {
                    self.afk_ticks.insert(*player, 0);
                }
                Some(ticks) => {
                    *ticks = ticks.saturating_add(1);
                    if *ticks == AFK_THRESHOLD && self.afk.insert(*player) {
                        flagged.push(*player);
                    }
                }
            }
        }
        flagged.sort();
        flagged
    }

    pub fn tick_respawns(&mut self) -> TimerTick {
        tick_map(&mut self.respawn)
    }

    pub fn tick_show_time(&mut self) -> TimerTick {
        tick_map(&mut self.show_time)
    }

    /// Drop every timer for a player leaving the arena
    pub fn remove_player(&mut self, player: PlayerId) {
        self.respawn.remove(&player);
        self.show_time.remove(&player);
        self.afk_ticks.remove(&player);
        self.afk.remove(&player);
    }

    pub fn clear(&mut self) {
        self.respawn.clear();
        self.show_time.clear();
        self.afk_ticks.clear();
        self.afk.clear();
    }
}

/// Decrement every entry; entries reaching zero are removed and reported
fn tick_map(map: &mut HashMap<PlayerId, Countdown>) -> TimerTick {
    let mut tick = TimerTick::default();

    for (player, countdown) in map.iter_mut() {
        let remaining = countdown.remaining();
        if remaining == 0 || countdown.tick() {
            tick.expired.push(*player);
        } else {
            tick.pending.push((*player, remaining));
        }
    }
    for player in &tick.expired {
        map.remove(player);
    }

    tick.pending.sort();
    tick.expired.sort();
    tick
}
