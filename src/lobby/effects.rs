//! Effect sink for domain events
//!
//! World edits, titles, entity spawns and chat live outside this crate. The
//! arena loop hands every [`ArenaEvent`] to an [`ArenaEffects`] implementation
//! after the tick has released the arena lock.

use tracing::{debug, info};

use crate::game::events::ArenaEvent;

pub trait ArenaEffects: Send + Sync {
    fn apply(&self, arena: &str, event: &ArenaEvent);
}

/// Logs every event; used when no game host is attached
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEffects;

impl ArenaEffects for LogEffects {
    fn apply(&self, arena: &str, event: &ArenaEvent) {
        match event {
            ArenaEvent::PhaseChanged { old, new } => info!("[{}] {} -> {}", arena, old, new),
            ArenaEvent::NextEventArmed { event } => info!("[{}] next event: {}", arena, event),
            ArenaEvent::GeneratorUpgraded { kind, tier } => {
                info!("[{}] {:?} generators upgraded to tier {}", arena, kind, tier)
            }
            ArenaEvent::BedsDestroyed => info!("[{}] all beds destroyed", arena),
            ArenaEvent::SuddenDeath { dragons, .. } => {
                info!("[{}] sudden death, dragons for {} teams", arena, dragons.len())
            }
            ArenaEvent::TeamEliminated { team } => info!("[{}] team {} eliminated", arena, team),
            ArenaEvent::MatchEnded { result } => match result.winner {
                Some(team) => info!("[{}] match ended, {} wins", arena, team),
                None => info!("[{}] match ended in a draw", arena),
            },
            ArenaEvent::PlayerAfk { player } => info!("[{}] player {} is AFK", arena, player),
            ArenaEvent::ResourceDropped { .. } | ArenaEvent::StartingCountdown { .. } => {}
            other => debug!("[{}] {:?}", arena, other),
        }
    }
}
