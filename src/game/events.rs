//! Timed arena events and the domain events surfaced by a tick
//!
//! The scheduler never performs I/O itself; everything observable leaves a
//! tick as an [`ArenaEvent`] and is executed by the effect layer.

use serde::{Deserialize, Serialize};

use crate::game::generator::{GeneratorId, GeneratorKind, Location};
use crate::game::match_result::MatchResult;
use crate::game::state::{Phase, PlayerId};
use crate::game::team::TeamColor;

/// The timed sub-event currently armed while an arena is playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NextEvent {
    DiamondGeneratorTierII,
    EmeraldGeneratorTierII,
    DiamondGeneratorTierIII,
    EmeraldGeneratorTierIII,
    BedsDestroy,
    SuddenDeath,
    GameEnd,
}

impl NextEvent {
    /// First event armed when a match starts
    pub const FIRST: NextEvent = NextEvent::DiamondGeneratorTierII;

    /// Generator upgrade armed for a track at `current_tier`, if any remains
    pub fn generator_upgrade(kind: GeneratorKind, current_tier: u8) -> Option<NextEvent> {
        match (kind, current_tier) {
            (GeneratorKind::Diamond, 1) => Some(NextEvent::DiamondGeneratorTierII),
            (GeneratorKind::Diamond, 2) => Some(NextEvent::DiamondGeneratorTierIII),
            (GeneratorKind::Emerald, 1) => Some(NextEvent::EmeraldGeneratorTierII),
            (GeneratorKind::Emerald, 2) => Some(NextEvent::EmeraldGeneratorTierIII),
            _ => None,
        }
    }

    /// Generator track and the tier it upgrades to
    pub fn upgrade_target(&self) -> Option<(GeneratorKind, u8)> {
        match self {
            NextEvent::DiamondGeneratorTierII => Some((GeneratorKind::Diamond, 2)),
            NextEvent::DiamondGeneratorTierIII => Some((GeneratorKind::Diamond, 3)),
            NextEvent::EmeraldGeneratorTierII => Some((GeneratorKind::Emerald, 2)),
            NextEvent::EmeraldGeneratorTierIII => Some((GeneratorKind::Emerald, 3)),
            _ => None,
        }
    }

    pub fn is_generator_upgrade(&self) -> bool {
        self.upgrade_target().is_some()
    }

    /// Position in the total order of stages. Generator upgrades share stage 0
    /// and are ordered among themselves by their two counters.
    pub fn stage(&self) -> u8 {
        match self {
            NextEvent::DiamondGeneratorTierII
            | NextEvent::EmeraldGeneratorTierII
            | NextEvent::DiamondGeneratorTierIII
            | NextEvent::EmeraldGeneratorTierIII => 0,
            NextEvent::BedsDestroy => 1,
            NextEvent::SuddenDeath => 2,
            NextEvent::GameEnd => 3,
        }
    }

    /// Event armed once the current non-generator stage is consumed
    pub fn following_stage(&self) -> Option<NextEvent> {
        match self {
            NextEvent::BedsDestroy => Some(NextEvent::SuddenDeath),
            NextEvent::SuddenDeath => Some(NextEvent::GameEnd),
            NextEvent::GameEnd => None,
            _ => Some(NextEvent::BedsDestroy),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NextEvent::DiamondGeneratorTierII => "DIAMOND_GENERATOR_TIER_II",
            NextEvent::EmeraldGeneratorTierII => "EMERALD_GENERATOR_TIER_II",
            NextEvent::DiamondGeneratorTierIII => "DIAMOND_GENERATOR_TIER_III",
            NextEvent::EmeraldGeneratorTierIII => "EMERALD_GENERATOR_TIER_III",
            NextEvent::BedsDestroy => "BEDS_DESTROY",
            NextEvent::SuddenDeath => "ENDER_DRAGON",
            NextEvent::GameEnd => "GAME_END",
        }
    }
}

impl std::fmt::Display for NextEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain events produced by the state machine and the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum ArenaEvent {
    /// Arena lifecycle changed
    PhaseChanged { old: Phase, new: Phase },
    /// A new timed event is armed
    NextEventArmed { event: NextEvent },
    /// All generators of a kind moved to a new tier
    GeneratorUpgraded { kind: GeneratorKind, tier: u8 },
    /// Every bed was destroyed by the timer
    BedsDestroyed,
    /// Sudden death began
    SuddenDeath {
        /// Clear the column below these generators
        clear_airspace: Vec<Location>,
        /// Hostile entities to spawn per team that still has members
        dragons: Vec<(TeamColor, u32)>,
    },
    /// Team lost its bed and its last member
    TeamEliminated { team: TeamColor },
    /// Match finished (winner computed)
    MatchEnded { result: MatchResult },
    /// Nearest teammate distance for the action bar
    TeammateDistance { player: PlayerId, team: TeamColor, distance: u32 },
    /// Player idled long enough to be flagged AFK
    PlayerAfk { player: PlayerId },
    /// Respawn countdown shown to a dead player
    RespawnPending { player: PlayerId, remaining: u32 },
    /// Player returned to their team
    PlayerRespawned { player: PlayerId, team: TeamColor },
    /// Player moved to the spectator roster
    BecameSpectator { player: PlayerId },
    /// Temporary invisibility ended, armor should be shown again
    InvisibilityExpired { player: PlayerId, team: Option<TeamColor> },
    /// Lobby countdown shown while starting
    StartingCountdown { remaining: u32 },
    /// A generator dropped a resource
    ResourceDropped { generator: GeneratorId, kind: GeneratorKind, location: Location },
}

impl ArenaEvent {
    /// Whether this event changes what the distributed record advertises
    pub fn is_status_relevant(&self) -> bool {
        matches!(
            self,
            ArenaEvent::PhaseChanged { .. }
                | ArenaEvent::BecameSpectator { .. }
                | ArenaEvent::TeamEliminated { .. }
        )
    }
}
