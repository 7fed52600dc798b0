//! Arena tick scheduler
//!
//! Called once per second per arena. Each armed [`NextEvent`] maps to an
//! [`EventSlot`]: a countdown check that only does arithmetic on the
//! [`CountdownRegistry`], and an effect step that mutates arena state and
//! emits [`ArenaEvent`]s. Session timers (teammate tracking, AFK, respawn,
//! invisibility) share the same clock.

use smallvec::SmallVec;

use crate::game::countdown::{Countdown, CountdownRegistry};
use crate::game::events::{ArenaEvent, NextEvent};
use crate::game::generator::GeneratorKind;
use crate::game::match_result::{check_match_end, MatchEndReason};
use crate::game::state::{Arena, ArenaError, Phase, PlayerId};
use crate::game::timers::SessionTimers;

/// Events whose countdown reached zero this tick
type Fired = SmallVec<[NextEvent; 2]>;

/// Dispatch entry for one armed event
struct EventSlot {
    /// Decrement the counters owned by the event; no other state is touched
    check: fn(&mut CountdownRegistry, (u8, u8)) -> Fired,
    /// Apply the fired events to the arena and advance the state machine
    effect: fn(&mut Arena, &[NextEvent]) -> Result<Vec<ArenaEvent>, ArenaError>,
}

static GENERATOR_SLOT: EventSlot = EventSlot {
    check: check_generators,
    effect: upgrade_generators,
};

static BEDS_DESTROY_SLOT: EventSlot = EventSlot {
    check: check_beds_destroy,
    effect: destroy_beds,
};

static SUDDEN_DEATH_SLOT: EventSlot = EventSlot {
    check: check_dragon_spawn,
    effect: start_sudden_death,
};

static GAME_END_SLOT: EventSlot = EventSlot {
    check: check_game_end,
    effect: end_game,
};

fn slot_for(event: NextEvent) -> &'static EventSlot {
    match event {
        NextEvent::DiamondGeneratorTierII
        | NextEvent::EmeraldGeneratorTierII
        | NextEvent::DiamondGeneratorTierIII
        | NextEvent::EmeraldGeneratorTierIII => &GENERATOR_SLOT,
        NextEvent::BedsDestroy => &BEDS_DESTROY_SLOT,
        NextEvent::SuddenDeath => &SUDDEN_DEATH_SLOT,
        NextEvent::GameEnd => &GAME_END_SLOT,
    }
}

fn fire_if(countdown: &mut Countdown, event: NextEvent) -> Fired {
    let mut fired = Fired::new();
    if countdown.tick() {
        fired.push(event);
    }
    fired
}

fn check_beds_destroy(countdowns: &mut CountdownRegistry, _: (u8, u8)) -> Fired {
    fire_if(&mut countdowns.beds_destroy, NextEvent::BedsDestroy)
}

fn check_dragon_spawn(countdowns: &mut CountdownRegistry, _: (u8, u8)) -> Fired {
    fire_if(&mut countdowns.dragon_spawn, NextEvent::SuddenDeath)
}

fn check_game_end(countdowns: &mut CountdownRegistry, _: (u8, u8)) -> Fired {
    fire_if(&mut countdowns.game_end, NextEvent::GameEnd)
}

/// Both generator counters tick independently; each may fire on its own
fn check_generators(countdowns: &mut CountdownRegistry, (diamond_tier, emerald_tier): (u8, u8)) -> Fired {
    let mut fired = Fired::new();
    if countdowns.diamond_upgrade.tick() {
        fired.extend(NextEvent::generator_upgrade(GeneratorKind::Diamond, diamond_tier));
    }
    if countdowns.emerald_upgrade.tick() {
        fired.extend(NextEvent::generator_upgrade(GeneratorKind::Emerald, emerald_tier));
    }
    fired
}

fn upgrade_generators(arena: &mut Arena, fired: &[NextEvent]) -> Result<Vec<ArenaEvent>, ArenaError> {
    let mut events = Vec::new();
    for event in fired {
        events.extend(arena.advance_next_event(*event)?);
    }
    Ok(events)
}

fn destroy_beds(arena: &mut Arena, fired: &[NextEvent]) -> Result<Vec<ArenaEvent>, ArenaError> {
    arena.destroy_all_beds();
    let mut events = vec![ArenaEvent::BedsDestroyed];
    for event in fired {
        events.extend(arena.advance_next_event(*event)?);
    }
    events.extend(arena.check_eliminations());
    Ok(events)
}

fn start_sudden_death(arena: &mut Arena, fired: &[NextEvent]) -> Result<Vec<ArenaEvent>, ArenaError> {
    let clear_airspace = if arena.config().replace_air_sudden_death {
        arena.generators.iter().map(|g| g.location.clone()).collect()
    } else {
        Vec::new()
    };
    let dragons = arena
        .teams
        .iter()
        .filter(|t| !t.members.is_empty())
        .map(|t| (t.color, t.dragons))
        .collect();

    let mut events = vec![ArenaEvent::SuddenDeath {
        clear_airspace,
        dragons,
    }];
    for event in fired {
        events.extend(arena.advance_next_event(*event)?);
    }
    Ok(events)
}

fn end_game(arena: &mut Arena, fired: &[NextEvent]) -> Result<Vec<ArenaEvent>, ArenaError> {
    let mut events = Vec::new();
    for event in fired {
        events.extend(arena.advance_next_event(*event)?);
    }
    let result = arena.check_winner(MatchEndReason::TimeLimit);
    events.push(ArenaEvent::MatchEnded { result });
    events.extend(arena.change_status(Phase::Restarting)?);
    Ok(events)
}

/// Phase countdowns treat a zero start as already elapsed
fn elapse(countdown: &mut Countdown) -> bool {
    countdown.is_zero() || countdown.tick()
}

/// Per-arena tick driver state
#[derive(Debug, Default)]
pub struct EventScheduler {
    ticks: u64,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick. An error means the event order was violated and the
    /// arena must stop ticking.
    pub fn tick(&mut self, arena: &mut Arena, timers: &mut SessionTimers) -> Result<Vec<ArenaEvent>, ArenaError> {
        self.ticks += 1;
        let mut events = Vec::new();

        match arena.phase() {
            Phase::Waiting => {
                if arena.player_count() > 0 && arena.player_count() >= arena.min_players {
                    events.extend(arena.change_status(Phase::Starting)?);
                }
            }
            Phase::Starting => {
                if arena.player_count() == 0 || arena.player_count() < arena.min_players {
                    events.extend(arena.change_status(Phase::Waiting)?);
                } else {
                    events.push(ArenaEvent::StartingCountdown {
                        remaining: arena.countdowns.starting.remaining(),
                    });
                    if elapse(&mut arena.countdowns.starting) {
                        timers.clear();
                        events.extend(arena.change_status(Phase::Playing)?);
                    }
                }
            }
            Phase::Playing => {
                let slot = slot_for(arena.next_event());
                let tiers = (arena.diamond_tier(), arena.emerald_tier());
                let fired = (slot.check)(&mut arena.countdowns, tiers);
                if !fired.is_empty() {
                    events.extend((slot.effect)(arena, &fired)?);
                }
            }
            Phase::Restarting => {
                if elapse(&mut arena.countdowns.restarting) {
                    timers.clear();
                    events.extend(arena.change_status(Phase::Waiting)?);
                }
            }
        }

        if arena.phase() == Phase::Playing {
            track_teammates(arena, timers, &mut events);
        }
        tick_afk(arena, timers, &mut events);
        tick_respawns(arena, timers, &mut events);
        tick_show_time(arena, timers, &mut events);

        if arena.phase() == Phase::Playing {
            events.extend(arena.check_eliminations());
            if let Some(reason) = check_match_end(arena) {
                let result = arena.check_winner(reason);
                events.push(ArenaEvent::MatchEnded { result });
                events.extend(arena.change_status(Phase::Restarting)?);
            }
        }

        Ok(events)
    }
}

/// Advance every generator's drop timer (nested ticker, playing only)
pub fn tick_generators(arena: &mut Arena) -> Vec<ArenaEvent> {
    if arena.phase() != Phase::Playing {
        return Vec::new();
    }
    arena
        .generators
        .iter_mut()
        .filter_map(|g| {
            g.tick().then(|| ArenaEvent::ResourceDropped {
                generator: g.id,
                kind: g.kind,
                location: g.location.clone(),
            })
        })
        .collect()
}

/// Nearest same-world teammate for every living member of a multi-member team
fn track_teammates(arena: &Arena, timers: &SessionTimers, events: &mut Vec<ArenaEvent>) {
    if !arena.config().teammate_tracking {
        return;
    }

    for team in arena.alive_teams().filter(|t| t.size() > 1) {
        let living: Vec<_> = team
            .members
            .iter()
            .filter(|m| !timers.is_respawning(**m))
            .filter_map(|m| arena.get_player(*m))
            .collect();

        for player in &living {
            let nearest = living
                .iter()
                .filter(|other| other.id != player.id)
                .filter_map(|other| player.location.distance(&other.location))
                .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.min(d))));

            if let Some(distance) = nearest {
                events.push(ArenaEvent::TeammateDistance {
                    player: player.id,
                    team: team.color,
                    distance: distance as u32,
                });
            }
        }
    }
}

fn tick_afk(arena: &Arena, timers: &mut SessionTimers, events: &mut Vec<ArenaEvent>) {
    let mut roster: Vec<PlayerId> = arena.player_ids();
    roster.sort();
    for player in timers.tick_afk(&roster) {
        events.push(ArenaEvent::PlayerAfk { player });
    }
}

/// Expired respawns return to their team; without a team the player spectates.
/// Players who left the arena are dropped silently.
fn tick_respawns(arena: &mut Arena, timers: &mut SessionTimers, events: &mut Vec<ArenaEvent>) {
    let tick = timers.tick_respawns();

    for (player, remaining) in tick.pending {
        if arena.contains(player) {
            events.push(ArenaEvent::RespawnPending { player, remaining });
        }
    }

    for player in tick.expired {
        if !arena.contains(player) {
            tracing::debug!("Dropping respawn session for {} (no longer in {})", player, arena.identifier);
            continue;
        }
        match arena.team_of(player).map(|t| t.color) {
            Some(team) => events.push(ArenaEvent::PlayerRespawned { player, team }),
            None => {
                if arena.make_spectator(player) {
                    events.push(ArenaEvent::BecameSpectator { player });
                }
            }
        }
    }
}

fn tick_show_time(arena: &Arena, timers: &mut SessionTimers, events: &mut Vec<ArenaEvent>) {
    for player in timers.tick_show_time().expired {
        if !arena.contains(player) {
            continue;
        }
        events.push(ArenaEvent::InvisibilityExpired {
            player,
            team: arena.team_of(player).map(|t| t.color),
        });
    }
}
