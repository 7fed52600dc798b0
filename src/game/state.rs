//! Arena state and the phase/event state machine
//!
//! Holds the arena's phase, the armed [`NextEvent`], rosters, teams and
//! generators. Transition operations return the domain events they cause;
//! nothing in here performs I/O.

use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::config::{ArenaTemplate, GameplayConfig};
use crate::game::constants::generator::MAX_TIER;
use crate::game::countdown::CountdownRegistry;
use crate::game::events::{ArenaEvent, NextEvent};
use crate::game::generator::{Generator, GeneratorKind, Location};
use crate::game::match_result::{self, MatchEndReason, MatchResult};
use crate::game::team::{Team, TeamColor};
use crate::lobby::player::ArenaPlayer;

/// Unique player identifier
pub type PlayerId = Uuid;

/// Top-level arena lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Waiting,
    Starting,
    Playing,
    Restarting,
}

impl Phase {
    /// Legal edges of the lifecycle cycle
    pub fn can_transition_to(&self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Waiting, Phase::Starting)
                | (Phase::Starting, Phase::Waiting)
                | (Phase::Starting, Phase::Playing)
                | (Phase::Playing, Phase::Restarting)
                | (Phase::Restarting, Phase::Waiting)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::Starting => "starting",
            Phase::Playing => "playing",
            Phase::Restarting => "restarting",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arena errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    #[error("Illegal phase transition {from} -> {to}")]
    IllegalTransition { from: Phase, to: Phase },
    #[error("Event {0} fired outside the playing phase")]
    NotPlaying(NextEvent),
    #[error("Event {fired} fired while {armed} is armed")]
    OutOfOrder { fired: NextEvent, armed: NextEvent },
    #[error("Event {0} already consumed in this match")]
    EventRepeated(NextEvent),
    #[error("Arena is full")]
    ArenaFull,
    #[error("Match already in progress")]
    GameInProgress,
    #[error("Player already in arena")]
    AlreadyInArena,
    #[error("Player not found")]
    PlayerNotFound,
    #[error("Spectating is not allowed")]
    SpectateNotAllowed,
    #[error("Team {0} not found")]
    TeamNotFound(TeamColor),
    #[error("Team {0} is full")]
    TeamFull(TeamColor),
}

impl ArenaError {
    /// The total event order was violated; the arena cannot keep ticking
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            ArenaError::OutOfOrder { .. } | ArenaError::EventRepeated(_) | ArenaError::NotPlaying(_)
        )
    }
}

/// One independent match instance
#[derive(Debug, Clone)]
pub struct Arena {
    /// Template name
    pub name: String,
    /// Unique instance identifier (world name)
    pub identifier: String,
    pub group: String,
    pub teams: Vec<Team>,
    pub generators: Vec<Generator>,
    pub max_in_team: usize,
    pub min_players: usize,
    pub allow_spectate: bool,
    pub countdowns: CountdownRegistry,
    phase: Phase,
    next_event: NextEvent,
    players: HashMap<PlayerId, ArenaPlayer>,
    spectators: HashMap<PlayerId, ArenaPlayer>,
    diamond_tier: u8,
    emerald_tier: u8,
    /// Events consumed in the current match, in firing order
    history: SmallVec<[NextEvent; 8]>,
    last_result: Option<MatchResult>,
    matches_played: u32,
    config: Arc<GameplayConfig>,
}

impl Arena {
    pub fn new(template: &ArenaTemplate, identifier: String, config: Arc<GameplayConfig>) -> Self {
        let teams = template
            .teams
            .iter()
            .map(|color| Team::new(*color, config.dragons_per_team))
            .collect();

        Self {
            name: template.name.clone(),
            identifier,
            group: template.group.clone(),
            teams,
            generators: Vec::new(),
            max_in_team: template.max_in_team,
            min_players: template.min_players,
            allow_spectate: template.allow_spectate,
            countdowns: CountdownRegistry::from_config(&config),
            phase: Phase::Waiting,
            next_event: NextEvent::FIRST,
            players: HashMap::new(),
            spectators: HashMap::new(),
            diamond_tier: 1,
            emerald_tier: 1,
            history: SmallVec::new(),
            last_result: None,
            matches_played: 0,
            config,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn next_event(&self) -> NextEvent {
        self.next_event
    }

    pub fn config(&self) -> &GameplayConfig {
        &self.config
    }

    pub fn diamond_tier(&self) -> u8 {
        self.diamond_tier
    }

    pub fn emerald_tier(&self) -> u8 {
        self.emerald_tier
    }

    /// Events consumed so far in this match
    pub fn history(&self) -> &[NextEvent] {
        &self.history
    }

    pub fn last_result(&self) -> Option<&MatchResult> {
        self.last_result.as_ref()
    }

    pub fn matches_played(&self) -> u32 {
        self.matches_played
    }

    pub fn max_players(&self) -> usize {
        self.teams.len() * self.max_in_team
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.player_count() >= self.max_players()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.spectators.is_empty()
    }

    pub fn players(&self) -> impl Iterator<Item = &ArenaPlayer> {
        self.players.values()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    pub fn spectators(&self) -> impl Iterator<Item = &ArenaPlayer> {
        self.spectators.values()
    }

    pub fn get_player(&self, player: PlayerId) -> Option<&ArenaPlayer> {
        self.players.get(&player)
    }

    pub fn get_player_mut(&mut self, player: PlayerId) -> Option<&mut ArenaPlayer> {
        self.players.get_mut(&player)
    }

    pub fn is_spectator(&self, player: PlayerId) -> bool {
        self.spectators.contains_key(&player)
    }

    /// Player or spectator of this arena
    pub fn contains(&self, player: PlayerId) -> bool {
        self.players.contains_key(&player) || self.spectators.contains_key(&player)
    }

    pub fn team(&self, color: TeamColor) -> Option<&Team> {
        self.teams.iter().find(|t| t.color == color)
    }

    pub fn team_mut(&mut self, color: TeamColor) -> Option<&mut Team> {
        self.teams.iter_mut().find(|t| t.color == color)
    }

    /// The player's team, if it still exists for them
    pub fn team_of(&self, player: PlayerId) -> Option<&Team> {
        self.teams
            .iter()
            .find(|t| !t.eliminated && t.is_member(player))
    }

    /// Teams still in the match
    pub fn alive_teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.iter().filter(|t| t.is_alive())
    }

    pub fn add_generator(&mut self, kind: GeneratorKind, location: Location, owner: Option<TeamColor>) {
        let id = self.generators.len() as u32;
        if let Some(color) = owner {
            if let Some(team) = self.team_mut(color) {
                team.generators.push(id);
            }
        }
        self.generators.push(Generator::new(id, kind, location, owner));
    }

    /// Add a player to the roster (only before the match starts)
    pub fn add_player(&mut self, player: ArenaPlayer) -> Result<(), ArenaError> {
        if !matches!(self.phase, Phase::Waiting | Phase::Starting) {
            return Err(ArenaError::GameInProgress);
        }
        if self.contains(player.id) {
            return Err(ArenaError::AlreadyInArena);
        }
        if self.is_full() {
            return Err(ArenaError::ArenaFull);
        }
        self.players.insert(player.id, player);
        Ok(())
    }

    /// Join as spectator
    pub fn add_spectator(&mut self, player: ArenaPlayer) -> Result<(), ArenaError> {
        if !self.allow_spectate {
            return Err(ArenaError::SpectateNotAllowed);
        }
        if self.contains(player.id) {
            return Err(ArenaError::AlreadyInArena);
        }
        self.spectators.insert(player.id, player);
        Ok(())
    }

    /// Move a player from the roster to the spectators, dropping team membership
    pub fn make_spectator(&mut self, player: PlayerId) -> bool {
        let Some(record) = self.players.remove(&player) else {
            return false;
        };
        for team in &mut self.teams {
            team.remove_member(player);
        }
        self.spectators.insert(player, record);
        true
    }

    /// Remove a player or spectator entirely
    pub fn remove_player(&mut self, player: PlayerId) -> Option<ArenaPlayer> {
        for team in &mut self.teams {
            team.remove_member(player);
        }
        self.players
            .remove(&player)
            .or_else(|| self.spectators.remove(&player))
    }

    pub fn assign_team(&mut self, player: PlayerId, color: TeamColor) -> Result<(), ArenaError> {
        if !self.players.contains_key(&player) {
            return Err(ArenaError::PlayerNotFound);
        }
        let max_in_team = self.max_in_team;
        let team = self.team(color).ok_or(ArenaError::TeamNotFound(color))?;
        if team.size() >= max_in_team && !team.is_member(player) {
            return Err(ArenaError::TeamFull(color));
        }
        for team in &mut self.teams {
            team.remove_member(player);
        }
        if let Some(team) = self.team_mut(color) {
            team.add_member(player);
        }
        Ok(())
    }

    /// Put every unassigned player into the least populated team with space
    pub fn auto_assign_teams(&mut self) {
        let mut unassigned: Vec<PlayerId> = self
            .players
            .keys()
            .copied()
            .filter(|id| !self.teams.iter().any(|t| t.is_member(*id)))
            .collect();
        unassigned.sort();

        for player in unassigned {
            let max_in_team = self.max_in_team;
            if let Some(team) = self
                .teams
                .iter_mut()
                .filter(|t| t.size() < max_in_team)
                .min_by_key(|t| t.size())
            {
                team.add_member(player);
            }
        }
    }

    /// Phase transition. Entering a phase re-arms the countdowns it owns.
    pub fn change_status(&mut self, next: Phase) -> Result<Vec<ArenaEvent>, ArenaError> {
        let old = self.phase;
        if !old.can_transition_to(next) {
            return Err(ArenaError::IllegalTransition { from: old, to: next });
        }

        let mut events = Vec::new();
        match next {
            Phase::Starting => {
                self.countdowns.starting.reset(self.config.start_countdown);
            }
            Phase::Playing => {
                self.auto_assign_teams();
                self.countdowns.reset(&self.config);
                self.diamond_tier = 1;
                self.emerald_tier = 1;
                self.history.clear();
                self.last_result = None;
                // A track configured to start at zero never upgrades
                if self.countdowns.diamond_upgrade.is_zero() {
                    self.diamond_tier = MAX_TIER;
                }
                if self.countdowns.emerald_upgrade.is_zero() {
                    self.emerald_tier = MAX_TIER;
                }
                self.next_event = self.next_generator_event();
                events.push(ArenaEvent::NextEventArmed {
                    event: self.next_event,
                });
            }
            Phase::Restarting => {
                self.countdowns.restarting.reset(self.config.restart_countdown);
                self.matches_played += 1;
            }
            Phase::Waiting => {
                if old == Phase::Restarting {
                    self.reset();
                }
            }
        }

        self.phase = next;
        events.insert(0, ArenaEvent::PhaseChanged { old, new: next });
        Ok(events)
    }

    /// Consume `fired` and arm the next event.
    ///
    /// Generator upgrades may fire in either track order while the generator
    /// stage is armed; every other event must be the armed one. An event is
    /// never consumed twice within one match.
    pub fn advance_next_event(&mut self, fired: NextEvent) -> Result<Vec<ArenaEvent>, ArenaError> {
        if self.phase != Phase::Playing {
            return Err(ArenaError::NotPlaying(fired));
        }
        if self.history.contains(&fired) {
            return Err(ArenaError::EventRepeated(fired));
        }

        let armed = self.next_event;
        let mut events = Vec::new();

        if let Some((kind, tier)) = fired.upgrade_target() {
            let pending = NextEvent::generator_upgrade(kind, self.tier_of(kind));
            if armed.stage() != 0 || pending != Some(fired) {
                return Err(ArenaError::OutOfOrder { fired, armed });
            }
            self.history.push(fired);
            self.upgrade_track(kind, tier);
            events.push(ArenaEvent::GeneratorUpgraded { kind, tier });
        } else {
            if fired != armed {
                return Err(ArenaError::OutOfOrder { fired, armed });
            }
            self.history.push(fired);
        }

        let next = if armed.stage() == 0 {
            self.next_generator_event()
        } else {
            armed.following_stage().unwrap_or(armed)
        };

        if next != armed {
            if self.history.contains(&next) {
                return Err(ArenaError::EventRepeated(next));
            }
            self.next_event = next;
            events.push(ArenaEvent::NextEventArmed { event: next });
        }

        Ok(events)
    }

    /// Pending generator upgrade with the fewest ticks left (diamond wins ties),
    /// or beds-destroy once both tracks are finished
    fn next_generator_event(&self) -> NextEvent {
        let diamond = NextEvent::generator_upgrade(GeneratorKind::Diamond, self.diamond_tier)
            .map(|e| (self.countdowns.diamond_upgrade.remaining(), e));
        let emerald = NextEvent::generator_upgrade(GeneratorKind::Emerald, self.emerald_tier)
            .map(|e| (self.countdowns.emerald_upgrade.remaining(), e));

        [diamond, emerald]
            .into_iter()
            .flatten()
            .min_by_key(|(remaining, _)| *remaining)
            .map(|(_, event)| event)
            .unwrap_or(NextEvent::BedsDestroy)
    }

    fn tier_of(&self, kind: GeneratorKind) -> u8 {
        match kind {
            GeneratorKind::Diamond => self.diamond_tier,
            GeneratorKind::Emerald => self.emerald_tier,
            _ => MAX_TIER,
        }
    }

    fn upgrade_track(&mut self, kind: GeneratorKind, tier: u8) {
        let rearm = if tier < MAX_TIER {
            match kind {
                GeneratorKind::Diamond => self.config.diamond_tier_iii_start,
                _ => self.config.emerald_tier_iii_start,
            }
        } else {
            0
        };
        for generator in self.generators.iter_mut().filter(|g| g.kind == kind) {
            generator.upgrade(tier);
        }

        // A zero re-arm value finishes the track
        let track_tier = if rearm == 0 { MAX_TIER } else { tier };
        match kind {
            GeneratorKind::Diamond => {
                self.diamond_tier = track_tier;
                self.countdowns.diamond_upgrade.reset(rearm);
            }
            _ => {
                self.emerald_tier = track_tier;
                self.countdowns.emerald_upgrade.reset(rearm);
            }
        }
    }

    pub fn destroy_all_beds(&mut self) {
        for team in &mut self.teams {
            team.bed_destroyed = true;
        }
    }

    /// Eliminate teams that lost their bed and every member
    pub fn check_eliminations(&mut self) -> Vec<ArenaEvent> {
        self.teams
            .iter_mut()
            .filter_map(|t| {
                t.check_eliminated()
                    .then_some(ArenaEvent::TeamEliminated { team: t.color })
            })
            .collect()
    }

    /// Death without a bed: the player leaves the team for good
    pub fn final_kill(&mut self, player: PlayerId) -> Vec<ArenaEvent> {
        let bedless = self
            .team_of(player)
            .map(|t| t.bed_destroyed)
            .unwrap_or(false);
        if !bedless || !self.make_spectator(player) {
            return Vec::new();
        }
        let mut events = vec![ArenaEvent::BecameSpectator { player }];
        events.extend(self.check_eliminations());
        events
    }

    /// Compute and remember the match result
    pub fn check_winner(&mut self, reason: MatchEndReason) -> MatchResult {
        let result = match_result::determine_result(self, reason);
        self.last_result = Some(result.clone());
        result
    }

    /// Back to a fresh waiting arena
    pub fn reset(&mut self) {
        let dragons = self.config.dragons_per_team;
        for team in &mut self.teams {
            team.reset(dragons);
        }
        for generator in &mut self.generators {
            generator.reset();
        }
        self.players.clear();
        self.spectators.clear();
        self.countdowns.reset(&self.config);
        self.diamond_tier = 1;
        self.emerald_tier = 1;
        self.history.clear();
        self.next_event = NextEvent::FIRST;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_config() -> GameplayConfig {
        GameplayConfig {
            start_countdown: 3,
            restart_countdown: 2,
            beds_destroy_countdown: 3,
            dragon_spawn_countdown: 2,
            game_end_countdown: 2,
            diamond_tier_ii_start: 2,
            diamond_tier_iii_start: 4,
            emerald_tier_ii_start: 3,
            emerald_tier_iii_start: 4,
            respawn_countdown: 5,
            teammate_tracking: true,
            replace_air_sudden_death: true,
            dragons_per_team: 1,
        }
    }

    pub(crate) fn test_player(world: &str) -> ArenaPlayer {
        ArenaPlayer::new(Uuid::new_v4(), "Player".to_string(), Location::new(world, 0.0, 64.0, 0.0))
    }

    /// Two-team arena with one player per team, already playing
    pub(crate) fn playing_arena(config: GameplayConfig) -> (Arena, PlayerId, PlayerId) {
        let mut template = ArenaTemplate::new("Lighthouse");
        template.teams = vec![TeamColor::Red, TeamColor::Blue];
        template.max_in_team = 2;
        let mut arena = Arena::new(&template, "bw_lighthouse_1".to_string(), Arc::new(config));

        let red = test_player("bw_lighthouse_1");
        let blue = test_player("bw_lighthouse_1");
        let (red_id, blue_id) = (red.id, blue.id);
        arena.add_player(red).unwrap();
        arena.add_player(blue).unwrap();
        arena.assign_team(red_id, TeamColor::Red).unwrap();
        arena.assign_team(blue_id, TeamColor::Blue).unwrap();

        arena.change_status(Phase::Starting).unwrap();
        arena.change_status(Phase::Playing).unwrap();
        (arena, red_id, blue_id)
    }

    #[test]
    fn test_phase_cycle() {
        let (mut arena, _, _) = playing_arena(test_config());
        assert_eq!(arena.phase(), Phase::Playing);

        arena.change_status(Phase::Restarting).unwrap();
        let events = arena.change_status(Phase::Waiting).unwrap();

        assert_eq!(arena.phase(), Phase::Waiting);
        assert_eq!(
            events[0],
            ArenaEvent::PhaseChanged { old: Phase::Restarting, new: Phase::Waiting }
        );
        // Reset on completing restarting
        assert_eq!(arena.player_count(), 0);
        assert!(arena.history().is_empty());
        assert_eq!(arena.countdowns, CountdownRegistry::from_config(arena.config()));
    }

    #[test]
    fn test_illegal_transition() {
        let (mut arena, _, _) = playing_arena(test_config());
        let result = arena.change_status(Phase::Waiting);
        assert!(matches!(result, Err(ArenaError::IllegalTransition { .. })));
    }

    #[test]
    fn test_first_event_is_soonest_generator() {
        let (arena, _, _) = playing_arena(test_config());
        assert_eq!(arena.next_event(), NextEvent::DiamondGeneratorTierII);

        let mut config = test_config();
        config.emerald_tier_ii_start = 1;
        let (arena, _, _) = playing_arena(config);
        assert_eq!(arena.next_event(), NextEvent::EmeraldGeneratorTierII);
    }

    #[test]
    fn test_advance_generator_rearms_counter() {
        let (mut arena, _, _) = playing_arena(test_config());
        arena.countdowns.diamond_upgrade.reset(0);

        let events = arena.advance_next_event(NextEvent::DiamondGeneratorTierII).unwrap();

        assert_eq!(arena.diamond_tier(), 2);
        assert_eq!(arena.countdowns.diamond_upgrade.remaining(), 4);
        assert!(events.contains(&ArenaEvent::GeneratorUpgraded { kind: GeneratorKind::Diamond, tier: 2 }));
        // Emerald (3 left) is now sooner than diamond tier III (4 left)
        assert_eq!(arena.next_event(), NextEvent::EmeraldGeneratorTierII);
    }

    #[test]
    fn test_advance_rejects_repeat() {
        let (mut arena, _, _) = playing_arena(test_config());
        arena.advance_next_event(NextEvent::DiamondGeneratorTierII).unwrap();
        let result = arena.advance_next_event(NextEvent::DiamondGeneratorTierII);
        assert_eq!(result, Err(ArenaError::EventRepeated(NextEvent::DiamondGeneratorTierII)));
        assert!(result.unwrap_err().is_invariant_violation());
    }

    #[test]
    fn test_advance_rejects_out_of_order() {
        let (mut arena, _, _) = playing_arena(test_config());
        let result = arena.advance_next_event(NextEvent::BedsDestroy);
        assert!(matches!(result, Err(ArenaError::OutOfOrder { .. })));

        // Tier III cannot fire before tier II of the same track
        let result = arena.advance_next_event(NextEvent::DiamondGeneratorTierIII);
        assert!(matches!(result, Err(ArenaError::OutOfOrder { .. })));
    }

    #[test]
    fn test_full_event_order() {
        let (mut arena, _, _) = playing_arena(test_config());
        for event in [
            NextEvent::DiamondGeneratorTierII,
            NextEvent::EmeraldGeneratorTierII,
            NextEvent::DiamondGeneratorTierIII,
            NextEvent::EmeraldGeneratorTierIII,
        ] {
            arena.advance_next_event(event).unwrap();
        }
        assert_eq!(arena.next_event(), NextEvent::BedsDestroy);

        arena.advance_next_event(NextEvent::BedsDestroy).unwrap();
        assert_eq!(arena.next_event(), NextEvent::SuddenDeath);
        arena.advance_next_event(NextEvent::SuddenDeath).unwrap();
        assert_eq!(arena.next_event(), NextEvent::GameEnd);
        assert_eq!(arena.history().len(), 6);
    }

    #[test]
    fn test_advance_outside_playing() {
        let template = ArenaTemplate::new("Lighthouse");
        let mut arena = Arena::new(&template, "bw_1".to_string(), Arc::new(test_config()));
        let result = arena.advance_next_event(NextEvent::DiamondGeneratorTierII);
        assert!(matches!(result, Err(ArenaError::NotPlaying(_))));
    }

    #[test]
    fn test_zero_start_disables_track() {
        let mut config = test_config();
        config.diamond_tier_ii_start = 0;
        let (arena, _, _) = playing_arena(config);
        assert_eq!(arena.diamond_tier(), MAX_TIER);
        assert_eq!(arena.next_event(), NextEvent::EmeraldGeneratorTierII);
    }

    #[test]
    fn test_cannot_join_running_match() {
        let (mut arena, _, _) = playing_arena(test_config());
        let result = arena.add_player(test_player("bw_lighthouse_1"));
        assert_eq!(result, Err(ArenaError::GameInProgress));
    }

    #[test]
    fn test_arena_full() {
        let mut template = ArenaTemplate::new("Tiny");
        template.teams = vec![TeamColor::Red, TeamColor::Blue];
        let mut arena = Arena::new(&template, "bw_tiny".to_string(), Arc::new(test_config()));
        arena.add_player(test_player("bw_tiny")).unwrap();
        arena.add_player(test_player("bw_tiny")).unwrap();
        assert_eq!(arena.add_player(test_player("bw_tiny")), Err(ArenaError::ArenaFull));
    }

    #[test]
    fn test_auto_assign_balances_teams() {
        let mut template = ArenaTemplate::new("Lighthouse");
        template.teams = vec![TeamColor::Red, TeamColor::Blue];
        template.max_in_team = 2;
        let mut arena = Arena::new(&template, "bw_1".to_string(), Arc::new(test_config()));
        for _ in 0..4 {
            arena.add_player(test_player("bw_1")).unwrap();
        }
        arena.auto_assign_teams();
        assert!(arena.teams.iter().all(|t| t.size() == 2));
    }

    #[test]
    fn test_final_kill_eliminates_team() {
        let (mut arena, red, _) = playing_arena(test_config());
        arena.destroy_all_beds();

        let events = arena.final_kill(red);

        assert!(events.contains(&ArenaEvent::BecameSpectator { player: red }));
        assert!(events.contains(&ArenaEvent::TeamEliminated { team: TeamColor::Red }));
        assert!(arena.is_spectator(red));
        assert!(arena.team_of(red).is_none());
    }

    #[test]
    fn test_final_kill_with_bed_is_noop() {
        let (mut arena, red, _) = playing_arena(test_config());
        assert!(arena.final_kill(red).is_empty());
        assert!(arena.team_of(red).is_some());
    }
}
