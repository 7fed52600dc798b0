use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{ArenaTemplate, GameplayConfig};
use crate::game::constants::session::INVISIBILITY_DURATION;
use crate::game::constants::tick::{STATS_INTERVAL, TICK_DURATION_MS};
use crate::game::events::ArenaEvent;
use crate::game::generator::Location;
use crate::game::scheduler::{self, EventScheduler};
use crate::game::state::{Arena, ArenaError, Phase, PlayerId};
use crate::game::timers::SessionTimers;
use crate::lobby::effects::ArenaEffects;
use crate::lobby::player::ArenaPlayer;
use crate::metrics::Metrics;
use crate::net::coordinator::Coordinator;
use crate::net::protocol::DistributedRecord;

/// Arena room shared between its tick loop and the manager
pub type SharedRoom = Arc<RwLock<ArenaRoom>>;

/// Held from taking a record snapshot until it is published, so the records
/// of one arena reach the store in snapshot order
pub type PublishGate = Arc<Mutex<()>>;

/// One arena together with its per-arena timers and scheduler
pub struct ArenaRoom {
    pub arena: Arena,
    pub timers: SessionTimers,
    scheduler: EventScheduler,
    template: ArenaTemplate,
    created_at: Instant,
    halted: bool,
}

impl ArenaRoom {
    pub fn new(template: ArenaTemplate, identifier: String, config: Arc<GameplayConfig>) -> Self {
        Self {
            arena: Arena::new(&template, identifier, config),
            timers: SessionTimers::new(),
            scheduler: EventScheduler::new(),
            template,
            created_at: Instant::now(),
            halted: false,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.arena.identifier
    }

    pub fn template(&self) -> &ArenaTemplate {
        &self.template
    }

    /// Stopped after an event order violation
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn ticks(&self) -> u64 {
        self.scheduler.ticks()
    }

    /// Add a player to the roster
    pub fn join(&mut self, player: ArenaPlayer) -> Result<(), RoomError> {
        if self.halted {
            return Err(RoomError::Halted);
        }
        self.arena.add_player(player)?;
        Ok(())
    }

    /// Join as spectator
    pub fn spectate(&mut self, player: ArenaPlayer) -> Result<(), RoomError> {
        if self.halted {
            return Err(RoomError::Halted);
        }
        self.arena.add_spectator(player)?;
        Ok(())
    }

    /// Remove a player and every timer they own
    pub fn leave(&mut self, player_id: PlayerId) -> Option<ArenaPlayer> {
        self.timers.remove_player(player_id);
        let mut player = self.arena.remove_player(player_id)?;
        player.leave();
        Some(player)
    }

    /// A player died. Without a bed this is a final kill, otherwise the
    /// respawn countdown starts.
    pub fn player_died(&mut self, player_id: PlayerId) -> Vec<ArenaEvent> {
        if self.arena.phase() != Phase::Playing {
            return Vec::new();
        }
        let Some(bed_destroyed) = self.arena.team_of(player_id).map(|t| t.bed_destroyed) else {
            return Vec::new();
        };

        self.timers.cancel_invisibility(player_id);
        if bed_destroyed {
            self.timers.remove_player(player_id);
            return self.arena.final_kill(player_id);
        }

        let countdown = self.arena.config().respawn_countdown;
        self.timers.start_respawn(player_id, countdown);
        vec![ArenaEvent::RespawnPending {
            player: player_id,
            remaining: countdown,
        }]
    }

    /// Temporary invisibility, potion length unless given
    pub fn start_invisibility(&mut self, player_id: PlayerId, seconds: Option<u32>) {
        if self.arena.contains(player_id) {
            let seconds = seconds.unwrap_or(INVISIBILITY_DURATION);
            self.timers.start_invisibility(player_id, seconds);
        }
    }

    /// Player moved: store the position and count it as activity.
    /// Returns true if they were AFK.
    pub fn player_moved(&mut self, player_id: PlayerId, location: Location) -> bool {
        match self.arena.get_player_mut(player_id) {
            Some(player) => player.move_to(location),
            None => return false,
        }
        self.timers.record_activity(player_id)
    }

    /// Player interacted. Returns true if they were AFK.
    pub fn record_activity(&mut self, player_id: PlayerId) -> bool {
        if !self.arena.contains(player_id) {
            return false;
        }
        self.timers.record_activity(player_id)
    }

    /// Run one scheduler tick. After an error the room is halted for good.
    pub fn tick(&mut self) -> Result<Vec<ArenaEvent>, ArenaError> {
        if self.halted {
            return Ok(Vec::new());
        }
        let result = self.scheduler.tick(&mut self.arena, &mut self.timers);
        if result.is_err() {
            self.halted = true;
        }
        result
    }

    pub fn tick_generators(&mut self) -> Vec<ArenaEvent> {
        if self.halted {
            return Vec::new();
        }
        scheduler::tick_generators(&mut self.arena)
    }

    pub fn record(&self, server_id: &str) -> DistributedRecord {
        DistributedRecord::from_arena(server_id, &self.arena)
    }

    /// Get room age
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Room errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoomError {
    #[error("Arena halted")]
    Halted,
    #[error(transparent)]
    Arena(#[from] ArenaError),
}

/// Phase change reported to the manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaNotice {
    pub identifier: String,
    pub template: String,
    pub old: Phase,
    pub new: Phase,
}

/// Collaborators shared by every arena loop
#[derive(Clone)]
pub struct LoopContext {
    pub coordinator: Option<Arc<Coordinator>>,
    pub effects: Arc<dyn ArenaEffects>,
    pub metrics: Arc<Metrics>,
    pub notices: Option<mpsc::UnboundedSender<ArenaNotice>>,
}

impl LoopContext {
    /// Hand events to the effect sink, forward phase changes and publish the
    /// record when something status-relevant happened
    pub async fn dispatch(&self, room: &ArenaRoomSnapshot, events: &[ArenaEvent]) {
        let mut relevant = false;
        for event in events {
            self.effects.apply(&room.identifier, event);
            relevant |= event.is_status_relevant();

            if let ArenaEvent::PhaseChanged { old, new } = event {
                if let Some(notices) = &self.notices {
                    // The manager may already be gone during shutdown
                    let _ = notices.send(ArenaNotice {
                        identifier: room.identifier.clone(),
                        template: room.template.clone(),
                        old: *old,
                        new: *new,
                    });
                }
            }
        }

        if relevant {
            self.publish(room).await;
        }
    }

    pub async fn publish(&self, room: &ArenaRoomSnapshot) -> bool {
        match (&self.coordinator, &room.record) {
            (Some(coordinator), Some(record)) => coordinator.publish(record).await,
            _ => false,
        }
    }
}

/// What the loop needs after releasing the room lock
pub struct ArenaRoomSnapshot {
    pub identifier: String,
    pub template: String,
    pub record: Option<DistributedRecord>,
}

impl ArenaRoomSnapshot {
    pub fn of(room: &ArenaRoom, coordinator: Option<&Coordinator>) -> Self {
        Self {
            identifier: room.arena.identifier.clone(),
            template: room.template.name.clone(),
            record: coordinator.map(|c| room.record(c.server_id())),
        }
    }
}

/// Running arena: its room plus the tasks ticking it
pub struct ArenaHandle {
    pub room: SharedRoom,
    gate: PublishGate,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl ArenaHandle {
    /// Cancel the tick loop and the generator ticker and wait for both
    pub async fn stop(self) -> SharedRoom {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            error!("Arena loop ended abnormally: {}", e);
        }
        self.room
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Take before mutating the room when the change will be published
    pub fn gate(&self) -> PublishGate {
        self.gate.clone()
    }
}

/// Spawn the 1 Hz tick loop for a room
pub fn start_arena_loop(room: SharedRoom, ctx: LoopContext) -> ArenaHandle {
    let cancel = CancellationToken::new();
    let gate = PublishGate::default();
    let join = tokio::spawn(run_arena_loop(room.clone(), gate.clone(), ctx, cancel.clone()));
    ArenaHandle {
        room,
        gate,
        cancel,
        join,
    }
}

fn tick_interval() -> tokio::time::Interval {
    let period = Duration::from_millis(TICK_DURATION_MS);
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn run_arena_loop(room: SharedRoom, gate: PublishGate, ctx: LoopContext, cancel: CancellationToken) {
    let generator_cancel = cancel.child_token();
    let generators = tokio::spawn(run_generator_ticker(room.clone(), ctx.effects.clone(), generator_cancel.clone()));

    let mut interval = tick_interval();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let _order = gate.lock().await;
        let started = Instant::now();
        let (result, snapshot) = {
            let mut guard = room.write().await;
            let result = guard.tick();
            if guard.ticks() % STATS_INTERVAL == 0 {
                debug!(
                    "Arena {}: {} phase={} players={} next={}",
                    guard.arena.identifier,
                    guard.ticks(),
                    guard.arena.phase(),
                    guard.arena.player_count(),
                    guard.arena.next_event()
                );
            }
            (result, ArenaRoomSnapshot::of(&guard, ctx.coordinator.as_deref()))
        };
        ctx.metrics.record_tick_time(started.elapsed());

        match result {
            Ok(events) => ctx.dispatch(&snapshot, &events).await,
            Err(e) => {
                Metrics::incr(&ctx.metrics.invariant_violations);
                error!("Arena {} halted: {}", snapshot.identifier, e);
                break;
            }
        }
    }

    generator_cancel.cancel();
    if let Err(e) = generators.await {
        error!("Generator ticker ended abnormally: {}", e);
    }
    debug!("Arena loop stopped");
}

/// Resource drops run on their own ticker so a slow publish never delays them
async fn run_generator_ticker(room: SharedRoom, effects: Arc<dyn ArenaEffects>, cancel: CancellationToken) {
    let mut interval = tick_interval();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let (identifier, drops) = {
            let mut guard = room.write().await;
            (guard.arena.identifier.clone(), guard.tick_generators())
        };
        for event in &drops {
            effects.apply(&identifier, event);
        }
    }
}

/// Log a room being created (shared by manager and tests)
pub(crate) fn log_created(room: &ArenaRoom) {
    info!(
        "Arena {} ({}) ready: {} teams of {}",
        room.arena.identifier,
        room.template.name,
        room.arena.teams.len(),
        room.arena.max_in_team
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::state::tests::{test_config, test_player};
    use crate::game::team::TeamColor;
    use crate::net::store::MemoryStore;
    use parking_lot::Mutex;

    /// Effect sink that records everything
    #[derive(Default)]
    pub(crate) struct CollectEffects {
        pub(crate) events: Mutex<Vec<(String, ArenaEvent)>>,
    }

    impl ArenaEffects for CollectEffects {
        fn apply(&self, arena: &str, event: &ArenaEvent) {
            self.events.lock().push((arena.to_string(), event.clone()));
        }
    }

    pub(crate) fn duo_template() -> ArenaTemplate {
        let mut template = ArenaTemplate::new("Lighthouse");
        template.teams = vec![TeamColor::Red, TeamColor::Blue];
        template.max_in_team = 2;
        template
    }

    fn room() -> ArenaRoom {
        ArenaRoom::new(duo_template(), "bw_lighthouse_1".to_string(), Arc::new(test_config()))
    }

    fn playing_room() -> (ArenaRoom, PlayerId, PlayerId) {
        let mut room = room();
        let (a, b) = (test_player("bw_lighthouse_1"), test_player("bw_lighthouse_1"));
        let (a_id, b_id) = (a.id, b.id);
        room.join(a).unwrap();
        room.join(b).unwrap();
        room.arena.assign_team(a_id, TeamColor::Red).unwrap();
        room.arena.assign_team(b_id, TeamColor::Blue).unwrap();
        room.arena.change_status(Phase::Starting).unwrap();
        room.arena.change_status(Phase::Playing).unwrap();
        (room, a_id, b_id)
    }

    #[test]
    fn test_join_and_leave() {
        let mut room = room();
        let player = test_player("bw_lighthouse_1");
        let id = player.id;

        room.join(player).unwrap();
        room.timers.start_invisibility(id, 5);
        assert_eq!(room.arena.player_count(), 1);

        let left = room.leave(id).unwrap();
        assert!(!left.is_connected());
        assert!(!room.timers.is_invisible(id));
        assert!(room.leave(id).is_none());
    }

    #[test]
    fn test_spectate() {
        let mut room = room();
        let player = test_player("bw_lighthouse_1");
        let id = player.id;
        room.spectate(player).unwrap();
        assert!(room.arena.is_spectator(id));

        room.arena.allow_spectate = false;
        let result = room.spectate(test_player("bw_lighthouse_1"));
        assert_eq!(result, Err(RoomError::Arena(ArenaError::SpectateNotAllowed)));
    }

    #[test]
    fn test_death_with_bed_starts_respawn() {
        let (mut room, red, _) = playing_room();

        let events = room.player_died(red);

        assert_eq!(events, vec![ArenaEvent::RespawnPending { player: red, remaining: 5 }]);
        assert!(room.timers.is_respawning(red));
    }

    #[test]
    fn test_death_without_bed_is_final() {
        let (mut room, red, _) = playing_room();
        room.arena.destroy_all_beds();

        let events = room.player_died(red);

        assert!(events.contains(&ArenaEvent::TeamEliminated { team: TeamColor::Red }));
        assert!(room.arena.is_spectator(red));
        assert!(!room.timers.is_respawning(red));
    }

    #[test]
    fn test_invisibility_defaults_to_potion_length() {
        let (mut room, red, _) = playing_room();
        let stranger = uuid::Uuid::new_v4();
        room.start_invisibility(red, None);
        room.start_invisibility(stranger, Some(3));

        let tick = room.timers.tick_show_time();
        assert_eq!(tick.pending, vec![(red, INVISIBILITY_DURATION)]);
        assert!(!room.timers.is_invisible(stranger));
    }

    #[test]
    fn test_player_moved_updates_location() {
        let (mut room, red, _) = playing_room();
        let spot = Location::new("bw_lighthouse_1", 12.0, 70.0, -3.0);

        assert!(!room.player_moved(red, spot.clone()));
        assert_eq!(room.arena.get_player(red).map(|p| p.location.clone()), Some(spot.clone()));
        assert!(!room.player_moved(uuid::Uuid::new_v4(), spot));
    }

    #[test]
    fn test_record_activity() {
        let (mut room, red, _) = playing_room();
        assert!(!room.record_activity(uuid::Uuid::new_v4()));
        assert!(!room.record_activity(red));
        assert_eq!(room.timers.afk_ticks(red), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_publishes_phase_changes() {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(Metrics::new());
        let coordinator = Arc::new(Coordinator::open("bw1", "bw2023", store.clone(), metrics.clone()).await);
        let effects = Arc::new(CollectEffects::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = LoopContext {
            coordinator: Some(coordinator),
            effects: effects.clone(),
            metrics: metrics.clone(),
            notices: Some(tx),
        };

        let mut room = room();
        room.join(test_player("bw_lighthouse_1")).unwrap();
        room.join(test_player("bw_lighthouse_1")).unwrap();
        let handle = start_arena_loop(Arc::new(RwLock::new(room)), ctx);
        let status = || store.snapshot()["bwa-bw1-bw_lighthouse_1"]["arena_status"].clone();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(status(), "STARTING");

        // start_countdown is 3
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(status(), "PLAYING");

        let room = handle.stop().await;
        assert_eq!(room.read().await.arena.phase(), Phase::Playing);

        let notice = rx.recv().await.unwrap();
        assert_eq!((notice.old, notice.new), (Phase::Waiting, Phase::Starting));
        let notice = rx.recv().await.unwrap();
        assert_eq!((notice.old, notice.new), (Phase::Starting, Phase::Playing));

        assert!(effects
            .events
            .lock()
            .iter()
            .any(|(_, e)| matches!(e, ArenaEvent::NextEventArmed { .. })));
        assert!(metrics.tick_count.load(std::sync::atomic::Ordering::Relaxed) >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_ticking() {
        let ctx = LoopContext {
            coordinator: None,
            effects: Arc::new(CollectEffects::default()),
            metrics: Arc::new(Metrics::new()),
            notices: None,
        };
        let handle = start_arena_loop(Arc::new(RwLock::new(room())), ctx);
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let room = handle.stop().await;
        let ticks = room.read().await.ticks();
        assert_eq!(ticks, 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(room.read().await.ticks(), ticks);
    }
}
