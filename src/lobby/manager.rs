use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ArenaTemplate, GameplayConfig, ServerConfig};
use crate::game::events::ArenaEvent;
use crate::game::state::{Phase, PlayerId};
use crate::lobby::effects::ArenaEffects;
use crate::lobby::player::ArenaPlayer;
use crate::lobby::room::{
    log_created, start_arena_loop, ArenaHandle, ArenaNotice, ArenaRoom, ArenaRoomSnapshot, LoopContext, PublishGate,
    RoomError, SharedRoom,
};
use crate::metrics::Metrics;
use crate::net::coordinator::Coordinator;

/// Owns every arena hosted by this server
pub struct ArenaManager {
    arenas: HashMap<String, ArenaHandle>,
    player_arenas: HashMap<PlayerId, String>,
    templates: Vec<ArenaTemplate>,
    gameplay: Arc<GameplayConfig>,
    max_arenas: usize,
    next_instance: u32,
    ctx: LoopContext,
}

impl ArenaManager {
    /// Returns the manager and the receiver of arena phase notices
    pub fn new(
        config: &ServerConfig,
        coordinator: Option<Arc<Coordinator>>,
        effects: Arc<dyn ArenaEffects>,
        metrics: Arc<Metrics>,
    ) -> (Self, mpsc::UnboundedReceiver<ArenaNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Self {
            arenas: HashMap::new(),
            player_arenas: HashMap::new(),
            templates: config.arenas.clone(),
            gameplay: Arc::new(config.gameplay.clone()),
            max_arenas: config.max_arenas,
            next_instance: 0,
            ctx: LoopContext {
                coordinator,
                effects,
                metrics,
                notices: Some(tx),
            },
        };
        (manager, rx)
    }

    /// Create one arena per configured template
    pub async fn create_initial_arenas(&mut self) -> Result<Vec<String>, ManagerError> {
        let names: Vec<String> = self.templates.iter().map(|t| t.name.clone()).collect();
        let mut created = Vec::with_capacity(names.len());
        for name in names {
            created.push(self.create_arena(&name).await?);
        }
        Ok(created)
    }

    /// Create and start a new arena from a template
    pub async fn create_arena(&mut self, template_name: &str) -> Result<String, ManagerError> {
        if self.arenas.len() >= self.max_arenas {
            return Err(ManagerError::TooManyArenas);
        }
        let template = self
            .templates
            .iter()
            .find(|t| t.name == template_name)
            .cloned()
            .ok_or_else(|| ManagerError::UnknownTemplate(template_name.to_string()))?;

        self.next_instance += 1;
        let identifier = format!("bw_{}_{}", template.name.to_lowercase().replace(' ', "_"), self.next_instance);

        let room = ArenaRoom::new(template, identifier.clone(), self.gameplay.clone());
        log_created(&room);
        // Published before the loop exists, so no later snapshot can race it
        let snapshot = ArenaRoomSnapshot::of(&room, self.ctx.coordinator.as_deref());
        self.ctx.publish(&snapshot).await;
        let handle = start_arena_loop(Arc::new(RwLock::new(room)), self.ctx.clone());
        self.arenas.insert(identifier.clone(), handle);

        self.ctx
            .metrics
            .arenas_active
            .store(self.arenas.len() as u64, Ordering::Relaxed);
        Ok(identifier)
    }

    /// Stop an arena's timers, then drop its record
    pub async fn remove_arena(&mut self, identifier: &str) -> Result<(), ManagerError> {
        let handle = self
            .arenas
            .remove(identifier)
            .ok_or(ManagerError::ArenaNotFound)?;
        let room = handle.stop().await;
        if room.read().await.arena.phase() == Phase::Playing {
            decrement(&self.ctx.metrics.arenas_playing);
        }
        if let Some(coordinator) = &self.ctx.coordinator {
            coordinator.retract(identifier).await;
        }

        self.player_arenas.retain(|_, arena| arena != identifier);
        self.update_gauges();
        info!("Arena {} removed", identifier);
        Ok(())
    }

    pub fn get_room(&self, identifier: &str) -> Option<SharedRoom> {
        self.arenas.get(identifier).map(|h| h.room.clone())
    }

    fn room_and_gate(&self, identifier: &str) -> Option<(SharedRoom, PublishGate)> {
        self.arenas.get(identifier).map(|h| (h.room.clone(), h.gate()))
    }

    /// Join a player to an arena
    pub async fn join(&mut self, identifier: &str, player: ArenaPlayer) -> Result<(), ManagerError> {
        let player_id = player.id;
        if self.player_arenas.contains_key(&player_id) {
            return Err(ManagerError::AlreadyInArena);
        }
        let (room, gate) = self.room_and_gate(identifier).ok_or(ManagerError::ArenaNotFound)?;

        let _order = gate.lock().await;
        let snapshot = {
            let mut guard = room.write().await;
            guard.join(player)?;
            ArenaRoomSnapshot::of(&guard, self.ctx.coordinator.as_deref())
        };
        self.player_arenas.insert(player_id, identifier.to_string());
        self.update_gauges();
        self.ctx.publish(&snapshot).await;
        Ok(())
    }

    /// Join an arena as spectator
    pub async fn spectate(&mut self, identifier: &str, player: ArenaPlayer) -> Result<(), ManagerError> {
        let player_id = player.id;
        if self.player_arenas.contains_key(&player_id) {
            return Err(ManagerError::AlreadyInArena);
        }
        let room = self.get_room(identifier).ok_or(ManagerError::ArenaNotFound)?;
        room.write().await.spectate(player)?;
        self.player_arenas.insert(player_id, identifier.to_string());
        Ok(())
    }

    /// Leave the current arena
    pub async fn leave(&mut self, player_id: PlayerId) -> Result<(), ManagerError> {
        let identifier = self
            .player_arenas
            .remove(&player_id)
            .ok_or(ManagerError::NotInArena)?;

        if let Some((room, gate)) = self.room_and_gate(&identifier) {
            let _order = gate.lock().await;
            let snapshot = {
                let mut guard = room.write().await;
                guard.leave(player_id);
                ArenaRoomSnapshot::of(&guard, self.ctx.coordinator.as_deref())
            };
            self.ctx.publish(&snapshot).await;
        }
        self.update_gauges();
        Ok(())
    }

    /// Report a death and dispatch what it caused
    pub async fn player_died(&mut self, player_id: PlayerId) -> Result<Vec<ArenaEvent>, ManagerError> {
        let identifier = self
            .player_arenas
            .get(&player_id)
            .cloned()
            .ok_or(ManagerError::NotInArena)?;
        let (room, gate) = self.room_and_gate(&identifier).ok_or(ManagerError::ArenaNotFound)?;

        let _order = gate.lock().await;
        let (events, snapshot) = {
            let mut guard = room.write().await;
            let events = guard.player_died(player_id);
            (events, ArenaRoomSnapshot::of(&guard, self.ctx.coordinator.as_deref()))
        };
        self.ctx.dispatch(&snapshot, &events).await;
        Ok(events)
    }

    /// Arena a player is in
    pub fn get_player_arena(&self, player_id: PlayerId) -> Option<&str> {
        self.player_arenas.get(&player_id).map(String::as_str)
    }

    /// Waiting or starting arena in a group with a free slot, fullest first
    pub async fn find_arena(&self, group: &str) -> Option<String> {
        let mut best: Option<(usize, String)> = None;
        for (identifier, handle) in &self.arenas {
            let room = handle.room.read().await;
            let arena = &room.arena;
            if room.is_halted()
                || !arena.group.eq_ignore_ascii_case(group)
                || !matches!(arena.phase(), Phase::Waiting | Phase::Starting)
                || arena.is_full()
            {
                continue;
            }
            let count = arena.player_count();
            if best.as_ref().map_or(true, |(c, _)| count > *c) {
                best = Some((count, identifier.clone()));
            }
        }
        best.map(|(_, identifier)| identifier)
    }

    pub fn arena_count(&self) -> usize {
        self.arenas.len()
    }

    pub fn total_player_count(&self) -> usize {
        self.player_arenas.len()
    }

    /// Get list of arenas (for an arena browser)
    pub async fn list_arenas(&self) -> Vec<ArenaInfo> {
        let mut arenas = Vec::with_capacity(self.arenas.len());
        for handle in self.arenas.values() {
            let room = handle.room.read().await;
            arenas.push(ArenaInfo {
                identifier: room.arena.identifier.clone(),
                name: room.arena.name.clone(),
                group: room.arena.group.clone(),
                phase: room.arena.phase(),
                player_count: room.arena.player_count(),
                max_players: room.arena.max_players(),
            });
        }
        arenas.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        arenas
    }

    /// React to a phase change reported by an arena loop
    pub async fn handle_notice(&mut self, notice: ArenaNotice) {
        debug!("Arena {} {} -> {}", notice.identifier, notice.old, notice.new);
        match notice.new {
            Phase::Playing => {
                Metrics::incr(&self.ctx.metrics.matches_started);
                Metrics::incr(&self.ctx.metrics.arenas_playing);
                self.autoscale(&notice.template).await;
            }
            Phase::Restarting => {
                Metrics::incr(&self.ctx.metrics.matches_finished);
                decrement(&self.ctx.metrics.arenas_playing);
            }
            Phase::Waiting if notice.old == Phase::Restarting => {
                // The reset arena no longer holds anyone
                self.player_arenas.retain(|_, arena| *arena != notice.identifier);
                self.update_gauges();
            }
            _ => {}
        }
    }

    /// Open another arena from the same template when one starts playing
    async fn autoscale(&mut self, template_name: &str) {
        if cfg!(not(feature = "autoscale")) {
            return;
        }
        let Some(template) = self.templates.iter().find(|t| t.name == template_name) else {
            return;
        };
        if !template.autoscale || template.games_before_restart <= 1 {
            return;
        }
        match self.create_arena(template_name).await {
            Ok(identifier) => info!("Autoscaled {} with new arena {}", template_name, identifier),
            Err(e) => warn!("Could not autoscale {}: {}", template_name, e),
        }
    }

    fn update_gauges(&self) {
        let metrics = &self.ctx.metrics;
        metrics.arenas_active.store(self.arenas.len() as u64, Ordering::Relaxed);
        metrics
            .players_total
            .store(self.player_arenas.len() as u64, Ordering::Relaxed);
    }

    /// Stop every arena and retract its record
    pub async fn shutdown_all(&mut self) {
        let identifiers: Vec<String> = self.arenas.keys().cloned().collect();
        for identifier in identifiers {
            if let Err(e) = self.remove_arena(&identifier).await {
                warn!("Failed to remove arena {}: {}", identifier, e);
            }
        }
        self.player_arenas.clear();
        self.update_gauges();
    }
}

fn decrement(gauge: &std::sync::atomic::AtomicU64) {
    let _ = gauge.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
}

/// Feed phase notices to the manager until cancelled
pub fn spawn_notice_handler(
    manager: Arc<RwLock<ArenaManager>>,
    mut notices: mpsc::UnboundedReceiver<ArenaNotice>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let notice = tokio::select! {
                () = cancel.cancelled() => break,
                notice = notices.recv() => match notice {
                    Some(notice) => notice,
                    None => break,
                },
            };
            manager.write().await.handle_notice(notice).await;
        }
    })
}

/// Arena information for listing
#[derive(Debug, Clone)]
pub struct ArenaInfo {
    pub identifier: String,
    pub name: String,
    pub group: String,
    pub phase: Phase,
    pub player_count: usize,
    pub max_players: usize,
}

/// Manager errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ManagerError {
    #[error("Too many arenas")]
    TooManyArenas,
    #[error("Unknown arena template '{0}'")]
    UnknownTemplate(String),
    #[error("Arena not found")]
    ArenaNotFound,
    #[error("Already in an arena")]
    AlreadyInArena,
    #[error("Not in an arena")]
    NotInArena,
    #[error("Room error: {0}")]
    RoomError(#[from] RoomError),
}
