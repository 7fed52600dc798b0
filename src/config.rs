use crate::game::constants::{countdown, generator, session, store};
use crate::game::team::TeamColor;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Identifier of this server inside the fleet (prefix of every shared record)
    pub server_id: String,
    /// Maximum number of concurrent arenas (including autoscaled copies)
    pub max_arenas: usize,
    /// Port for the metrics endpoint
    pub metrics_port: u16,
    /// Arena templates loaded at startup
    pub arenas: Vec<ArenaTemplate>,
    /// Gameplay timings shared by every arena
    pub gameplay: GameplayConfig,
    /// Shared store settings (None = standalone server)
    pub redis: Option<RedisConfig>,
}

/// Timings and policy flags read by the tick scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameplayConfig {
    pub start_countdown: u32,
    pub restart_countdown: u32,
    pub beds_destroy_countdown: u32,
    pub dragon_spawn_countdown: u32,
    pub game_end_countdown: u32,
    pub diamond_tier_ii_start: u32,
    pub diamond_tier_iii_start: u32,
    pub emerald_tier_ii_start: u32,
    pub emerald_tier_iii_start: u32,
    /// Seconds a dead player waits before rejoining the team
    pub respawn_countdown: u32,
    /// Report nearest-teammate distance every tick
    pub teammate_tracking: bool,
    /// Clear the blocks below generators when sudden death starts
    pub replace_air_sudden_death: bool,
    /// Hostile entities spawned per surviving team at sudden death
    pub dragons_per_team: u32,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            start_countdown: countdown::START,
            restart_countdown: countdown::RESTART,
            beds_destroy_countdown: countdown::BEDS_DESTROY,
            dragon_spawn_countdown: countdown::DRAGON_SPAWN,
            game_end_countdown: countdown::GAME_END,
            diamond_tier_ii_start: generator::DIAMOND_TIER_II_START,
            diamond_tier_iii_start: generator::DIAMOND_TIER_III_START,
            emerald_tier_ii_start: generator::EMERALD_TIER_II_START,
            emerald_tier_iii_start: generator::EMERALD_TIER_III_START,
            respawn_countdown: session::RESPAWN_COUNTDOWN,
            teammate_tracking: true,
            replace_air_sudden_death: true,
            dragons_per_team: 1,
        }
    }
}

/// Static description of an arena, used for the initial arena and every autoscaled copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaTemplate {
    pub name: String,
    pub group: String,
    pub teams: Vec<TeamColor>,
    pub max_in_team: usize,
    pub min_players: usize,
    pub allow_spectate: bool,
    pub autoscale: bool,
    /// Number of matches this template may host before the server wants a restart
    pub games_before_restart: u32,
}

impl ArenaTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: "Default".to_string(),
            teams: vec![TeamColor::Red, TeamColor::Blue, TeamColor::Green, TeamColor::Yellow],
            max_in_team: 1,
            min_players: 2,
            allow_spectate: true,
            autoscale: true,
            games_before_restart: 30,
        }
    }

    pub fn max_players(&self) -> usize {
        self.teams.len() * self.max_in_team
    }
}

/// Connection settings for the shared store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Pub/sub channel shared by the whole fleet
    pub channel: String,
}

impl RedisConfig {
    /// Connection URL understood by the redis client
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) if !password.is_empty() => {
                format!("redis://:{}@{}:{}/", password, self.host, self.port)
            }
            _ => format!("redis://{}:{}/", self.host, self.port),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_id: "bw1".to_string(),
            max_arenas: 50,
            metrics_port: 9090,
            arenas: vec![ArenaTemplate::new("Lighthouse")],
            gameplay: GameplayConfig::default(),
            redis: None,
        }
    }
}

/// Parse an env var into `T`, warning and keeping `current` when it does not parse
fn env_parse<T: std::str::FromStr>(name: &str, current: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!("Invalid {} '{}', using default", name, raw);
                current
            }
        },
        Err(_) => current,
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(id) = std::env::var("SERVER_ID") {
            if id.trim().is_empty() {
                tracing::warn!("SERVER_ID is empty, using default");
            } else {
                config.server_id = id.trim().to_string();
            }
        }

        let max_arenas = env_parse("MAX_ARENAS", config.max_arenas);
        if max_arenas > 0 && max_arenas <= 10000 {
            config.max_arenas = max_arenas;
        } else {
            tracing::warn!("MAX_ARENAS must be 1-10000, using default");
        }

        config.metrics_port = env_parse("METRICS_PORT", config.metrics_port);

        let g = &mut config.gameplay;
        g.start_countdown = env_parse("START_COUNTDOWN", g.start_countdown);
        g.restart_countdown = env_parse("RESTART_COUNTDOWN", g.restart_countdown);
        g.beds_destroy_countdown = env_parse("BEDS_DESTROY_COUNTDOWN", g.beds_destroy_countdown);
        g.dragon_spawn_countdown = env_parse("DRAGON_SPAWN_COUNTDOWN", g.dragon_spawn_countdown);
        g.game_end_countdown = env_parse("GAME_END_COUNTDOWN", g.game_end_countdown);
        g.diamond_tier_ii_start = env_parse("DIAMOND_TIER_II_START", g.diamond_tier_ii_start);
        g.diamond_tier_iii_start = env_parse("DIAMOND_TIER_III_START", g.diamond_tier_iii_start);
        g.emerald_tier_ii_start = env_parse("EMERALD_TIER_II_START", g.emerald_tier_ii_start);
        g.emerald_tier_iii_start = env_parse("EMERALD_TIER_III_START", g.emerald_tier_iii_start);
        g.respawn_countdown = env_parse("RESPAWN_COUNTDOWN", g.respawn_countdown);
        g.teammate_tracking = env_parse("TEAMMATE_TRACKING", g.teammate_tracking);
        g.replace_air_sudden_death = env_parse("REPLACE_AIR_SUDDEN_DEATH", g.replace_air_sudden_death);
        g.dragons_per_team = env_parse("DRAGONS_PER_TEAM", g.dragons_per_team);

        let mut template = ArenaTemplate::new("template");
        if let Ok(group) = std::env::var("ARENA_GROUP") {
            template.group = group;
        }
        if let Ok(teams) = std::env::var("ARENA_TEAMS") {
            let parsed: Vec<TeamColor> = teams
                .split(',')
                .filter_map(|t| {
                    let color = t.trim().parse::<TeamColor>();
                    if color.is_err() {
                        tracing::warn!("Unknown team color '{}' in ARENA_TEAMS, skipping", t);
                    }
                    color.ok()
                })
                .collect();
            if parsed.len() >= 2 {
                template.teams = parsed;
            } else {
                tracing::warn!("ARENA_TEAMS needs at least two valid colors, using default");
            }
        }
        template.max_in_team = env_parse("ARENA_MAX_IN_TEAM", template.max_in_team);
        template.min_players = env_parse("ARENA_MIN_PLAYERS", template.min_players);
        template.allow_spectate = env_parse("ALLOW_SPECTATE", template.allow_spectate);
        template.autoscale = env_parse("AUTOSCALE", template.autoscale);
        template.games_before_restart = env_parse("GAMES_BEFORE_RESTART", template.games_before_restart);

        if let Ok(names) = std::env::var("ARENAS") {
            let arenas: Vec<ArenaTemplate> = names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(|n| ArenaTemplate {
                    name: n.to_string(),
                    ..template.clone()
                })
                .collect();
            if !arenas.is_empty() {
                config.arenas = arenas;
            }
        } else {
            config.arenas = vec![ArenaTemplate {
                name: "Lighthouse".to_string(),
                ..template
            }];
        }

        if let Ok(host) = std::env::var("REDIS_HOST") {
            if !host.trim().is_empty() {
                config.redis = Some(RedisConfig {
                    host: host.trim().to_string(),
                    port: env_parse("REDIS_PORT", 6379u16),
                    password: std::env::var("REDIS_PASSWORD").ok(),
                    channel: std::env::var("REDIS_CHANNEL").unwrap_or_else(|_| store::DEFAULT_CHANNEL.to_string()),
                });
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.server_id.is_empty() {
            return Err("server_id cannot be empty".to_string());
        }
        if self.server_id.contains(['*', '?', '[', ']', '\\']) {
            return Err("server_id cannot contain glob characters (* ? [ ] \\)".to_string());
        }
        if self.max_arenas == 0 {
            return Err("max_arenas must be at least 1".to_string());
        }
        if self.arenas.len() > self.max_arenas {
            return Err("more arena templates than max_arenas".to_string());
        }
        for arena in &self.arenas {
            if arena.teams.len() < 2 {
                return Err(format!("arena '{}' needs at least two teams", arena.name));
            }
            if arena.max_in_team == 0 {
                return Err(format!("arena '{}' max_in_team must be at least 1", arena.name));
            }
            if arena.min_players > arena.max_players() {
                return Err(format!("arena '{}' min_players cannot exceed max players", arena.name));
            }
        }
        let g = &self.gameplay;
        if g.beds_destroy_countdown == 0 || g.dragon_spawn_countdown == 0 || g.game_end_countdown == 0 {
            return Err("event countdowns must be at least 1 second".to_string());
        }
        if let Some(redis) = &self.redis {
            if redis.channel.is_empty() {
                return Err("redis channel cannot be empty".to_string());
            }
        }
        Ok(())
    }
}
