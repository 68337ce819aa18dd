use crate::domain::tuning::{BlockTuning, ProjectileTuning, default_arena};
use crate::use_cases::battle::{APP_ID, BattleSettings};
use crate::use_cases::{InactivityConfig, SessionSettings};
use std::{env, net::IpAddr, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: IpAddr,
    pub port: u16,
    pub session: SessionSettings,
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

pub fn http_host() -> IpAddr {
    parse_or(var("ARENA_SERVER_HOST").as_deref(), IpAddr::from([0, 0, 0, 0]))
}

pub fn http_port() -> u16 {
    parse_or(var("ARENA_SERVER_PORT").as_deref(), 3001)
}

pub fn session_id() -> String {
    non_empty_or(var("SESSION_ID").as_deref(), "local")
}

pub fn app_id() -> String {
    non_empty_or(var("APP_ID").as_deref(), APP_ID)
}

pub fn tick_interval() -> Duration {
    tick_interval_from(parse_or(var("TICK_RATE_HZ").as_deref(), 60))
}

/// `AUTO_FIRE_INTERVAL_MS`; 0 (the default) disables auto-fire.
pub fn auto_fire_interval() -> Option<Duration> {
    optional_millis(parse_or(var("AUTO_FIRE_INTERVAL_MS").as_deref(), 0))
}

pub fn inactivity() -> InactivityConfig {
    let defaults = InactivityConfig::default();
    InactivityConfig {
        startup_grace: secs_or(var("STARTUP_GRACE_SECS").as_deref(), defaults.startup_grace),
        empty_timeout: secs_or(
            var("EMPTY_SESSION_TIMEOUT_SECS").as_deref(),
            defaults.empty_timeout,
        ),
        inactivity_timeout: secs_or(
            var("INACTIVITY_TIMEOUT_SECS").as_deref(),
            defaults.inactivity_timeout,
        ),
        check_interval: secs_or(
            var("INACTIVITY_CHECK_INTERVAL_SECS").as_deref(),
            defaults.check_interval,
        )
        .max(Duration::from_secs(1)),
    }
}

pub fn battle() -> BattleSettings {
    let blocks = BlockTuning::default();
    let projectiles = ProjectileTuning::default();
    BattleSettings {
        bounds: default_arena(),
        blocks: BlockTuning {
            max_grabbed: parse_or(var("MAX_GRABBED_BLOCKS").as_deref(), blocks.max_grabbed).max(1),
            collision_enabled: parse_bool_or(
                var("BLOCK_COLLISION").as_deref(),
                blocks.collision_enabled,
            ),
            ..blocks
        },
        projectiles: ProjectileTuning {
            cooldown_ms: parse_or(var("CANNON_COOLDOWN_MS").as_deref(), projectiles.cooldown_ms),
            ..projectiles
        },
        auto_fire_interval: auto_fire_interval(),
    }
}

/// Reads every setting from the environment, falling back to defaults.
pub fn server_settings() -> ServerSettings {
    ServerSettings {
        host: http_host(),
        port: http_port(),
        session: SessionSettings {
            session_id: session_id(),
            app_id: app_id(),
            tick_interval: tick_interval(),
            event_capacity: EVENT_CHANNEL_CAPACITY,
            inactivity: inactivity(),
            battle: battle(),
        },
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_bool_or(raw: Option<&str>, default: bool) -> bool {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

fn non_empty_or(raw: Option<&str>, default: &str) -> String {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn secs_or(raw: Option<&str>, default: Duration) -> Duration {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn tick_interval_from(hz: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(hz.clamp(1, 1000)))
}

fn optional_millis(millis: u64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis))
}
