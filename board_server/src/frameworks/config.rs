use std::{env, net::IpAddr, time::Duration};

// Runtime/server constants; room-level limits live with the connection handler.

pub fn http_host() -> IpAddr {
    env::var("BOARD_SERVER_HOST")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(IpAddr::from([0, 0, 0, 0]))
}

pub fn http_port() -> u16 {
    env::var("BOARD_SERVER_PORT")
        .or_else(|_| env::var("PORT"))
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3001)
}

// Zero keeps empty rooms forever.
pub fn room_idle_ttl() -> Duration {
    Duration::from_secs(env_secs("ROOM_IDLE_TTL_SECS", 1800))
}

pub fn room_reaper_interval() -> Duration {
    Duration::from_secs(env_secs("ROOM_REAPER_INTERVAL_SECS", 60))
}

fn env_secs(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

pub const ROOM_EVENT_CHANNEL_CAPACITY: usize = 1024;
pub const ROOM_BROADCAST_CAPACITY: usize = 256;
