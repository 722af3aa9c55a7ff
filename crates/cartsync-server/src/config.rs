//! Command-line and environment configuration.

use crate::http::MAX_MESSAGE_SIZE;
use crate::keepalive::Keepalive;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Shared shopping cart sync server.
#[derive(Parser, Debug, Clone)]
#[command(name = "cartsync", version)]
pub struct Config {
    /// HTTP service address.
    #[arg(long, env = "CARTSYNC_ADDR", default_value = "0.0.0.0:8080")]
    pub addr: SocketAddr,

    /// SQLite database file holding cart snapshots.
    #[arg(long, env = "CARTSYNC_DB", default_value = "einkauf.db")]
    pub db: PathBuf,

    /// Directory served for every path not handled by the API.
    #[arg(long, env = "CARTSYNC_PUBLIC", default_value = "public")]
    pub public: PathBuf,

    /// Frames buffered per connection before it is considered too slow.
    #[arg(long, env = "CARTSYNC_QUEUE_CAPACITY", default_value_t = 256)]
    pub queue_capacity: usize,

    /// Seconds a peer may go without answering a ping.
    #[arg(long, env = "CARTSYNC_PONG_WAIT_SECS", default_value_t = 60)]
    pub pong_wait_secs: u64,

    /// Seconds allowed for a single write.
    #[arg(long, env = "CARTSYNC_WRITE_WAIT_SECS", default_value_t = 10)]
    pub write_wait_secs: u64,

    /// Largest inbound WebSocket message, in bytes.
    #[arg(long, env = "CARTSYNC_MAX_MESSAGE_SIZE", default_value_t = MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("--queue-capacity must be at least 1")]
    ZeroQueueCapacity,
    #[error("--pong-wait-secs must be at least 1")]
    ZeroPongWait,
    #[error("--write-wait-secs must be at least 1")]
    ZeroWriteWait,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.pong_wait_secs == 0 {
            return Err(ConfigError::ZeroPongWait);
        }
        if self.write_wait_secs == 0 {
            return Err(ConfigError::ZeroWriteWait);
        }
        Ok(())
    }

    pub fn keepalive(&self) -> Keepalive {
        Keepalive::new(
            Duration::from_secs(self.pong_wait_secs),
            Duration::from_secs(self.write_wait_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["cartsync"]).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.db, PathBuf::from("einkauf.db"));
        assert_eq!(config.queue_capacity, 256);
        assert_eq!(config.max_message_size, 262_144);
        assert_eq!(config.keepalive(), Keepalive::default());
        config.validate().unwrap();
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "cartsync",
            "--addr",
            "127.0.0.1:9000",
            "--db",
            "/tmp/carts.db",
            "--pong-wait-secs",
            "20",
        ])
        .unwrap();
        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.db, PathBuf::from("/tmp/carts.db"));
        assert_eq!(config.keepalive().ping_period(), Duration::from_secs(18));
    }

    #[test]
    fn zero_queue_is_rejected() {
        let config = Config::try_parse_from(["cartsync", "--queue-capacity", "0"]).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroQueueCapacity)
        ));
    }

    #[test]
    fn zero_pong_wait_is_rejected() {
        let config = Config::try_parse_from(["cartsync", "--pong-wait-secs", "0"]).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ZeroPongWait)));
    }

    #[test]
    fn zero_write_wait_is_rejected() {
        let config = Config::try_parse_from(["cartsync", "--write-wait-secs", "0"]).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ZeroWriteWait)));
    }

    #[test]
    fn max_message_size_flag() {
        let config =
            Config::try_parse_from(["cartsync", "--max-message-size", "100"]).unwrap();
        assert_eq!(config.max_message_size, 100);
    }

    #[test]
    fn bad_address_is_a_parse_error() {
        assert!(Config::try_parse_from(["cartsync", "--addr", "nowhere"]).is_err());
    }
}
