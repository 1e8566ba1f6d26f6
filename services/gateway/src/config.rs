use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const MIN_SECRET_LEN: usize = 16;

/// Gateway settings, read from flags or `ADSPACE_*` environment variables
#[derive(Debug, Clone, Parser)]
#[command(
    name = "adspace-gateway",
    about = "HTTP and websocket gateway for the ad space marketplace"
)]
pub struct GatewayConfig {
    /// Address the HTTP server listens on
    #[arg(long = "bind", env = "ADSPACE_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// HMAC secret used to sign access tokens
    #[arg(long = "jwt-secret", env = "ADSPACE_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    #[arg(long = "jwt-ttl-secs", env = "ADSPACE_JWT_TTL_SECS", default_value_t = 86_400)]
    pub jwt_ttl_secs: u64,

    /// Directory for snapshots. Without it nothing is persisted.
    #[arg(long = "data-dir", env = "ADSPACE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[arg(
        long = "snapshot-interval-secs",
        env = "ADSPACE_SNAPSHOT_INTERVAL_SECS",
        default_value_t = 60
    )]
    pub snapshot_interval_secs: u64,

    /// Mutations required before the next periodic snapshot is written
    #[arg(
        long = "snapshot-min-changes",
        env = "ADSPACE_SNAPSHOT_MIN_CHANGES",
        default_value_t = 1
    )]
    pub snapshot_min_changes: u64,

    /// Number of snapshot files kept on disk
    #[arg(long = "snapshot-retain", env = "ADSPACE_SNAPSHOT_RETAIN", default_value_t = 5)]
    pub snapshot_retain: usize,

    #[arg(
        long = "snapshot-compress",
        env = "ADSPACE_SNAPSHOT_COMPRESS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub snapshot_compress: bool,

    /// Lifetime of cached search pages and listings
    #[arg(long = "cache-ttl-secs", env = "ADSPACE_CACHE_TTL_SECS", default_value_t = 30)]
    pub cache_ttl_secs: u64,

    #[arg(
        long = "cache-capacity",
        env = "ADSPACE_CACHE_CAPACITY",
        default_value_t = 10_000
    )]
    pub cache_capacity: u64,

    /// How often bookings are completed and stale requests expired
    #[arg(
        long = "sweep-interval-secs",
        env = "ADSPACE_SWEEP_INTERVAL_SECS",
        default_value_t = 300
    )]
    pub sweep_interval_secs: u64,

    /// Tracing filter directive; falls back to RUST_LOG, then "info"
    #[arg(long = "log-filter", env = "ADSPACE_LOG_FILTER")]
    pub log_filter: Option<String>,
}

impl GatewayConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("jwt secret must be at least {} bytes", MIN_SECRET_LEN);
        }
        if self.jwt_ttl_secs == 0 {
            anyhow::bail!("jwt ttl must be positive");
        }
        for (name, secs) in [
            ("snapshot interval", self.snapshot_interval_secs),
            ("sweep interval", self.sweep_interval_secs),
        ] {
            if secs == 0 {
                anyhow::bail!("{} must be positive", name);
            }
        }
        Ok(())
    }

    pub fn jwt_ttl(&self) -> Duration {
        Duration::from_secs(self.jwt_ttl_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> GatewayConfig {
        let mut argv = vec!["adspace-gateway"];
        argv.extend_from_slice(args);
        GatewayConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--jwt-secret", "0123456789abcdef"]);
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.jwt_ttl(), Duration::from_secs(86_400));
        assert!(config.snapshot_compress);
        assert!(config.data_dir.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--jwt-secret",
            "0123456789abcdef",
            "--bind",
            "127.0.0.1:9000",
            "--data-dir",
            "/var/lib/adspace",
            "--snapshot-compress",
            "false",
            "--sweep-interval-secs",
            "15",
        ]);
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/adspace")));
        assert!(!config.snapshot_compress);
        assert_eq!(config.sweep_interval(), Duration::from_secs(15));
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = parse(&["--jwt-secret", "short"]);
        assert!(config.validate().is_err());
    }
}
