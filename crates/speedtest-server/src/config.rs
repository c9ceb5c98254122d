//! Server configuration.
//!
//! An optional TOML file is read into `ConfigInput` (every field optional)
//! and resolved against defaults into a validated `ServerConfig`. Command
//! line flags are applied on top by the binary.
//!
//! ```toml
//! [throughput]
//! chunk_size_kb = 1024
//! max_size_mb = 1024
//!
//! [latency]
//! samples = 10
//! timeout_ms = 5000
//! pause_ms = 100
//! target_url = "http://127.0.0.1:8000/test/ping"
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_LISTEN: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000);
pub const DEFAULT_STATIC_DIR: &str = "frontend";
pub const DEFAULT_CHUNK_SIZE_KB: usize = 1024;
pub const DEFAULT_MAX_SIZE_MB: u64 = 1024;
pub const DEFAULT_SAMPLES: usize = 10;
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_PAUSE_MS: u64 = 100;

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

// ── Raw input ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigInput {
    pub throughput: ThroughputConfigInput,
    pub latency: LatencyConfigInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThroughputConfigInput {
    pub chunk_size_kb: Option<usize>,
    pub max_size_mb: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LatencyConfigInput {
    pub samples: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub pause_ms: Option<u64>,
    pub target_url: Option<String>,
}

impl ConfigInput {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Validate and fill in defaults. The probe target defaults to this
    /// server's own liveness endpoint on `listen`.
    pub fn resolve(self, listen: SocketAddr, static_dir: PathBuf) -> Result<ServerConfig, ConfigError> {
        let chunk_size_kb = self.throughput.chunk_size_kb.unwrap_or(DEFAULT_CHUNK_SIZE_KB);
        let chunk_size = chunk_size_kb
            .checked_mul(1024)
            .and_then(NonZeroUsize::new)
            .ok_or(ConfigError::Zero {
                field: "throughput.chunk_size_kb",
            })?;

        let samples = NonZeroUsize::new(self.latency.samples.unwrap_or(DEFAULT_SAMPLES))
            .ok_or(ConfigError::Zero {
                field: "latency.samples",
            })?;

        let timeout_ms = self.latency.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(ConfigError::Zero {
                field: "latency.timeout_ms",
            });
        }

        let target_url = self
            .latency
            .target_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self_ping_url(listen));

        Ok(ServerConfig {
            listen,
            static_dir,
            throughput: ThroughputConfig {
                chunk_size,
                max_size_mb: self.throughput.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB),
            },
            latency: LatencyConfig {
                samples,
                timeout: Duration::from_millis(timeout_ms),
                pause: Duration::from_millis(self.latency.pause_ms.unwrap_or(DEFAULT_PAUSE_MS)),
                target_url,
            },
        })
    }
}

/// Liveness URL of a server listening on `listen`, reached over loopback
/// when bound to a wildcard address.
fn self_ping_url(listen: SocketAddr) -> String {
    let host = match listen.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}/test/ping", SocketAddr::new(host, listen.port()))
}

// ── Resolved ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub static_dir: PathBuf,
    pub throughput: ThroughputConfig,
    pub latency: LatencyConfig,
}

#[derive(Debug, Clone)]
pub struct ThroughputConfig {
    pub chunk_size: NonZeroUsize,
    pub max_size_mb: u64,
}

impl ThroughputConfig {
    /// Byte size of a `size_mb` test, or `None` if it exceeds the limit.
    pub fn test_bytes(&self, size_mb: u64) -> Option<u64> {
        if size_mb > self.max_size_mb {
            return None;
        }
        size_mb.checked_mul(BYTES_PER_MB)
    }
}

#[derive(Debug, Clone)]
pub struct LatencyConfig {
    pub samples: NonZeroUsize,
    pub timeout: Duration,
    pub pause: Duration,
    pub target_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let chunk_size = NonZeroUsize::new(DEFAULT_CHUNK_SIZE_KB * 1024).unwrap_or(NonZeroUsize::MIN);
        let samples = NonZeroUsize::new(DEFAULT_SAMPLES).unwrap_or(NonZeroUsize::MIN);
        Self {
            listen: DEFAULT_LISTEN,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            throughput: ThroughputConfig {
                chunk_size,
                max_size_mb: DEFAULT_MAX_SIZE_MB,
            },
            latency: LatencyConfig {
                samples,
                timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
                pause: Duration::from_millis(DEFAULT_PAUSE_MS),
                target_url: self_ping_url(DEFAULT_LISTEN),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(raw: &str) -> Result<ServerConfig, ConfigError> {
        ConfigInput::from_toml_str(raw)?.resolve(DEFAULT_LISTEN, PathBuf::from("frontend"))
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = resolve("").unwrap();
        assert_eq!(config.throughput.chunk_size.get(), 1024 * 1024);
        assert_eq!(config.throughput.max_size_mb, 1024);
        assert_eq!(config.latency.samples.get(), 10);
        assert_eq!(config.latency.timeout, Duration::from_secs(5));
        assert_eq!(config.latency.pause, Duration::from_millis(100));
        assert_eq!(config.latency.target_url, "http://127.0.0.1:8000/test/ping");
    }

    #[test]
    fn defaults_match_empty_input() {
        let resolved = resolve("").unwrap();
        let default = ServerConfig::default();
        assert_eq!(resolved.throughput.chunk_size, default.throughput.chunk_size);
        assert_eq!(resolved.latency.samples, default.latency.samples);
        assert_eq!(resolved.latency.target_url, default.latency.target_url);
    }

    #[test]
    fn overrides_are_applied() {
        let config = resolve(
            r#"
            [throughput]
            chunk_size_kb = 64
            max_size_mb = 100

            [latency]
            samples = 5
            timeout_ms = 1000
            pause_ms = 0
            target_url = "http://10.0.0.2:9000/test/ping"
            "#,
        )
        .unwrap();
        assert_eq!(config.throughput.chunk_size.get(), 64 * 1024);
        assert_eq!(config.throughput.max_size_mb, 100);
        assert_eq!(config.latency.samples.get(), 5);
        assert_eq!(config.latency.timeout, Duration::from_secs(1));
        assert_eq!(config.latency.pause, Duration::ZERO);
        assert_eq!(config.latency.target_url, "http://10.0.0.2:9000/test/ping");
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(matches!(
            resolve("[throughput]\nchunk_size_kb = 0"),
            Err(ConfigError::Zero { field: "throughput.chunk_size_kb" })
        ));
        assert!(matches!(
            resolve("[latency]\nsamples = 0"),
            Err(ConfigError::Zero { field: "latency.samples" })
        ));
        assert!(matches!(
            resolve("[latency]\ntimeout_ms = 0"),
            Err(ConfigError::Zero { field: "latency.timeout_ms" })
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(resolve("[latency]\nsampels = 3"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn ping_url_follows_listen_address() {
        let listen: SocketAddr = "192.168.1.20:3000".parse().unwrap();
        let config = ConfigInput::default()
            .resolve(listen, PathBuf::from("frontend"))
            .unwrap();
        assert_eq!(config.latency.target_url, "http://192.168.1.20:3000/test/ping");

        let listen: SocketAddr = "[::]:8080".parse().unwrap();
        assert_eq!(self_ping_url(listen), "http://127.0.0.1:8080/test/ping");
    }

    #[test]
    fn test_size_respects_limit() {
        let config = ServerConfig::default();
        assert_eq!(config.throughput.test_bytes(10), Some(10 * 1024 * 1024));
        assert_eq!(config.throughput.test_bytes(0), Some(0));
        assert_eq!(config.throughput.test_bytes(1024), Some(1024 * 1024 * 1024));
        assert_eq!(config.throughput.test_bytes(1025), None);
    }
}
