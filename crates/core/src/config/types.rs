use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub task: TaskConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Admission configuration for tasks
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskConfig {
    /// Maximum number of tasks admitted at the same time.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_max_concurrent() -> usize {
    3
}

/// Graceful shutdown configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShutdownConfig {
    /// How long to wait for in-flight tasks before forcing termination.
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period(),
        }
    }
}

fn default_grace_period() -> u64 {
    30
}

/// Where archives and per-task workspaces live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchiveConfig {
    /// Directory that receives `<task_id>.zip` files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Root under which per-task download workspaces are created.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            temp_dir: default_temp_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("archives")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("zipper")
}

/// HTTP download settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloaderConfig {
    /// Length of one backoff unit in milliseconds. Attempt `i` waits `i * i` units.
    #[serde(default = "default_backoff_unit")]
    pub backoff_unit_ms: u64,
    /// Optional per-request timeout. Unset means a request may wait forever.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl DownloaderConfig {
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            backoff_unit_ms: default_backoff_unit(),
            request_timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

fn default_backoff_unit() -> u64 {
    1000
}

fn default_user_agent() -> String {
    format!("zipper/{}", env!("CARGO_PKG_VERSION"))
}
