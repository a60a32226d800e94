use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_BIND: &str = "0.0.0.0:4000";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Upper bound on simultaneously running transcode processes
    pub max_concurrent_transcodes: usize,
    pub max_upload_mb: usize,
    pub cors_allow_any: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            max_concurrent_transcodes: 4,
            max_upload_mb: 200,
            cors_allow_any: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ToolsConfig {
    /// Use `yt-dlp`/`ffmpeg` from PATH instead of the bundled binaries in `bin_dir`
    pub use_system_binaries: bool,
    pub bin_dir: PathBuf,
    pub yt_dlp: Option<String>,
    pub ffmpeg: Option<String>,
    pub info_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            use_system_binaries: false,
            bin_dir: PathBuf::from("bin"),
            yt_dlp: None,
            ffmpeg: None,
            info_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

/// Resolved executable locations handed to the transcoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub yt_dlp: String,
    pub ffmpeg: String,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn get_logging_format(&self) -> &str {
        &self.logging.format
    }

    /// Applies `USE_SYSTEM_BINARIES` and `PORT` on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("USE_SYSTEM_BINARIES").ok().as_deref(),
            std::env::var("PORT").ok().as_deref(),
        );
    }

    fn apply_overrides(&mut self, use_system: Option<&str>, port: Option<&str>) {
        if let Some(value) = use_system {
            self.tools.use_system_binaries = parse_bool(value);
        }

        if let Some(port) = port.and_then(|p| p.trim().parse::<u16>().ok()) {
            let host = self
                .server
                .bind
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.server.bind = format!("{}:{}", host, port);
        }
    }

    pub fn tool_paths(&self) -> ToolPaths {
        let resolve = |explicit: &Option<String>, name: &str| -> String {
            if let Some(path) = explicit {
                return path.clone();
            }
            if self.tools.use_system_binaries {
                name.to_string()
            } else {
                self.tools.bin_dir.join(name).to_string_lossy().into_owned()
            }
        };

        ToolPaths {
            yt_dlp: resolve(&self.tools.yt_dlp, "yt-dlp"),
            ffmpeg: resolve(&self.tools.ffmpeg, "ffmpeg"),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
