use std::path::PathBuf;

use globset::Glob;
use serde::Deserialize;

use crate::recognition::{Detector, Metric, Model};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the registered identity images.
    pub root: PathBuf,
    /// Extensions (without dot, compared case-insensitively) that count as store members.
    pub image_extensions: Vec<String>,
    /// Glob patterns of derived index artifacts the recognition backend leaves in `root`.
    pub cache_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionConfig {
    pub metric: Metric,
    pub model: Model,
    pub detector: Detector,
    /// Program invoked for each lookup, see `recognition::command`.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub timeout_secs: u64,
    pub threshold: Option<f64>,
    pub scratch_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessConfig {
    pub resize: bool,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Global per-IP budget across all endpoints.
    pub max_requests: usize,
    pub window_seconds: u64,
    pub recognition_per_minute: usize,
    pub register_per_minute: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub recognition: RecognitionConfig,
    pub preprocess: PreprocessConfig,
    pub rate_limit: RateLimitConfig,
    pub security: Option<SecurityConfig>,
}

const DEFAULTS: &str = include_str!("../config/default.toml");

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: facedir.toml (in CWD)
        .add_source(::config::File::with_name("facedir").required(false));

    if let Ok(custom_path) = std::env::var("FACEDIR_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(
        ::config::Environment::with_prefix("FACEDIR")
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("store.image_extensions")
            .with_list_parse_key("store.cache_patterns")
            .with_list_parse_key("recognition.args"),
    );

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }
    if cfg.server.max_upload_bytes < 1024 {
        return Err(anyhow::anyhow!("server.max_upload_bytes must be >= 1024"));
    }

    // Store
    if cfg.store.root.as_os_str().is_empty() {
        return Err(anyhow::anyhow!("store.root must not be empty"));
    }
    if cfg.store.image_extensions.iter().all(|e| e.trim().is_empty()) {
        return Err(anyhow::anyhow!("store.image_extensions must list at least one extension"));
    }
    for pattern in &cfg.store.cache_patterns {
        Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid store.cache_patterns entry {}: {}", pattern, e))?;
    }

    // Recognition
    if cfg.recognition.command.trim().is_empty() {
        return Err(anyhow::anyhow!("recognition.command must not be empty"));
    }
    if cfg.recognition.timeout_secs == 0 || cfg.recognition.timeout_secs > 3600 {
        return Err(anyhow::anyhow!("recognition.timeout_secs must be in 1..=3600"));
    }
    if let Some(t) = cfg.recognition.threshold {
        if !t.is_finite() {
            return Err(anyhow::anyhow!("recognition.threshold must be a finite number"));
        }
    }

    // Preprocess
    if cfg.preprocess.width == 0 || cfg.preprocess.height == 0 {
        return Err(anyhow::anyhow!("preprocess.width and preprocess.height must be > 0"));
    }

    // Rate limiting
    if cfg.rate_limit.max_requests == 0 || cfg.rate_limit.window_seconds == 0 {
        return Err(anyhow::anyhow!("rate_limit.max_requests and rate_limit.window_seconds must be > 0"));
    }
    if cfg.rate_limit.recognition_per_minute == 0 || cfg.rate_limit.register_per_minute == 0 {
        return Err(anyhow::anyhow!("per-endpoint rate limits must be > 0"));
    }

    Ok(())
}
