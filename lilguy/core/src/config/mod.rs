//! LilGuy Configuration
//!
//! Centralized configuration loading for LilGuy hosts, from a TOML file at
//! `~/.config/lilguy/lilguy.toml`.
//!
//! # Layering
//!
//! Later layers win (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables (`LILGUY_*`)
//! 3. `lilguy.toml`
//! 4. Default values
//!
//! # Example
//!
//! ```toml
//! [animation]
//! frame_interval_ms = 16
//! stagger = 8
//! frame_phase = "reset"
//! max_load_attempts = 3
//! retry_delay_ms = 250
//! asset_root = "./"
//!
//! [surfaces]
//! main_scale = 6
//! widget_scale = 3
//!
//! [store]
//! origin = "lilguy-extension"
//! relay_capacity = 64
//!
//! [tracker]
//! reward_interval_secs = 60
//!
//! [remote]
//! base_url = "https://example.invalid/api"
//! timeout_ms = 5000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::animation::FramePhase;
use crate::relay::DEFAULT_RELAY_CAPACITY;
use crate::store::origin_state_path;

// =============================================================================
// Error Types
// =============================================================================

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Highest layer that contributed to a configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Command-line flags
    Cli,
    /// `LILGUY_*` variables
    Env,
    /// `lilguy.toml`
    File,
    /// Default value
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[animation]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationToml {
    /// Render loop cadence in milliseconds
    pub frame_interval_ms: Option<u64>,
    /// Ticks per sprite frame
    pub stagger: Option<u64>,
    /// Whether frame selection restarts on every transition
    pub frame_phase: Option<FramePhase>,
    /// Sprite sheet load attempts before giving up
    pub max_load_attempts: Option<u32>,
    /// Delay before the first retry, doubled per retry
    pub retry_delay_ms: Option<u64>,
    /// Directory containing `assets/sprites/...`
    pub asset_root: Option<PathBuf>,
}

/// `[surfaces]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfacesToml {
    /// Sprite scale on the main panel
    pub main_scale: Option<u32>,
    /// Sprite scale on the widget
    pub widget_scale: Option<u32>,
}

/// `[store]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreToml {
    /// Application origin the state belongs to
    pub origin: Option<String>,
    /// Override for the data directory
    pub data_dir: Option<PathBuf>,
    /// Cross-context notice buffer per context
    pub relay_capacity: Option<usize>,
}

/// `[tracker]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerToml {
    /// Seconds of tracked time per health reward
    pub reward_interval_secs: Option<u64>,
}

/// `[remote]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteToml {
    /// Goal service base URL; absent means offline
    pub base_url: Option<String>,
    /// Request timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

/// Whole `lilguy.toml` document
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LilGuyToml {
    /// Animation section
    pub animation: AnimationToml,
    /// Surfaces section
    pub surfaces: SurfacesToml,
    /// Store section
    pub store: StoreToml,
    /// Tracker section
    pub tracker: TrackerToml,
    /// Remote section
    pub remote: RemoteToml,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Animation engine and render loop settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnimationConfig {
    /// Render loop cadence
    pub frame_interval: Duration,
    /// Ticks per sprite frame
    pub stagger: u64,
    /// Frame phase policy on transitions
    pub frame_phase: FramePhase,
    /// Sprite sheet load attempts before the error state
    pub max_load_attempts: u32,
    /// Delay before the first retry
    pub retry_delay: Duration,
    /// Asset root directory
    pub asset_root: PathBuf,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16), // ~60fps
            stagger: 8,
            frame_phase: FramePhase::Reset,
            max_load_attempts: 3,
            retry_delay: Duration::from_millis(250),
            asset_root: PathBuf::from("./"),
        }
    }
}

/// Per-surface display scales
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceConfig {
    /// Main panel sprite scale
    pub main_scale: u32,
    /// Widget sprite scale
    pub widget_scale: u32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            main_scale: 6,
            widget_scale: 3,
        }
    }
}

/// Durable store settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Application origin
    pub origin: String,
    /// Data directory override
    pub data_dir: Option<PathBuf>,
    /// Cross-context buffer per context
    pub relay_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            origin: "lilguy-extension".to_string(),
            data_dir: None,
            relay_capacity: DEFAULT_RELAY_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Snapshot path for the configured origin
    ///
    /// Uses `data_dir` when set, otherwise the platform data directory.
    #[must_use]
    pub fn state_path(&self) -> Option<PathBuf> {
        let data_dir = self.data_dir.clone().or_else(dirs::data_dir)?;
        Some(origin_state_path(&data_dir, &self.origin))
    }
}

/// Passive site tracker settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Seconds of tracked time per health reward
    pub reward_interval_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            reward_interval_secs: 60,
        }
    }
}

/// Remote goal service settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Base URL; `None` selects the offline service
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_millis(5000),
        }
    }
}

/// Centralized configuration for a LilGuy host
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug, Default)]
pub struct LilGuyConfig {
    /// Animation settings
    pub animation: AnimationConfig,
    /// Surface scales
    pub surfaces: SurfaceConfig,
    /// Store settings
    pub store: StoreConfig,
    /// Tracker settings
    pub tracker: TrackerConfig,
    /// Remote settings
    pub remote: RemoteConfig,
    /// `lilguy.toml` that was read, if any
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl LilGuyConfig {
    /// Defaults for every section
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest contributing layer
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Override the recorded layer
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Reject values that would stall or divide by zero
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` naming the offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |what: &str| Err(ConfigError::ValidationError(format!("{what} must be greater than 0")));

        if self.animation.stagger == 0 {
            return invalid("animation.stagger");
        }
        if self.animation.frame_interval.is_zero() {
            return invalid("animation.frame_interval_ms");
        }
        if self.animation.max_load_attempts == 0 {
            return invalid("animation.max_load_attempts");
        }
        if self.surfaces.main_scale == 0 {
            return invalid("surfaces.main_scale");
        }
        if self.surfaces.widget_scale == 0 {
            return invalid("surfaces.widget_scale");
        }
        if self.tracker.reward_interval_secs == 0 {
            return invalid("tracker.reward_interval_secs");
        }
        if self.store.origin.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "store.origin must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Location of `lilguy.toml`
///
/// Returns `$XDG_CONFIG_HOME/lilguy/lilguy.toml` or
/// `~/.config/lilguy/lilguy.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("lilguy").join("lilguy.toml"))
}

/// Load defaults, file and environment from the default location
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or the
/// result fails validation. A missing config file is not an error.
pub fn load_config() -> Result<LilGuyConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load defaults, file at `path` and environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or the result fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<LilGuyConfig, ConfigError> {
    let mut config = load_file_layer(path.as_deref())?;
    apply_env_config(&mut config);
    config.validate()?;
    Ok(config)
}

fn load_file_layer(path: Option<&Path>) -> Result<LilGuyConfig, ConfigError> {
    let mut config = LilGuyConfig::default();

    let Some(config_path) = path else {
        return Ok(config);
    };
    if !config_path.exists() {
        tracing::debug!(
            path = %config_path.display(),
            "Config file not found, using defaults"
        );
        return Ok(config);
    }

    let toml_content =
        std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
            path: config_path.to_path_buf(),
            source: e,
        })?;
    let toml_config: LilGuyToml = toml::from_str(&toml_content)?;
    apply_toml_config(&mut config, &toml_config);
    config.config_file_path = Some(config_path.to_path_buf());
    config.source = ConfigSource::File;

    tracing::info!(
        path = %config_path.display(),
        "Loaded configuration from file"
    );
    Ok(config)
}

/// Copy every value present in the file over `config`
fn apply_toml_config(config: &mut LilGuyConfig, toml: &LilGuyToml) {
    // Animation settings
    if let Some(ms) = toml.animation.frame_interval_ms {
        config.animation.frame_interval = Duration::from_millis(ms);
    }
    if let Some(stagger) = toml.animation.stagger {
        config.animation.stagger = stagger;
    }
    if let Some(phase) = toml.animation.frame_phase {
        config.animation.frame_phase = phase;
    }
    if let Some(attempts) = toml.animation.max_load_attempts {
        config.animation.max_load_attempts = attempts;
    }
    if let Some(ms) = toml.animation.retry_delay_ms {
        config.animation.retry_delay = Duration::from_millis(ms);
    }
    if let Some(ref root) = toml.animation.asset_root {
        config.animation.asset_root = root.clone();
    }

    // Surface settings
    if let Some(scale) = toml.surfaces.main_scale {
        config.surfaces.main_scale = scale;
    }
    if let Some(scale) = toml.surfaces.widget_scale {
        config.surfaces.widget_scale = scale;
    }

    // Store settings
    if let Some(ref origin) = toml.store.origin {
        config.store.origin = origin.clone();
    }
    if toml.store.data_dir.is_some() {
        config.store.data_dir = toml.store.data_dir.clone();
    }
    if let Some(capacity) = toml.store.relay_capacity {
        config.store.relay_capacity = capacity;
    }

    if let Some(secs) = toml.tracker.reward_interval_secs {
        config.tracker.reward_interval_secs = secs;
    }

    // Remote settings
    if toml.remote.base_url.is_some() {
        config.remote.base_url = toml.remote.base_url.clone();
    }
    if let Some(ms) = toml.remote.timeout_ms {
        config.remote.timeout = Duration::from_millis(ms);
    }
}

/// Copy every `LILGUY_*` variable that parses over `config`
fn apply_env_config(config: &mut LilGuyConfig) {
    apply_env_overrides(config, |name| std::env::var(name).ok());
}

/// Apply overrides from any variable lookup
///
/// Unparseable values are ignored and leave the previous layer in place.
fn apply_env_overrides<F>(config: &mut LilGuyConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(ms) = lookup("LILGUY_FRAME_INTERVAL_MS").and_then(|v| v.parse::<u64>().ok()) {
        config.animation.frame_interval = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(stagger) = lookup("LILGUY_STAGGER").and_then(|v| v.parse::<u64>().ok()) {
        config.animation.stagger = stagger;
        config.source = ConfigSource::Env;
    }
    if let Some(phase) = lookup("LILGUY_FRAME_PHASE").and_then(|v| v.parse::<FramePhase>().ok()) {
        config.animation.frame_phase = phase;
        config.source = ConfigSource::Env;
    }
    if let Some(root) = lookup("LILGUY_ASSET_ROOT") {
        config.animation.asset_root = PathBuf::from(root);
        config.source = ConfigSource::Env;
    }
    if let Some(origin) = lookup("LILGUY_ORIGIN") {
        config.store.origin = origin;
        config.source = ConfigSource::Env;
    }
    if let Some(dir) = lookup("LILGUY_DATA_DIR") {
        config.store.data_dir = Some(PathBuf::from(dir));
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = lookup("LILGUY_REWARD_INTERVAL").and_then(|v| v.parse::<u64>().ok()) {
        config.tracker.reward_interval_secs = secs;
        config.source = ConfigSource::Env;
    }
    if let Some(url) = lookup("LILGUY_REMOTE_URL") {
        config.remote.base_url = Some(url).filter(|u| !u.trim().is_empty());
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line layer, applied after [`load_config`]
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Data directory override
    pub data_dir: Option<PathBuf>,
    /// Origin override
    pub origin: Option<String>,
    /// Asset root override
    pub asset_root: Option<PathBuf>,
    /// Remote URL override
    pub remote_url: Option<String>,
}

impl ConfigOverrides {
    /// No overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set data directory override
    #[must_use]
    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = Some(dir);
        self
    }

    /// Set origin override
    #[must_use]
    pub fn with_origin(mut self, origin: String) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Set asset root override
    #[must_use]
    pub fn with_asset_root(mut self, root: PathBuf) -> Self {
        self.asset_root = Some(root);
        self
    }

    /// Set remote URL override
    #[must_use]
    pub fn with_remote_url(mut self, url: String) -> Self {
        self.remote_url = Some(url);
        self
    }

    /// Overwrite the fields that were given
    pub fn apply(&self, config: &mut LilGuyConfig) {
        if self.data_dir.is_some()
            || self.origin.is_some()
            || self.asset_root.is_some()
            || self.remote_url.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref dir) = self.data_dir {
            config.store.data_dir = Some(dir.clone());
        }
        if let Some(ref origin) = self.origin {
            config.store.origin = origin.clone();
        }
        if let Some(ref root) = self.asset_root {
            config.animation.asset_root = root.clone();
        }
        if let Some(ref url) = self.remote_url {
            config.remote.base_url = Some(url.clone());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
