//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: /etc/hallway-monitor.toml
//!
//! Every section is optional; missing keys fall back to the defaults below.
//! Values are validated once at startup and treated as read-only afterwards.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/hallway-monitor.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_id")]
    pub id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id() }
    }
}

fn default_site_id() -> String {
    "hallway".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchdogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_watchdog_device")]
    pub device: String,
    /// Requested timeout; the device may settle on a different value
    #[serde(default = "default_watchdog_timeout_secs")]
    pub timeout_secs: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device: default_watchdog_device(),
            timeout_secs: default_watchdog_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_watchdog_device() -> String {
    "/dev/watchdog".to_string()
}

fn default_watchdog_timeout_secs() -> u32 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinksConfig {
    /// Event log (JSONL)
    #[serde(default = "default_log_file")]
    pub log_file: String,
    /// Stats reports (JSONL)
    #[serde(default = "default_stats_file")]
    pub stats_file: String,
    /// Handoff queue between the tick loop and the writer
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for SinksConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            stats_file: default_stats_file(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_log_file() -> String {
    "hallway.log.jsonl".to_string()
}

fn default_stats_file() -> String {
    "hallway.stats.jsonl".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_stats_period_secs")]
    pub period_secs: u64,
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { period_secs: default_stats_period_secs(), max_samples: default_max_samples() }
    }
}

fn default_stats_period_secs() -> u64 {
    60
}

fn default_max_samples() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrafficConfig {
    /// 0 flags every transit
    #[serde(default = "default_speed_limit_mps")]
    pub speed_limit_mps: f64,
    #[serde(default = "default_beam_distance_m")]
    pub beam_distance_m: f64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            speed_limit_mps: default_speed_limit_mps(),
            beam_distance_m: default_beam_distance_m(),
        }
    }
}

fn default_speed_limit_mps() -> f64 {
    1.0
}

fn default_beam_distance_m() -> f64 {
    3.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_block_timeout_secs")]
    pub block_timeout_secs: u64,
    #[serde(default = "default_hallway_timeout_secs")]
    pub hallway_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            block_timeout_secs: default_block_timeout_secs(),
            hallway_timeout_secs: default_hallway_timeout_secs(),
        }
    }
}

fn default_tick_ms() -> u64 {
    1
}

fn default_block_timeout_secs() -> u64 {
    5
}

fn default_hallway_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct GpioConfig {
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: String,
    /// Left photodiode; the entry side on ties
    #[serde(default = "default_entry_beam_pin")]
    pub entry_beam_pin: u8,
    /// Right photodiode
    #[serde(default = "default_exit_beam_pin")]
    pub exit_beam_pin: u8,
    #[serde(default = "default_running_led_pin")]
    pub running_led_pin: u8,
    #[serde(default = "default_warning_led_pin")]
    pub warning_led_pin: u8,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            sysfs_root: default_sysfs_root(),
            entry_beam_pin: default_entry_beam_pin(),
            exit_beam_pin: default_exit_beam_pin(),
            running_led_pin: default_running_led_pin(),
            warning_led_pin: default_warning_led_pin(),
        }
    }
}

fn default_sysfs_root() -> String {
    "/sys/class/gpio".to_string()
}

fn default_entry_beam_pin() -> u8 {
    4
}

fn default_exit_beam_pin() -> u8 {
    18
}

fn default_running_led_pin() -> u8 {
    17
}

fn default_warning_led_pin() -> u8 {
    22
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    2000
}

fn default_max_backoff_ms() -> u64 {
    16000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
    /// Prometheus metrics HTTP port (0 to disable)
    #[serde(default)]
    pub prometheus_port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs(), prometheus_port: 0 }
    }
}

fn default_metrics_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub sinks: SinksConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub traffic: TrafficConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub gpio: GpioConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    watchdog_enabled: bool,
    watchdog_device: String,
    watchdog_timeout_secs: u32,
    log_file: String,
    stats_file: String,
    sink_channel_capacity: usize,
    stats_period_secs: u64,
    stats_max_samples: usize,
    speed_limit_mps: f64,
    beam_distance_m: f64,
    tick_ms: u64,
    block_timeout_secs: u64,
    hallway_timeout_secs: u64,
    gpio_sysfs_root: String,
    entry_beam_pin: u8,
    exit_beam_pin: u8,
    running_led_pin: u8,
    warning_led_pin: u8,
    connectivity_max_attempts: u32,
    connectivity_initial_backoff_ms: u64,
    connectivity_max_backoff_ms: u64,
    metrics_interval_secs: u64,
    prometheus_port: u16,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(arg: Option<&str>) -> String {
        if let Some(path) = arg {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        DEFAULT_CONFIG_PATH.to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load and validate configuration. Any failure is fatal at startup.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config = Self::from_file(path)?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            site_id: toml_config.site.id,
            watchdog_enabled: toml_config.watchdog.enabled,
            watchdog_device: toml_config.watchdog.device,
            watchdog_timeout_secs: toml_config.watchdog.timeout_secs,
            log_file: toml_config.sinks.log_file,
            stats_file: toml_config.sinks.stats_file,
            sink_channel_capacity: toml_config.sinks.channel_capacity,
            stats_period_secs: toml_config.stats.period_secs,
            stats_max_samples: toml_config.stats.max_samples,
            speed_limit_mps: toml_config.traffic.speed_limit_mps,
            beam_distance_m: toml_config.traffic.beam_distance_m,
            tick_ms: toml_config.timing.tick_ms,
            block_timeout_secs: toml_config.timing.block_timeout_secs,
            hallway_timeout_secs: toml_config.timing.hallway_timeout_secs,
            gpio_sysfs_root: toml_config.gpio.sysfs_root,
            entry_beam_pin: toml_config.gpio.entry_beam_pin,
            exit_beam_pin: toml_config.gpio.exit_beam_pin,
            running_led_pin: toml_config.gpio.running_led_pin,
            warning_led_pin: toml_config.gpio.warning_led_pin,
            connectivity_max_attempts: toml_config.connectivity.max_attempts,
            connectivity_initial_backoff_ms: toml_config.connectivity.initial_backoff_ms,
            connectivity_max_backoff_ms: toml_config.connectivity.max_backoff_ms,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            prometheus_port: toml_config.metrics.prometheus_port,
            config_file: config_file.to_string(),
        }
    }

    /// Check the invariants the core relies on
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.beam_distance_m.is_finite() || self.beam_distance_m <= 0.0 {
            bail!("traffic.beam_distance_m must be > 0 (got {})", self.beam_distance_m);
        }
        if !self.speed_limit_mps.is_finite() || self.speed_limit_mps < 0.0 {
            bail!("traffic.speed_limit_mps must be >= 0 (got {})", self.speed_limit_mps);
        }
        if self.stats_period_secs == 0 {
            bail!("stats.period_secs must be > 0");
        }
        if self.stats_max_samples == 0 {
            bail!("stats.max_samples must be > 0");
        }
        if self.block_timeout_secs == 0 || self.hallway_timeout_secs == 0 {
            bail!("timing.block_timeout_secs and timing.hallway_timeout_secs must be > 0");
        }
        if self.tick_ms == 0 {
            bail!("timing.tick_ms must be > 0");
        }
        if self.watchdog_timeout_secs == 0 {
            bail!("watchdog.timeout_secs must be > 0");
        }
        // A tick must leave plenty of room inside one watchdog interval
        if self.tick_ms.saturating_mul(10) > u64::from(self.watchdog_timeout_secs) * 1000 {
            bail!(
                "timing.tick_ms ({}) is too long for a {}s watchdog",
                self.tick_ms,
                self.watchdog_timeout_secs
            );
        }
        if self.connectivity_max_attempts == 0 {
            bail!("connectivity.max_attempts must be >= 1");
        }
        if self.sink_channel_capacity == 0 {
            bail!("sinks.channel_capacity must be > 0");
        }
        if self.entry_beam_pin == self.exit_beam_pin {
            bail!("gpio.entry_beam_pin and gpio.exit_beam_pin must differ");
        }
        Ok(())
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn watchdog_enabled(&self) -> bool {
        self.watchdog_enabled
    }

    pub fn watchdog_device(&self) -> &str {
        &self.watchdog_device
    }

    pub fn watchdog_timeout_secs(&self) -> u32 {
        self.watchdog_timeout_secs
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    pub fn stats_file(&self) -> &str {
        &self.stats_file
    }

    pub fn sink_channel_capacity(&self) -> usize {
        self.sink_channel_capacity
    }

    pub fn stats_period(&self) -> Duration {
        Duration::from_secs(self.stats_period_secs)
    }

    pub fn stats_max_samples(&self) -> usize {
        self.stats_max_samples
    }

    pub fn speed_limit_mps(&self) -> f64 {
        self.speed_limit_mps
    }

    pub fn beam_distance_m(&self) -> f64 {
        self.beam_distance_m
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn block_timeout(&self) -> Duration {
        Duration::from_secs(self.block_timeout_secs)
    }

    pub fn hallway_timeout(&self) -> Duration {
        Duration::from_secs(self.hallway_timeout_secs)
    }

    pub fn gpio_sysfs_root(&self) -> &str {
        &self.gpio_sysfs_root
    }

    pub fn entry_beam_pin(&self) -> u8 {
        self.entry_beam_pin
    }

    pub fn exit_beam_pin(&self) -> u8 {
        self.exit_beam_pin
    }

    pub fn running_led_pin(&self) -> u8 {
        self.running_led_pin
    }

    pub fn warning_led_pin(&self) -> u8 {
        self.warning_led_pin
    }

    pub fn connectivity_max_attempts(&self) -> u32 {
        self.connectivity_max_attempts
    }

    pub fn connectivity_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.connectivity_initial_backoff_ms)
    }

    pub fn connectivity_max_backoff(&self) -> Duration {
        Duration::from_millis(self.connectivity_max_backoff_ms)
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn prometheus_port(&self) -> u16 {
        self.prometheus_port
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the speed limit
    #[cfg(test)]
    pub fn with_speed_limit(mut self, limit_mps: f64) -> Self {
        self.speed_limit_mps = limit_mps;
        self
    }

    /// Builder method for tests to set the inter-beam distance
    #[cfg(test)]
    pub fn with_beam_distance(mut self, distance_m: f64) -> Self {
        self.beam_distance_m = distance_m;
        self
    }

    /// Builder method for tests to set the stats period
    #[cfg(test)]
    pub fn with_stats_period_secs(mut self, secs: u64) -> Self {
        self.stats_period_secs = secs;
        self
    }

    /// Builder method for tests to set the per-window sample bound
    #[cfg(test)]
    pub fn with_max_samples(mut self, max: usize) -> Self {
        self.stats_max_samples = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.site_id(), "hallway");
        assert_eq!(config.watchdog_device(), "/dev/watchdog");
        assert_eq!(config.stats_period(), Duration::from_secs(60));
        assert_eq!(config.speed_limit_mps(), 1.0);
        assert_eq!(config.beam_distance_m(), 3.0);
        assert_eq!(config.block_timeout(), Duration::from_secs(5));
        assert_eq!(config.hallway_timeout(), Duration::from_secs(10));
        assert_eq!(config.entry_beam_pin(), 4);
        assert_eq!(config.exit_beam_pin(), 18);
        assert_eq!(config.running_led_pin(), 17);
        assert_eq!(config.warning_led_pin(), 22);
        assert_eq!(config.prometheus_port(), 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_speed_limit_is_valid() {
        let config = Config::default().with_speed_limit(0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_speed_limit_rejected() {
        let config = Config::default().with_speed_limit(-1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_distance_rejected() {
        assert!(Config::default().with_beam_distance(0.0).validate().is_err());
        assert!(Config::default().with_beam_distance(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(Config::default().with_stats_period_secs(0).validate().is_err());
    }

    #[test]
    fn test_resolve_config_path_from_arg() {
        assert_eq!(Config::resolve_config_path(Some("site.toml")), "site.toml");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
[traffic]
speed_limit_mps = 2.5
"#,
        )
        .unwrap();
        let config = Config::from_toml(toml_config, "inline");

        assert_eq!(config.speed_limit_mps(), 2.5);
        assert_eq!(config.beam_distance_m(), 3.0);
        assert_eq!(config.log_file(), "hallway.log.jsonl");
        assert_eq!(config.config_file(), "inline");
    }
}
