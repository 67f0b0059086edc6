//! Integration tests for configuration loading

use hallway_monitor::infra::Config;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_config_from_file() {
    let temp_file = write_config(
        r#"
[site]
id = "lab-corridor"

[watchdog]
enabled = false
device = "/dev/watchdog1"
timeout_secs = 30

[sinks]
log_file = "/var/log/hallway/events.jsonl"
stats_file = "/var/log/hallway/stats.jsonl"
channel_capacity = 256

[stats]
period_secs = 120
max_samples = 50

[traffic]
speed_limit_mps = 1.5
beam_distance_m = 2.5

[timing]
tick_ms = 5
block_timeout_secs = 4
hallway_timeout_secs = 20

[gpio]
sysfs_root = "/tmp/gpio"
entry_beam_pin = 5
exit_beam_pin = 6
running_led_pin = 13
warning_led_pin = 19

[connectivity]
max_attempts = 3
initial_backoff_ms = 500
max_backoff_ms = 4000

[metrics]
interval_secs = 15
prometheus_port = 9091
"#,
    );

    let config = Config::load(temp_file.path()).unwrap();

    assert_eq!(config.site_id(), "lab-corridor");
    assert!(!config.watchdog_enabled());
    assert_eq!(config.watchdog_device(), "/dev/watchdog1");
    assert_eq!(config.watchdog_timeout_secs(), 30);
    assert_eq!(config.log_file(), "/var/log/hallway/events.jsonl");
    assert_eq!(config.sink_channel_capacity(), 256);
    assert_eq!(config.stats_period(), Duration::from_secs(120));
    assert_eq!(config.stats_max_samples(), 50);
    assert_eq!(config.speed_limit_mps(), 1.5);
    assert_eq!(config.beam_distance_m(), 2.5);
    assert_eq!(config.tick_period(), Duration::from_millis(5));
    assert_eq!(config.block_timeout(), Duration::from_secs(4));
    assert_eq!(config.hallway_timeout(), Duration::from_secs(20));
    assert_eq!(config.gpio_sysfs_root(), "/tmp/gpio");
    assert_eq!(config.entry_beam_pin(), 5);
    assert_eq!(config.warning_led_pin(), 19);
    assert_eq!(config.connectivity_max_attempts(), 3);
    assert_eq!(config.connectivity_initial_backoff(), Duration::from_millis(500));
    assert_eq!(config.metrics_interval_secs(), 15);
    assert_eq!(config.prometheus_port(), 9091);
}

#[test]
fn test_empty_file_uses_defaults() {
    let temp_file = write_config("");

    let config = Config::load(temp_file.path()).unwrap();

    assert_eq!(config.site_id(), "hallway");
    assert_eq!(config.speed_limit_mps(), 1.0);
    assert_eq!(config.beam_distance_m(), 3.0);
    assert_eq!(config.stats_period(), Duration::from_secs(60));
    assert_eq!(config.watchdog_device(), "/dev/watchdog");
    assert_eq!(config.exit_beam_pin(), 18);
}

#[test]
fn test_missing_file_is_fatal() {
    let err = Config::load("/nonexistent/hallway-monitor.toml").unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/hallway-monitor.toml"));
}

#[test]
fn test_malformed_toml_is_fatal() {
    let temp_file = write_config("[traffic\nspeed_limit_mps = ");
    assert!(Config::load(temp_file.path()).is_err());
}

#[test]
fn test_invalid_values_rejected() {
    let temp_file = write_config(
        r#"
[traffic]
beam_distance_m = 0.0
"#,
    );
    let err = Config::load(temp_file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("beam_distance_m"));

    let temp_file = write_config(
        r#"
[stats]
period_secs = 0
"#,
    );
    assert!(Config::load(temp_file.path()).is_err());

    let temp_file = write_config(
        r#"
[connectivity]
max_attempts = 0
"#,
    );
    assert!(Config::load(temp_file.path()).is_err());
}

#[test]
fn test_zero_speed_limit_accepted() {
    let temp_file = write_config(
        r#"
[traffic]
speed_limit_mps = 0.0
"#,
    );

    let config = Config::load(temp_file.path()).unwrap();
    assert_eq!(config.speed_limit_mps(), 0.0);
}
