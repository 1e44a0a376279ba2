//! Startup configuration: defaults, overlaid by a TOML file, then env vars,
//! then CLI flags — each layer optional, missing keys falling back rather
//! than erroring, matching the teacher's tolerant UCI-read style.

use std::path::PathBuf;

use log::{info, warn};
use serde::Deserialize;

use crate::at::{DEFAULT_BAUD, DEFAULT_TIMEOUT_SECS};

#[derive(Debug, Clone)]
pub struct Config {
    pub serial_port: String,
    pub serial_baud: u32,
    pub serial_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub cmgl_state: u8,
    pub webhook_url: String,
    pub exclusion_file: PathBuf,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyUSB0".to_string(),
            serial_baud: DEFAULT_BAUD,
            serial_timeout_secs: DEFAULT_TIMEOUT_SECS,
            poll_interval_secs: 60,
            cmgl_state: 0,
            webhook_url: String::new(),
            exclusion_file: PathBuf::from("exclusions.txt"),
            log_level: "info".to_string(),
        }
    }
}

/// Mirror of the TOML schema; every field optional so a partial file
/// overlays cleanly onto the defaults.
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    serial_port: Option<String>,
    serial_baud: Option<u32>,
    serial_timeout_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
    cmgl_state: Option<u8>,
    webhook_url: Option<String>,
    exclusion_file: Option<PathBuf>,
    log_level: Option<String>,
}

impl Config {
    pub fn load(cli: &crate::Cli) -> Self {
        let mut config = Config::default();

        info!("loading configuration from {:?}", cli.config);
        match std::fs::read_to_string(&cli.config) {
            Ok(contents) => match toml::from_str::<TomlConfig>(&contents) {
                Ok(file) => config.overlay_toml(file),
                Err(e) => warn!("malformed config file {:?} ({}); using defaults", cli.config, e),
            },
            Err(e) => {
                warn!("config file {:?} not readable ({}); using defaults", cli.config, e);
            }
        }

        config.overlay_env();

        if let Some(level) = &cli.log_level {
            config.log_level = level.clone();
        }

        info!("loaded configuration: {:?}", config);
        config
    }

    fn overlay_toml(&mut self, file: TomlConfig) {
        if let Some(v) = file.serial_port {
            self.serial_port = v;
        }
        if let Some(v) = file.serial_baud {
            self.serial_baud = v;
        }
        if let Some(v) = file.serial_timeout_secs {
            self.serial_timeout_secs = v;
        }
        if let Some(v) = file.poll_interval_secs {
            self.poll_interval_secs = v;
        }
        if let Some(v) = file.cmgl_state {
            self.cmgl_state = v;
        }
        if let Some(v) = file.webhook_url {
            self.webhook_url = v;
        }
        if let Some(v) = file.exclusion_file {
            self.exclusion_file = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
    }

    fn overlay_env(&mut self) {
        if let Ok(val) = std::env::var("SMS_SERIAL_PORT") {
            self.serial_port = val;
        }
        if let Ok(val) = std::env::var("SMS_SERIAL_BAUD") {
            if let Ok(v) = val.parse() {
                self.serial_baud = v;
            }
        }
        if let Ok(val) = std::env::var("SMS_POLL_INTERVAL_SECS") {
            if let Ok(v) = val.parse() {
                self.poll_interval_secs = v;
            }
        }
        if let Ok(val) = std::env::var("SMS_WEBHOOK_URL") {
            self.webhook_url = val;
        }
        if let Ok(val) = std::env::var("SMS_EXCLUSION_FILE") {
            self.exclusion_file = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("SMS_LOG_LEVEL") {
            self.log_level = val;
        }
    }
}
