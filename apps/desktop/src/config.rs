use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use client_core::{ControlConfig, DEFAULT_LOG_CAPACITY};
use serde::Deserialize;
use shared::{
    domain::{Endpoint, MotorCoefficients, DEFAULT_HOST, DEFAULT_PORT},
    protocol::ProtocolGeneration,
};
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "contrail.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: String,
    pub motor_coefficients: MotorCoefficients,
    pub log_capacity: usize,
    pub repeat_interval_ms: u64,
    pub connect_timeout_secs: u64,
    pub protocol: ProtocolGeneration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT.into(),
            motor_coefficients: MotorCoefficients::default(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            repeat_interval_ms: 100,
            connect_timeout_secs: 5,
            protocol: ProtocolGeneration::Typed,
        }
    }
}

impl Settings {
    pub fn control_config(&self) -> ControlConfig {
        ControlConfig {
            endpoint: Endpoint::new(self.host.clone(), self.port.clone()),
            coefficients: self.motor_coefficients,
            log_capacity: self.log_capacity,
            repeat_interval: Duration::from_millis(self.repeat_interval_ms),
            protocol: self.protocol,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    host: Option<String>,
    port: Option<toml::Value>,
    motor_coefficients: Option<[f32; 4]>,
    log_capacity: Option<usize>,
    repeat_interval_ms: Option<u64>,
    connect_timeout_secs: Option<u64>,
    protocol: Option<ProtocolGeneration>,
}

/// Defaults, then the TOML file, then `CONTRAIL__*` environment variables.
/// A missing default file is fine; an explicitly named one that cannot be
/// read is reported and skipped.
pub fn load_settings(config_path: Option<&Path>) -> Settings {
    let mut settings = Settings::default();

    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(path) {
        Ok(raw) => {
            if let Err(error) = apply_file(&mut settings, &raw) {
                warn!(path = %path.display(), %error, "ignoring invalid settings file");
            }
        }
        Err(error) if config_path.is_some() => {
            warn!(path = %path.display(), %error, "failed to read settings file");
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

pub(crate) fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file: FileSettings = toml::from_str(raw).context("failed to parse settings TOML")?;

    if let Some(host) = file.host {
        settings.host = host;
    }
    if let Some(port) = file.port {
        settings.port = port_text(&port)?;
    }
    if let Some(values) = file.motor_coefficients {
        match MotorCoefficients::try_from_wire_order(values) {
            Ok(coefficients) => settings.motor_coefficients = coefficients,
            Err(error) => warn!(%error, "ignoring motor_coefficients from settings file"),
        }
    }
    if let Some(capacity) = file.log_capacity {
        settings.log_capacity = capacity;
    }
    match file.repeat_interval_ms {
        Some(0) => warn!("ignoring repeat_interval_ms = 0 from settings file"),
        Some(interval) => settings.repeat_interval_ms = interval,
        None => {}
    }
    match file.connect_timeout_secs {
        Some(0) => warn!("ignoring connect_timeout_secs = 0 from settings file"),
        Some(timeout) => settings.connect_timeout_secs = timeout,
        None => {}
    }
    if let Some(protocol) = file.protocol {
        settings.protocol = protocol;
    }
    Ok(())
}

pub(crate) fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("CONTRAIL__HOST") {
        settings.host = v;
    }
    if let Some(v) = lookup("CONTRAIL__PORT") {
        settings.port = v;
    }
    if let Some(v) = lookup("CONTRAIL__LOG_CAPACITY") {
        match v.parse::<usize>() {
            Ok(parsed) => settings.log_capacity = parsed,
            Err(_) => warn!(value = %v, "ignoring CONTRAIL__LOG_CAPACITY"),
        }
    }
    if let Some(v) = lookup("CONTRAIL__PROTOCOL") {
        match parse_protocol(&v) {
            Some(protocol) => settings.protocol = protocol,
            None => warn!(value = %v, "ignoring CONTRAIL__PROTOCOL"),
        }
    }
}

fn port_text(value: &toml::Value) -> anyhow::Result<String> {
    match value {
        toml::Value::String(port) => Ok(port.clone()),
        toml::Value::Integer(port) => Ok(port.to_string()),
        other => bail!("port must be a string or integer, got {}", other.type_str()),
    }
}

fn parse_protocol(raw: &str) -> Option<ProtocolGeneration> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "typed" => Some(ProtocolGeneration::Typed),
        "legacy" => Some(ProtocolGeneration::Legacy),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
