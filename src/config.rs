//! Controller configuration loaded from the environment

use std::str::FromStr;

use crate::error::{Error, Result};

/// Default number of App workers
pub const DEFAULT_APP_WORKERS: u16 = 2;

/// Default number of Service/Ingress workers
pub const DEFAULT_INGRESS_WORKERS: u16 = 5;

/// Default retry bound for the Service/Ingress controller
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default metrics port
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Runtime settings for both controllers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Run the App controller
    pub app_controller_enabled: bool,
    /// Concurrent App syncs
    pub app_workers: u16,
    /// Write `status.availableReplicas` back to the App after a successful sync
    pub update_status: bool,

    /// Run the annotation-driven Service/Ingress controller
    pub ingress_controller_enabled: bool,
    pub ingress_workers: u16,
    /// Retries before a failing Service key is forgotten
    pub ingress_max_retries: u32,

    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_controller_enabled: true,
            app_workers: DEFAULT_APP_WORKERS,
            update_status: false,
            ingress_controller_enabled: true,
            ingress_workers: DEFAULT_INGRESS_WORKERS,
            ingress_max_retries: DEFAULT_MAX_RETRIES,
            metrics_port: DEFAULT_METRICS_PORT,
        }
    }
}

impl Config {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from any variable source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            app_controller_enabled: parse_var(
                &lookup,
                "APP_CONTROLLER_ENABLED",
                defaults.app_controller_enabled,
            )?,
            app_workers: parse_var(&lookup, "APP_CONTROLLER_WORKERS", defaults.app_workers)?,
            update_status: parse_var(
                &lookup,
                "APP_CONTROLLER_UPDATE_STATUS",
                defaults.update_status,
            )?,
            ingress_controller_enabled: parse_var(
                &lookup,
                "INGRESS_CONTROLLER_ENABLED",
                defaults.ingress_controller_enabled,
            )?,
            ingress_workers: parse_var(
                &lookup,
                "INGRESS_CONTROLLER_WORKERS",
                defaults.ingress_workers,
            )?,
            ingress_max_retries: parse_var(
                &lookup,
                "INGRESS_CONTROLLER_MAX_RETRIES",
                defaults.ingress_max_retries,
            )?,
            metrics_port: parse_var(&lookup, "METRICS_PORT", defaults.metrics_port)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.app_workers == 0 {
            return Err(Error::config("APP_CONTROLLER_WORKERS must be at least 1"));
        }
        if self.ingress_workers == 0 {
            return Err(Error::config("INGRESS_CONTROLLER_WORKERS must be at least 1"));
        }
        if !self.app_controller_enabled && !self.ingress_controller_enabled {
            return Err(Error::config("at least one controller must be enabled"));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::config(format!("invalid value {:?} for {}: {}", raw, name, e))),
    }
}
