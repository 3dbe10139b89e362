//! First-boot provisioning of network and store credentials.
//!
//! Credentials are baked in at build time through environment variables
//! and written to NVS on boot, so a freshly flashed board comes up without
//! any other provisioning channel:
//!
//! | Variable                 | Field                  |
//! |--------------------------|------------------------|
//! | `PILLBOX_WIFI_SSID`      | `wifi_ssid`            |
//! | `PILLBOX_WIFI_PASSWORD`  | `wifi_password`        |
//! | `PILLBOX_STORE_HOST`     | `store.host`           |
//! | `PILLBOX_STORE_PORT`     | `store.port`           |
//! | `PILLBOX_STORE_USER`     | `store.user`           |
//! | `PILLBOX_STORE_PASSWORD` | `store.password`       |
//! | `PILLBOX_STORE_DATABASE` | `store.database`       |
//!
//! Unset variables leave the stored value alone.  A set variable wins over
//! the stored value, so reflashing with new credentials takes effect.

use log::{info, warn};

use crate::adapters::wifi::{validate_password, validate_ssid};
use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::DispenserConfig;

/// Credential overrides; `None` leaves the field as stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Provisioning {
    pub wifi_ssid: Option<&'static str>,
    pub wifi_password: Option<&'static str>,
    pub store_host: Option<&'static str>,
    pub store_port: Option<&'static str>,
    pub store_user: Option<&'static str>,
    pub store_password: Option<&'static str>,
    pub store_database: Option<&'static str>,
}

impl Provisioning {
    /// Values captured from the build environment.
    pub const fn from_build_env() -> Self {
        Self {
            wifi_ssid: option_env!("PILLBOX_WIFI_SSID"),
            wifi_password: option_env!("PILLBOX_WIFI_PASSWORD"),
            store_host: option_env!("PILLBOX_STORE_HOST"),
            store_port: option_env!("PILLBOX_STORE_PORT"),
            store_user: option_env!("PILLBOX_STORE_USER"),
            store_password: option_env!("PILLBOX_STORE_PASSWORD"),
            store_database: option_env!("PILLBOX_STORE_DATABASE"),
        }
    }

    /// Overlay onto `config`.  Returns `true` if any field changed.
    ///
    /// Values that do not fit their field are rejected, not truncated.
    pub fn apply(&self, config: &mut DispenserConfig) -> Result<bool, ConfigError> {
        let mut next = config.clone();

        if let Some(ssid) = self.wifi_ssid {
            validate_ssid(ssid).map_err(|_| ConfigError::ValidationFailed("PILLBOX_WIFI_SSID"))?;
            next.wifi_ssid = fit(ssid, "PILLBOX_WIFI_SSID")?;
        }
        if let Some(password) = self.wifi_password {
            validate_password(password)
                .map_err(|_| ConfigError::ValidationFailed("PILLBOX_WIFI_PASSWORD"))?;
            next.wifi_password = fit(password, "PILLBOX_WIFI_PASSWORD")?;
        }
        if let Some(host) = self.store_host {
            next.store.host = fit(host, "PILLBOX_STORE_HOST")?;
        }
        if let Some(port) = self.store_port {
            next.store.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::ValidationFailed("PILLBOX_STORE_PORT"))?;
        }
        if let Some(user) = self.store_user {
            next.store.user = fit(user, "PILLBOX_STORE_USER")?;
        }
        if let Some(password) = self.store_password {
            next.store.password = fit(password, "PILLBOX_STORE_PASSWORD")?;
        }
        if let Some(database) = self.store_database {
            next.store.database = fit(database, "PILLBOX_STORE_DATABASE")?;
        }

        next.validate()?;
        let changed = next != *config;
        *config = next;
        Ok(changed)
    }
}

fn fit<const N: usize>(value: &str, name: &'static str) -> Result<heapless::String<N>, ConfigError> {
    heapless::String::try_from(value).map_err(|()| ConfigError::ValidationFailed(name))
}

/// Load the stored config, apply `provisioning`, and persist the result if
/// it changed.
///
/// Never fails: an unreadable store falls back to defaults, rejected
/// overrides are logged and skipped, and a failed save keeps the new values
/// for this boot only.
pub fn provision(nvs: &impl ConfigPort, provisioning: &Provisioning) -> DispenserConfig {
    let mut config = nvs.load().unwrap_or_else(|e| {
        warn!("Provisioning: stored config rejected ({}), using defaults", e);
        DispenserConfig::default()
    });

    match provisioning.apply(&mut config) {
        Ok(false) => {}
        Ok(true) => match nvs.save(&config) {
            Ok(()) => info!("Provisioning: build-time credentials saved to NVS"),
            Err(e) => warn!("Provisioning: save failed ({}), using values for this boot", e),
        },
        Err(e) => warn!("Provisioning: build-time credentials ignored: {}", e),
    }

    if config.wifi_ssid.is_empty() {
        warn!("Provisioning: no WiFi SSID stored; rebuild with PILLBOX_WIFI_SSID set");
    }
    config
}
