//! WiFi station-mode bring-up.
//!
//! The schedule store is only reachable over WiFi, so `main` blocks in
//! [`connect_station`] until the station is associated and has an IP.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: only credential validation and the backoff
//!   schedule exist, for host-side tests.
//!
//! ## Retry policy
//!
//! Failed association attempts wait an exponential backoff (2 s → 4 s →
//! 8 s … capped at 60 s) before retrying.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    DriverInit,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(
                f,
                "password invalid (must be 8-64 bytes for WPA2, or empty for open)"
            ),
            Self::DriverInit => write!(f, "WiFi driver initialisation failed"),
        }
    }
}

impl std::error::Error for WifiError {}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), WifiError> {
    if ssid.is_empty() {
        return Err(WifiError::NoCredentials);
    }
    if ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(WifiError::InvalidSsid);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), WifiError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(WifiError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Backoff
// ───────────────────────────────────────────────────────────────

const INITIAL_BACKOFF_SECS: u32 = 2;
const MAX_BACKOFF_SECS: u32 = 60;

/// Exponential retry delay for association attempts.
#[derive(Debug)]
pub struct Backoff {
    next_secs: u32,
    attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self {
            next_secs: INITIAL_BACKOFF_SECS,
            attempts: 0,
        }
    }

    /// Delay before the next attempt; doubles up to the cap.
    pub fn next_delay_secs(&mut self) -> u32 {
        let d = self.next_secs;
        self.next_secs = (self.next_secs * 2).min(MAX_BACKOFF_SECS);
        self.attempts += 1;
        d
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF station
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use station::connect_station;

#[cfg(target_os = "espidf")]
mod station {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
    use log::{info, warn};

    use super::{Backoff, WifiError, validate_password, validate_ssid};

    /// Associate with `ssid`, retrying until it succeeds.
    ///
    /// Only configuration and driver errors are returned; association
    /// failures are retried forever with [`Backoff`].
    pub fn connect_station(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        ssid: &str,
        password: &str,
    ) -> Result<BlockingWifi<EspWifi<'static>>, WifiError> {
        validate_ssid(ssid)?;
        validate_password(password)?;

        let driver = EspWifi::new(modem, sysloop.clone(), Some(nvs)).map_err(|e| {
            warn!("WiFi: driver init failed: {}", e);
            WifiError::DriverInit
        })?;
        let mut wifi = BlockingWifi::wrap(driver, sysloop).map_err(|_| WifiError::DriverInit)?;

        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| WifiError::InvalidSsid)?,
            password: password.try_into().map_err(|_| WifiError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });
        wifi.set_configuration(&config).map_err(|_| WifiError::DriverInit)?;
        wifi.start().map_err(|_| WifiError::DriverInit)?;

        let mut backoff = Backoff::new();
        loop {
            info!("WiFi: connecting to '{}'", ssid);
            match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
                Ok(()) => {
                    info!("WiFi: connected after {} retries", backoff.attempts());
                    return Ok(wifi);
                }
                Err(e) => {
                    let secs = backoff.next_delay_secs();
                    warn!("WiFi: connect failed ({}), retrying in {} s", e, secs);
                    let _ = wifi.disconnect();
                    std::thread::sleep(std::time::Duration::from_secs(u64::from(secs)));
                }
            }
        }
    }
}
