//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements   | Connects to                     |
//! |----------------|--------------|---------------------------------|
//! | `hardware`     | ServoPort    | ESP32 LEDC (50 Hz servo PWM)    |
//! | `http_store`   | StorePort    | Schedule store HTTP endpoint    |
//! | `memory_store` | StorePort    | In-memory table (host / tests)  |
//! | `log_sink`     | EventSink    | Serial log output               |
//! | `nvs`          | ConfigPort   | NVS / in-memory store           |
//! | `time`         | ClockPort    | SNTP-synced system clock        |
//! | `wifi`         | —            | ESP-IDF WiFi STA bring-up       |
//!
//! `store_codec` is the JSON wire format shared by `http_store` and the
//! fuzz targets.

pub mod hardware;
#[cfg(target_os = "espidf")]
pub mod http_store;
pub mod log_sink;
pub mod memory_store;
pub mod nvs;
pub mod store_codec;
pub mod time;
pub mod wifi;
