//! Pillbox Firmware — Main Entry Point
//!
//! Hexagonal architecture with a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   HttpStoreAdapter   LogEventSink  NvsAdapter │
//! │  (ServoPort)       (StorePort)        (EventSink)   (Config)   │
//! │  SystemClock       ManualOverride                              │
//! │  (ClockPort)       (OverridePort)                              │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            DispenserService (pure logic)               │    │
//! │  │  ReconciliationEngine · ActuatorBank · DedupTracker    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  TickScheduler (200 ms period) · esp_restart on reset          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::{Delay, FreeRtos};
use esp_idf_svc::hal::gpio::{IOPin, OutputPin, Pin, PinDriver, Pull};
use esp_idf_svc::hal::ledc::config::TimerConfig;
use esp_idf_svc::hal::ledc::{LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::EspSntp;
use log::{debug, error, info, warn};

use pillbox::adapters::hardware::HardwareAdapter;
use pillbox::adapters::http_store::HttpStoreAdapter;
use pillbox::adapters::log_sink::LogEventSink;
use pillbox::adapters::nvs::NvsAdapter;
use pillbox::adapters::time::{MonotonicClock, SystemClock};
use pillbox::adapters::wifi::connect_station;
use pillbox::app::events::AppEvent;
use pillbox::app::manual::ManualOverride;
use pillbox::app::ports::EventSink;
use pillbox::app::service::{DispenserService, TickOutcome};
use pillbox::config::DispenserConfig;
use pillbox::drivers::button::ActiveLowButton;
use pillbox::error::Error;
use pillbox::pins;
use pillbox::provisioning::{Provisioning, provision};
use pillbox::scheduler::TickScheduler;

const WIFI_FAILURE_RESTART_MS: u32 = 5_000;

/// Stored config with build-time credentials applied, or defaults if NVS
/// is unusable.
fn load_config() -> DispenserConfig {
    match NvsAdapter::new() {
        Ok(nvs) => provision(&nvs, &Provisioning::from_build_env()),
        Err(e) => {
            warn!("NVS unavailable ({}), running with defaults", e);
            let mut config = DispenserConfig::default();
            if let Err(e) = Provisioning::from_build_env().apply(&mut config) {
                warn!("Build-time credentials ignored: {}", e);
            }
            config
        }
    }
}

/// Give the log time to drain, then reboot.
#[allow(unreachable_code)]
fn restart_after(ms: u32) -> ! {
    FreeRtos::delay_ms(ms);
    esp_idf_svc::hal::reset::restart();
    loop {
        FreeRtos::delay_ms(1000);
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Pillbox v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Config ─────────────────────────────────────────────
    let config = load_config();

    // ── 3. Network + wall clock ───────────────────────────────
    let _wifi = match connect_station(
        peripherals.modem,
        sysloop,
        nvs_partition,
        config.wifi_ssid.as_str(),
        config.wifi_password.as_str(),
    ) {
        Ok(wifi) => wifi,
        Err(e) => {
            error!("WiFi bring-up failed: {}; restarting in {} ms", e, WIFI_FAILURE_RESTART_MS);
            restart_after(WIFI_FAILURE_RESTART_MS);
        }
    };
    let _sntp = EspSntp::new_default()?;
    info!("SNTP started; live matching waits for the first sync");

    // ── 4. Servos (LEDC, 50 Hz, 14-bit) ───────────────────────
    let ledc = peripherals.ledc;
    let io = peripherals.pins;
    let timer = LedcTimerDriver::new(
        ledc.timer0,
        &TimerConfig::new()
            .frequency(Hertz(pins::SERVO_PWM_FREQ_HZ))
            .resolution(Resolution::Bits14),
    )?;
    let servo_pins = [
        io.gpio15.downgrade_output(),
        io.gpio2.downgrade_output(),
        io.gpio16.downgrade_output(),
        io.gpio17.downgrade_output(),
        io.gpio18.downgrade_output(),
        io.gpio19.downgrade_output(),
        io.gpio22.downgrade_output(),
    ];
    pins::check_servo_wiring(&servo_pins.each_ref().map(|p| p.pin())).map_err(|e| {
        error!("Servo wiring: {}", e);
        Error::Init("servo pin map")
    })?;
    let [s1, s2, s3, s4, s5, s6, s7] = servo_pins;
    let channels = [
        LedcDriver::new(ledc.channel0, &timer, s1)?,
        LedcDriver::new(ledc.channel1, &timer, s2)?,
        LedcDriver::new(ledc.channel2, &timer, s3)?,
        LedcDriver::new(ledc.channel3, &timer, s4)?,
        LedcDriver::new(ledc.channel4, &timer, s5)?,
        LedcDriver::new(ledc.channel5, &timer, s6)?,
        LedcDriver::new(ledc.channel6, &timer, s7)?,
    ];
    info!("Servos on GPIO {:?}", pins::SERVO_GPIOS);
    let servos = HardwareAdapter::new(channels);

    // ── 5. Front-panel buttons ────────────────────────────────
    let mut force_pin = PinDriver::input(io.gpio27.downgrade())?;
    force_pin.set_pull(Pull::Up)?;
    let mut reset_pin = PinDriver::input(io.gpio25.downgrade())?;
    reset_pin.set_pull(Pull::Up)?;
    let (force_gpio, reset_gpio) = (force_pin.pin(), reset_pin.pin());
    pins::check_button_wiring(force_gpio, reset_gpio).map_err(|e| {
        error!("Button wiring: {}", e);
        Error::Init("button pin map")
    })?;
    let mut panel = ManualOverride::new(
        ActiveLowButton::new(force_pin, force_gpio),
        ActiveLowButton::new(reset_pin, reset_gpio),
    );

    // ── 6. Service ────────────────────────────────────────────
    let mut sink = LogEventSink::new();
    let clock = SystemClock::new(config.utc_offset_secs);
    let mono = MonotonicClock::new();
    let mut delay = Delay::new_default();

    let mut service = DispenserService::new(&config, HttpStoreAdapter::new(), servos);
    if let Err(e) = service.start(&mut sink) {
        warn!("Store not reachable yet: {}", e);
    }

    let mut scheduler = TickScheduler::new(config.tick_interval_ms);
    let stats_every = u64::from(config.stats_interval_ticks);
    info!(
        "Entering control loop (tick {} ms, dwell {} s)",
        config.tick_interval_ms, config.dwell_secs
    );

    // ── 7. Control loop ───────────────────────────────────────
    loop {
        scheduler.start_tick(mono.uptime_ms());

        match service.tick(&mut panel, &clock, &mut delay, &mut sink) {
            TickOutcome::Completed => {}
            TickOutcome::StoreUnavailable => debug!("Tick {}: store unavailable", scheduler.ticks()),
            TickOutcome::RestartRequested => {
                info!("Restarting");
                esp_idf_svc::hal::reset::restart();
            }
        }

        if service.tick_count() % stats_every == 0 {
            sink.emit(&AppEvent::Stats(service.stats()));
        }

        scheduler.wait_for_next(mono.uptime_ms(), &mut delay);
    }
}
