//! PetFeeder Firmware: Main Entry Point
//!
//! Hexagonal architecture on a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter      LogEventSink   NvsAdapter   SystemClock  │
//! │  (Sensor+Actuator)    (EventSink)    (Config)     (Clock)      │
//! │  JsonLink<ChannelTransport>          CloudPropsLink            │
//! │  (RemoteLink+EventSink)              (RemoteLink+EventSink)    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            FeederService (command gateway)             │    │
//! │  │  FeedController · WaterController · FeedSchedule       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::Result;
use log::{error, info, warn};

use petfeeder::adapters::cloud_props::CloudPropsLink;
use petfeeder::adapters::display::LogDisplay;
use petfeeder::adapters::hardware::HardwareAdapter;
use petfeeder::adapters::json_link::JsonLink;
use petfeeder::adapters::log_sink::LogEventSink;
use petfeeder::adapters::nvs::NvsAdapter;
use petfeeder::adapters::transport::ChannelTransport;
use petfeeder::app::ports::{ConfigPort, DisplayPort, RemoteLink};
use petfeeder::app::service::FeederService;
use petfeeder::config::FeederConfig;
use petfeeder::drivers::button::{ButtonDriver, ButtonEvent};
use petfeeder::drivers::hw_init;
use petfeeder::drivers::watchdog::Watchdog;

/// Reads averaged for the boot-time tare.
const TARE_READS: u8 = 10;

/// Pause before rebooting after a failed peripheral init.
const INIT_RESTART_DELAY: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PetFeeder v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Actuators are still unpowered; retry from a clean boot.
        error!(
            "HAL init failed: {}, restarting in {}s",
            e,
            INIT_RESTART_DELAY.as_secs()
        );
        std::thread::sleep(INIT_RESTART_DELAY);
        // SAFETY: FFI call with no arguments; it does not return.
        unsafe { esp_idf_svc::sys::esp_restart() };
    }
    if let Err(e) = hw_init::init_isr_service() {
        error!("ISR service init failed: {}, button disabled", e);
    }

    // ── 3. Config from NVS (or defaults) ──────────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {e}"))?;
    let config = nvs.load().unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        FeederConfig::default()
    });

    // ── 4. Adapters ───────────────────────────────────────────
    let mut hw = HardwareAdapter::from_config(&config);
    if let Err(e) = hw.tare_scale(TARE_READS) {
        warn!("Scale tare failed ({}), weights are relative to the factory zero", e);
    }

    let mut display = LogDisplay::new();
    let mut log_sink = LogEventSink::new();
    let mut link = JsonLink::new(ChannelTransport::new());
    let mut cloud = CloudPropsLink::new();
    let mut button = ButtonDriver::new();
    let watchdog = Watchdog::new();

    // ── 5. Service ────────────────────────────────────────────
    let mut app = FeederService::new(config.clone(), hw.clock().uptime_ms());
    {
        let mut sinks = (&mut log_sink, (&mut link, &mut cloud));
        app.on_link_up(&mut sinks);
    }
    display.show("PetFeeder", "Ready");

    info!("System ready. Entering control loop.");

    // ── 6. Control loop ───────────────────────────────────────
    let interval = Duration::from_millis(u64::from(config.control_loop_interval_ms));
    loop {
        let unix_secs = hw.clock().unix_secs();
        let mut sinks = (&mut log_sink, (&mut link, &mut cloud));

        // Inputs: remote links first, then the local button.
        while let Some(msg) = sinks.1.0.receive() {
            app.handle_inbound(msg, &mut hw, &mut display, &mut sinks);
        }
        while let Some(msg) = sinks.1.1.receive() {
            app.handle_inbound(msg, &mut hw, &mut display, &mut sinks);
        }
        if let Some(ButtonEvent::Press) = button.tick(hw.clock().uptime_ms()) {
            info!("Button: press");
            app.on_button(&mut hw, &mut display, &mut sinks);
        }

        // Timed phases.
        app.tick(unix_secs, &mut hw, &mut display, &mut sinks);

        app.auto_save_if_needed(hw.clock().uptime_ms(), &nvs);
        watchdog.feed();
        std::thread::sleep(interval);
    }
}
