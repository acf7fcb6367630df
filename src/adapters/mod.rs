//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements            | Connects to                  |
//! |---------------|-----------------------|------------------------------|
//! | `hardware`    | SensorPort            | HX711 load cell, HC-SR04     |
//! |               | ActuatorPort          | Hatch servo (LEDC), relay    |
//! |               | DelayNs, Clock        | FreeRTOS delay, esp_timer    |
//! | `display`     | DisplayPort           | Serial log mirror            |
//! | `log_sink`    | EventSink             | Serial log output            |
//! | `json_link`   | RemoteLink, EventSink | Relay server (JSON lines)    |
//! | `cloud_props` | RemoteLink, EventSink | Cloud property triggers      |
//! | `nvs`         | ConfigPort            | NVS / in-memory store        |
//! | `time`        | Clock                 | esp_timer, SNTP wall clock   |
//! | `transport`   | Transport             | Link channels, memory, null  |

pub mod channels;
pub mod cloud_props;
pub mod display;
pub mod hardware;
pub mod json_link;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod transport;
