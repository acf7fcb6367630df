//! Command gateway: replies, busy gating, settings persistence and the
//! link adapters feeding the service.

use petfeeder::adapters::cloud_props::CloudPropsLink;
use petfeeder::adapters::json_link::JsonLink;
use petfeeder::adapters::transport::MemoryTransport;
use petfeeder::app::commands::{CommandRequest, CommandSource, Inbound, SettingsUpdate};
use petfeeder::app::events::{AppEvent, ReplyStatus};
use petfeeder::app::ports::{ConfigPort, RemoteLink};
use petfeeder::config::FeederConfig;
use petfeeder::control::feed::FeedReport;

use crate::mock_hw::{MockHardware, MockNvs, Rig};

fn settings(portion: Option<f32>, water: Option<u16>) -> Inbound {
    Inbound::Settings(SettingsUpdate {
        portion_size: portion,
        water_amount: water,
    })
}

// ── Replies ───────────────────────────────────────────────────

#[test]
fn link_up_registers_then_requests_state() {
    let mut rig = Rig::new(MockHardware::new());
    rig.app.on_link_up(&mut rig.sink);
    let kinds: Vec<&str> = rig
        .sink
        .events
        .iter()
        .map(|e| match e {
            AppEvent::Register(_) => "register",
            AppEvent::GetSettings => "getSettings",
            AppEvent::GetSchedules => "getSchedules",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["register", "getSettings", "getSchedules"]);
}

#[test]
fn unknown_command_gets_error_reply() {
    let mut rig = Rig::new(MockHardware::new());
    rig.command(&CommandRequest::named("dance", CommandSource::Remote));
    let replies = rig.sink.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status, ReplyStatus::Error);
    assert_eq!(replies[0].command.as_str(), "dance");
    assert_eq!(replies[0].message.as_deref(), Some("Unknown command"));
    assert!(!rig.app.is_busy());
    assert!(rig.hw.calls.is_empty());
}

#[test]
fn get_status_answers_without_busy() {
    let mut rig = Rig::new(MockHardware::new());
    rig.command(&CommandRequest::named("get-status", CommandSource::Remote));
    assert!(!rig.app.is_busy());
    assert!(matches!(
        rig.sink.events.first(),
        Some(AppEvent::DeviceStatus(s)) if !s.busy && !s.feeding
    ));
    let replies = rig.sink.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status, ReplyStatus::Completed);
}

#[test]
fn get_status_while_feeding_reports_busy() {
    let mut rig = Rig::new(MockHardware::new());
    rig.command(&CommandRequest::named("feed", CommandSource::Remote));
    rig.sink.clear();
    rig.command(&CommandRequest::named("get-status", CommandSource::Remote));
    assert!(matches!(
        rig.sink.events.first(),
        Some(AppEvent::DeviceStatus(s)) if s.busy && s.feeding && !s.watering
    ));
    assert_eq!(rig.sink.replies()[0].status, ReplyStatus::Completed);
}

#[test]
fn periodic_status_is_emitted() {
    let mut rig = Rig::new(MockHardware::new());
    rig.run_for(11_000);
    let count = rig
        .sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::DeviceStatus(_)))
        .count();
    assert_eq!(count, 2);
}

#[test]
fn busy_is_released_after_each_session() {
    let mut rig = Rig::new(MockHardware::new());
    rig.command(&CommandRequest::named("test-water", CommandSource::Remote));
    assert!(rig.run_until_idle(5_000));
    rig.command(&CommandRequest::named("feed", CommandSource::Remote));
    assert!(rig.app.is_busy());
    assert!(rig.run_until_idle(40_000));
    let statuses: Vec<ReplyStatus> = rig.sink.replies().iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            ReplyStatus::Executing,
            ReplyStatus::Completed,
            ReplyStatus::Executing,
            ReplyStatus::Completed,
        ]
    );
}

// ── Settings ──────────────────────────────────────────────────

#[test]
fn settings_apply_and_auto_save_after_quiet_period() {
    let nvs = MockNvs::new();
    let mut rig = Rig::new(MockHardware::new());
    rig.inbound(settings(Some(30.0), Some(80)));
    assert!(rig.app.is_config_dirty());
    assert_eq!(rig.app.config().default_portion_g, 30.0);
    assert_eq!(rig.app.config().default_water_ml, 80);

    let t0 = rig.hw.now_ms;
    assert!(!rig.app.auto_save_if_needed(t0 + 4_999, &nvs));
    assert_eq!(nvs.saves.get(), 0);
    assert!(rig.app.auto_save_if_needed(t0 + 5_000, &nvs));
    assert!(!rig.app.is_config_dirty());
    assert_eq!(nvs.load().map(|c| c.default_portion_g).ok(), Some(30.0));

    // The next default feed uses the new portion.
    rig.command(&CommandRequest::named("feed", CommandSource::Remote));
    assert!(rig.run_until_idle(40_000));
    let target = rig.sink.events.iter().find_map(|e| match e {
        AppEvent::FeedingComplete(FeedReport { target_g, .. }) => Some(*target_g),
        _ => None,
    });
    assert_eq!(target, Some(30.0));
}

#[test]
fn out_of_range_settings_are_rejected() {
    let mut rig = Rig::new(MockHardware::new());
    rig.inbound(settings(Some(500.0), None));
    assert!(!rig.app.is_config_dirty());
    assert_eq!(
        rig.app.config().default_portion_g,
        FeederConfig::default().default_portion_g
    );
}

#[test]
fn zero_values_leave_settings_untouched() {
    let mut rig = Rig::new(MockHardware::new());
    rig.inbound(settings(Some(0.0), Some(0)));
    assert_eq!(rig.app.config(), &FeederConfig::default());
}

// ── Link adapters ─────────────────────────────────────────────

#[test]
fn json_link_round_trip_through_service() {
    let mut rig = Rig::new(MockHardware::new());
    let mut link = JsonLink::new(MemoryTransport::new());
    link.transport_mut()
        .push_frame(r#"{"eventType":"command","data":{"command":"water","duration":2}}"#);

    while let Some(msg) = link.receive() {
        rig.app
            .handle_inbound(msg, &mut rig.hw, &mut rig.display, &mut link);
    }
    assert!(rig.app.is_busy());
    assert_eq!(
        link.transport_mut().take_frames(),
        vec![r#"{"eventType":"commandResponse","data":{"status":"executing","command":"water"}}"#
            .to_string()]
    );

    // A second command while busy.
    link.transport_mut()
        .push_frame(r#"{"eventType":"command","data":{"command":"feed"}}"#);
    while let Some(msg) = link.receive() {
        rig.app
            .handle_inbound(msg, &mut rig.hw, &mut rig.display, &mut link);
    }
    assert_eq!(
        link.transport_mut().take_frames(),
        vec![r#"{"eventType":"commandResponse","data":{"status":"busy","command":"feed","message":"Device is busy"}}"#
            .to_string()]
    );
}

#[test]
fn json_link_bad_commands_get_error_replies() {
    let mut rig = Rig::new(MockHardware::new());
    let mut link = JsonLink::new(MemoryTransport::new());
    link.transport_mut().push_frame(
        r#"{"eventType":"command","data":{"command":"this-command-name-is-far-too-long"}}"#,
    );
    link.transport_mut()
        .push_frame(r#"{"eventType":"command","data":{"command":"feed","portionSize":"lots"}}"#);
    while let Some(msg) = link.receive() {
        rig.app
            .handle_inbound(msg, &mut rig.hw, &mut rig.display, &mut link);
    }

    let frames = link.transport_mut().take_frames();
    assert_eq!(frames.len(), 2);
    assert!(frames[0].contains(r#""status":"error""#), "{}", frames[0]);
    assert!(frames[0].contains(r#""message":"Unknown command""#), "{}", frames[0]);
    assert_eq!(
        frames[1],
        r#"{"eventType":"commandResponse","data":{"status":"error","command":"feed","message":"Invalid command payload"}}"#
    );
    assert!(!rig.app.is_busy());
    assert!(rig.hw.calls.is_empty());
}

#[test]
fn json_link_schedules_and_settings_reach_service() {
    let mut rig = Rig::new(MockHardware::new());
    let mut link = JsonLink::new(MemoryTransport::new());
    link.transport_mut().push_frame(
        r#"{"eventType":"schedules","data":[{"time":"08:00","enabled":true},{"time":"25:00","enabled":true}]}"#,
    );
    link.transport_mut()
        .push_frame(r#"{"eventType":"settings","data":{"portionSize":40}}"#);
    while let Some(msg) = link.receive() {
        rig.app
            .handle_inbound(msg, &mut rig.hw, &mut rig.display, &mut link);
    }
    assert_eq!(rig.app.schedule().entries().len(), 1);
    assert_eq!(rig.app.config().default_portion_g, 40.0);
}

#[test]
fn cloud_trigger_runs_feed_and_mirrors_state() {
    let mut rig = Rig::new(MockHardware::new());
    let mut cloud = CloudPropsLink::new();
    cloud.props_mut().feed_now = true;
    cloud.props_mut().portion_size = 30;

    let msg = cloud.receive().expect("trigger");
    rig.app
        .handle_inbound(msg, &mut rig.hw, &mut rig.display, &mut cloud);
    assert!(cloud.props().device_busy);

    let mut sinks = (&mut rig.sink, &mut cloud);
    for _ in 0..800 {
        rig.hw.advance(50);
        rig.app
            .tick(None, &mut rig.hw, &mut rig.display, &mut sinks);
        if !rig.app.is_busy() {
            break;
        }
    }
    assert!(!rig.app.is_busy());
    assert!(!cloud.props().device_busy);
    assert!(cloud.props().last_feed_weight >= 30.0 * 0.95);
    assert_eq!(cloud.props().device_status, "feed: done");
}
