//! Water maintenance and manual watering through the service.

use petfeeder::app::commands::{CommandRequest, CommandSource};
use petfeeder::app::events::{AppEvent, LogKind, ReplyStatus, WaterCondition};
use petfeeder::app::ports::ActuatorPort;
use petfeeder::control::water::WaterPhase;

use crate::mock_hw::{MockHardware, Rig};

fn water(amount: Option<u16>, secs: Option<u16>) -> CommandRequest {
    let mut req = CommandRequest::named("water", CommandSource::Remote);
    req.water_amount = amount;
    req.duration = secs;
    req
}

/// 1.0 cm of water above the empty mark (empty at 19 cm, critical at 2 cm).
fn low_water_rig() -> Rig {
    let mut hw = MockHardware::new();
    hw.distance_cm = Some(18.0);
    Rig::new(hw)
}

// ── Passive refill cycle ──────────────────────────────────────

#[test]
fn low_level_refills_once_then_cools_down() {
    let mut rig = low_water_rig();
    rig.step(50);
    assert!(rig.hw.pump_on());
    assert_eq!(rig.app.water_controller().phase(), WaterPhase::RefillRunning);
    assert_eq!(rig.sink.logs(LogKind::WaterLow), 1);
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::WaterStatus(s) if s.status == WaterCondition::Refilling
    )));

    rig.run_for(9_000);
    assert!(rig.hw.pump_on());

    rig.run_for(2_000);
    assert!(!rig.hw.pump_on());
    assert_eq!(rig.app.water_controller().phase(), WaterPhase::Cooldown);
    assert_eq!(rig.sink.logs(LogKind::WaterRefilled), 1);

    // Level still reads low, but nothing re-triggers during cooldown.
    rig.run_for(280_000);
    assert_eq!(rig.hw.pump_starts(), 1);
    assert!(!rig.hw.pump_on());
    assert_eq!(rig.sink.logs(LogKind::WaterReady), 0);
}

#[test]
fn cooldown_ends_and_checks_resume() {
    let mut rig = low_water_rig();
    rig.step(50);
    rig.run_for(10_000 + 300_000 + 500);
    assert_eq!(rig.sink.logs(LogKind::WaterReady), 1);
    // Still low after cooldown, so the next check starts a second refill.
    assert_eq!(rig.hw.pump_starts(), 2);
    assert_eq!(rig.app.water_controller().phase(), WaterPhase::RefillRunning);
}

#[test]
fn healthy_level_leaves_pump_off() {
    let mut rig = Rig::new(MockHardware::new());
    rig.run_for(30_000);
    assert_eq!(rig.hw.pump_starts(), 0);
    assert_eq!(rig.app.water_controller().phase(), WaterPhase::CheckWater);
    assert_eq!(rig.app.context().water_level(), 100.0);
}

#[test]
fn out_of_range_reading_logs_sensor_error() {
    let mut hw = MockHardware::new();
    hw.distance_cm = Some(150.0);
    let mut rig = Rig::new(hw);
    rig.step(50);
    assert_eq!(rig.sink.logs(LogKind::SensorError), 1);
    assert!(!rig.hw.pump_on());
    assert_eq!(rig.app.water_controller().phase(), WaterPhase::CheckWater);

    rig.hw.distance_cm = None;
    rig.run_for(10_000);
    assert_eq!(rig.sink.logs(LogKind::SensorError), 2);
    assert_eq!(rig.hw.pump_starts(), 0);
}

#[test]
fn passive_check_waits_while_busy() {
    let mut hw = MockHardware::with_flow(60.0, 1_000.0, 20.0, 300);
    hw.distance_cm = Some(18.0);
    let mut rig = Rig::new(hw);
    // Existing food prompt holds the busy flag for 20 s.
    rig.command(&CommandRequest::named("feed", CommandSource::Remote));
    rig.run_for(15_000);
    assert!(rig.app.is_busy());
    assert_eq!(rig.hw.pump_starts(), 0);

    assert!(rig.run_until_idle(10_000));
    rig.step(50);
    assert!(rig.hw.pump_on());
}

// ── Manual watering ───────────────────────────────────────────

#[test]
fn manual_water_runs_for_volume_and_replies() {
    let mut rig = Rig::new(MockHardware::new());
    rig.step(50);
    rig.sink.clear();

    rig.command(&water(Some(100), None));
    assert!(rig.app.is_busy());
    assert!(rig.hw.pump_on());
    let started = rig.hw.now_ms;

    rig.run_for(4_500);
    assert!(rig.hw.pump_on());

    assert!(rig.run_until_idle(2_000));
    assert!(!rig.hw.pump_on());
    assert!(rig.hw.now_ms - started >= 5_000);

    let replies = rig.sink.replies();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].status, ReplyStatus::Executing);
    assert_eq!(replies[1].status, ReplyStatus::Completed);
    assert_eq!(replies[1].command.as_str(), "water");
    assert_eq!(replies[1].water_level, Some(100.0));
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::WaterStatus(s) if s.status == WaterCondition::Ok
    )));
}

#[test]
fn explicit_duration_is_capped() {
    let mut rig = Rig::new(MockHardware::new());
    rig.command(&water(Some(10), Some(60)));
    rig.run_for(14_500);
    assert!(rig.hw.pump_on());
    assert!(rig.run_until_idle(1_000));
    assert!(!rig.hw.pump_on());
}

#[test]
fn test_water_pulses_pump() {
    let mut rig = Rig::new(MockHardware::new());
    rig.command(&CommandRequest::named("test-water", CommandSource::Remote));
    assert!(rig.hw.pump_on());
    assert!(rig.run_until_idle(3_000));
    assert!(!rig.hw.pump_on());
    let replies = rig.sink.replies();
    assert_eq!(replies.last().map(|r| r.command.as_str()), Some("test-water"));
    assert_eq!(replies.last().map(|r| r.status), Some(ReplyStatus::Completed));
}

#[test]
fn unreadable_level_after_manual_run_still_completes() {
    let mut hw = MockHardware::new();
    hw.distance_cm = None;
    let mut rig = Rig::new(hw);
    rig.command(&water(None, Some(1)));
    assert!(rig.run_until_idle(3_000));
    let last = *rig.sink.replies().last().expect("reply");
    assert_eq!(last.status, ReplyStatus::Completed);
    assert_eq!(last.message.as_deref(), Some("Water level unreadable"));
}

#[test]
fn manual_end_keeps_pump_on_while_refill_runs() {
    let mut rig = low_water_rig();
    rig.step(50);
    assert_eq!(rig.app.water_controller().phase(), WaterPhase::RefillRunning);

    // Passive refill is not a session; the gateway accepts a manual run.
    rig.command(&water(Some(20), None));
    assert!(rig.app.is_busy());

    assert!(rig.run_until_idle(2_000));
    assert!(rig.hw.pump_on(), "refill demand must hold the pump");
    assert_eq!(rig.app.water_controller().phase(), WaterPhase::RefillRunning);

    rig.run_for(10_000);
    assert!(!rig.hw.pump_on());
    assert_eq!(rig.hw.pump_starts(), 1);
}
