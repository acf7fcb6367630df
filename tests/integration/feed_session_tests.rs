//! Feed sessions end to end: FeederService → FeedController → mock scale
//! and hatch, stepped on a simulated clock.

use petfeeder::app::commands::{CommandRequest, CommandSource};
use petfeeder::app::events::{AppEvent, ReplyStatus};
use petfeeder::app::ports::{ActuatorPort, HatchPosition};
use petfeeder::control::feed::{FeedOutcome, FeedPhase, FeedQuality, FeedReport};

use crate::mock_hw::{ActuatorCall, MockHardware, Rig};

fn feed(portion: Option<f32>) -> CommandRequest {
    let mut req = CommandRequest::named("feed", CommandSource::Remote);
    req.portion_size = portion;
    req
}

fn report(rig: &Rig) -> FeedReport {
    rig.sink
        .events
        .iter()
        .find_map(|e| match e {
            AppEvent::FeedingComplete(r) => Some(*r),
            _ => None,
        })
        .expect("no feeding-complete event")
}

fn statuses(rig: &Rig) -> Vec<ReplyStatus> {
    rig.sink.replies().iter().map(|r| r.status).collect()
}

// ── Normal dispensing ─────────────────────────────────────────

#[test]
fn default_portion_reaches_target() {
    let mut rig = Rig::new(MockHardware::new());
    rig.command(&feed(None));
    assert!(rig.app.is_busy());
    assert_eq!(rig.hw.hatch(), HatchPosition::Open);

    assert!(rig.run_until_idle(40_000));

    let r = report(&rig);
    assert_eq!(r.outcome, FeedOutcome::OnTarget);
    assert_eq!(r.target_g, 65.0);
    assert_eq!(r.retries, 0);
    assert!(r.dispensed_g >= 65.0 * 0.95, "dispensed {}", r.dispensed_g);
    assert!(r.dispensed_g < 65.0 * 1.25, "dispensed {}", r.dispensed_g);
    assert_eq!(r.source, CommandSource::Remote);
    assert_eq!(rig.hw.hatch(), HatchPosition::Closed);
    assert_eq!(rig.hw.hatch_opens(), 1);
    assert!(rig.display.showed("Almost there..."));

    assert_eq!(statuses(&rig), vec![ReplyStatus::Executing, ReplyStatus::Completed]);
    let done = rig.sink.replies()[1];
    assert_eq!(done.dispensed, Some(r.dispensed_g));
    assert!(done.food_level.is_some());
    assert!(done.water_level.is_some());
}

#[test]
fn food_level_follows_last_feed() {
    let mut rig = Rig::new(MockHardware::new());
    rig.command(&feed(Some(40.0)));
    assert!(rig.run_until_idle(40_000));
    let r = report(&rig);
    let expected = (200.0 - r.dispensed_g) / 200.0 * 100.0;
    assert!((rig.app.context().food_level() - expected).abs() < 1e-3);
    assert_eq!(rig.app.context().last_feed_weight(), Some(r.dispensed_g));
}

#[test]
fn sudden_jump_below_excess_goes_through_pre_close() {
    // W0 = 0, then 70 g lands in one poll. 70 < 65 × 1.25.
    let mut rig = Rig::new(MockHardware::with_script(&[0.0, 0.0, 0.0, 0.0, 0.0, 70.0]));
    rig.command(&feed(Some(65.0)));
    assert!(rig.run_until_idle(40_000));

    let r = report(&rig);
    assert_eq!(r.outcome, FeedOutcome::OnTarget);
    assert!((r.dispensed_g - 70.0).abs() < 1e-3);
    assert_eq!(r.quality, FeedQuality::Ok);
    assert!(rig.display.showed("Almost there..."));
    assert!(!rig.display.showed("Warning!"));
}

#[test]
fn sudden_jump_over_excess_force_closes() {
    // Same jump against a 50 g portion: 70 ≥ 62.5.
    let mut rig = Rig::new(MockHardware::with_script(&[0.0, 0.0, 0.0, 0.0, 0.0, 70.0]));
    rig.command(&feed(Some(50.0)));
    assert!(rig.run_until_idle(40_000));

    let r = report(&rig);
    assert_eq!(r.outcome, FeedOutcome::Excess);
    assert_eq!(r.quality, FeedQuality::Over);
    assert!(rig.display.showed("Warning!"));
    assert!(!rig.display.showed("Almost there..."));
    assert_eq!(rig.hw.hatch(), HatchPosition::Closed);
    // Excess still counts as a completed feed.
    assert_eq!(statuses(&rig), vec![ReplyStatus::Executing, ReplyStatus::Completed]);
}

// ── Shortfall and timeout ─────────────────────────────────────

#[test]
fn empty_hopper_retries_then_reports_shortfall() {
    // Only 60 g left in the hopper; 65 × 0.95 = 61.75 is never reached.
    let mut rig = Rig::new(MockHardware::with_flow(0.0, 60.0, 20.0, 300));
    rig.command(&feed(None));
    assert!(rig.run_until_idle(40_000));

    let r = report(&rig);
    assert_eq!(r.outcome, FeedOutcome::Shortfall);
    assert_eq!(r.retries, 2);
    assert!((r.dispensed_g - 60.0).abs() < 1.0, "dispensed {}", r.dispensed_g);
    assert_eq!(rig.hw.hatch_opens(), 3);
    assert_eq!(rig.hw.hatch(), HatchPosition::Closed);
    assert!(rig.display.showed("Need more food"));
}

#[test]
fn jammed_hatch_times_out() {
    let mut rig = Rig::new(MockHardware::with_flow(0.0, 0.0, 20.0, 300));
    rig.command(&feed(None));
    let opened_at = rig.hw.now_ms;

    rig.run_for(29_000);
    assert!(rig.app.is_busy());
    assert!(matches!(
        rig.app.feed_controller().phase(),
        FeedPhase::OpenDispense { .. }
    ));

    assert!(rig.run_until_idle(10_000));
    let r = report(&rig);
    assert_eq!(r.outcome, FeedOutcome::Timeout);
    assert_eq!(r.dispensed_g, 0.0);
    assert!(rig.hw.now_ms - opened_at >= 30_000);
    assert_eq!(rig.hw.hatch(), HatchPosition::Closed);
}

// ── Existing food prompt ──────────────────────────────────────

#[test]
fn existing_food_prompt_expires_and_cancels() {
    let mut rig = Rig::new(MockHardware::with_flow(60.0, 1_000.0, 20.0, 300));
    rig.command(&feed(None));
    assert!(rig.app.feed_controller().awaiting_confirmation());

    rig.run_for(19_000);
    assert!(rig.app.is_busy());
    assert_eq!(rig.hw.hatch_opens(), 0);

    assert!(rig.run_until_idle(3_000));
    let r = report(&rig);
    assert_eq!(r.outcome, FeedOutcome::Cancelled);
    assert_eq!(r.dispensed_g, 0.0);
    assert_eq!(rig.hw.hatch_opens(), 0);

    let replies = rig.sink.replies();
    assert_eq!(replies.last().map(|r| r.status), Some(ReplyStatus::Failed));
    assert_eq!(
        replies.last().and_then(|r| r.message.as_deref()),
        Some("cancelled")
    );
}

#[test]
fn button_confirms_existing_food_prompt() {
    let mut rig = Rig::new(MockHardware::with_flow(60.0, 1_000.0, 20.0, 300));
    rig.command(&feed(None));
    rig.run_for(2_000);
    assert!(rig.app.feed_controller().awaiting_confirmation());

    rig.button();
    assert_eq!(rig.hw.hatch(), HatchPosition::Open);
    // The press continued the session; it did not queue a second feed.
    assert_eq!(rig.sink.replies().len(), 1);

    assert!(rig.run_until_idle(40_000));
    let r = report(&rig);
    assert_eq!(r.outcome, FeedOutcome::OnTarget);
    assert!((r.initial_g - 60.0).abs() < 1e-3);
    assert!(r.final_g >= 60.0 + 65.0 * 0.95);
}

#[test]
fn button_when_idle_starts_button_feed() {
    let mut rig = Rig::new(MockHardware::new());
    rig.button();
    assert!(rig.app.is_busy());
    assert!(rig.run_until_idle(40_000));
    assert_eq!(report(&rig).source, CommandSource::Button);
}

// ── Sensor faults ─────────────────────────────────────────────

#[test]
fn scale_not_ready_fails_without_actuation() {
    let mut hw = MockHardware::new();
    hw.scale_ready = false;
    let mut rig = Rig::new(hw);
    rig.command(&feed(None));

    assert!(!rig.app.is_busy());
    assert!(rig.hw.calls.is_empty());
    assert_eq!(report(&rig).outcome, FeedOutcome::SensorFault);
    assert_eq!(statuses(&rig), vec![ReplyStatus::Executing, ReplyStatus::Failed]);
    assert!(rig.display.showed("Error"));
}

#[test]
fn scale_lost_mid_session_closes_hatch() {
    let mut rig = Rig::new(MockHardware::new());
    rig.command(&feed(None));
    rig.run_for(1_500);
    assert_eq!(rig.hw.hatch(), HatchPosition::Open);

    rig.hw.scale_ready = false;
    assert!(rig.run_until_idle(10_000));

    let r = report(&rig);
    assert_eq!(r.outcome, FeedOutcome::SensorFault);
    assert_eq!(rig.hw.hatch(), HatchPosition::Closed);
    assert_eq!(
        rig.hw
            .calls
            .iter()
            .rev()
            .find(|c| matches!(c, ActuatorCall::SetHatch(_))),
        Some(&ActuatorCall::SetHatch(HatchPosition::Closed))
    );
    assert_eq!(statuses(&rig).last(), Some(&ReplyStatus::Failed));
}

// ── Busy gating ───────────────────────────────────────────────

#[test]
fn commands_during_feed_are_rejected_busy() {
    let mut rig = Rig::new(MockHardware::new());
    rig.command(&feed(None));
    rig.run_for(1_000);

    let calls_before = rig.hw.calls.len();
    let retries_before = rig.app.feed_controller().retries();
    let phase_before = rig.app.feed_controller().phase();
    rig.sink.clear();

    rig.command(&feed(Some(30.0)));
    rig.command(&CommandRequest::named("water", CommandSource::Remote));

    let replies = rig.sink.replies();
    assert_eq!(replies.len(), 2);
    assert!(replies.iter().all(|r| r.status == ReplyStatus::Busy));
    assert_eq!(replies[0].command.as_str(), "feed");
    assert_eq!(replies[1].command.as_str(), "water");
    assert_eq!(replies[0].message.as_deref(), Some("Device is busy"));

    assert_eq!(rig.hw.calls.len(), calls_before);
    assert_eq!(rig.app.feed_controller().retries(), retries_before);
    assert_eq!(rig.app.feed_controller().phase(), phase_before);
    assert!(!rig.hw.pump_on());
}

#[test]
fn shutdown_mid_feed_leaves_everything_off() {
    let mut rig = Rig::new(MockHardware::new());
    rig.command(&feed(None));
    rig.run_for(1_000);
    rig.app.shutdown(&mut rig.hw);
    assert!(!rig.app.is_busy());
    assert_eq!(rig.hw.last_call(), Some(&ActuatorCall::AllOff));
    assert_eq!(rig.hw.hatch(), HatchPosition::Closed);
    assert_eq!(rig.app.feed_controller().phase(), FeedPhase::Idle);
}
