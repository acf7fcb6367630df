//! Schedule firing through the service, on local wall-clock time.

use petfeeder::app::commands::{CommandRequest, CommandSource, Inbound, ScheduleWire};
use petfeeder::app::events::{AppEvent, LogKind};
use petfeeder::control::feed::FeedReport;

use crate::mock_hw::{MockHardware, Rig};

const UTC_OFFSET_SECS: u64 = 7 * 3600;
/// Some local midnight.
const LOCAL_MIDNIGHT: u64 = 20_000 * 86_400;

/// Unix seconds for a local time of day (default UTC+7 offset).
fn unix_at(h: u64, m: u64, s: u64) -> u64 {
    LOCAL_MIDNIGHT + h * 3600 + m * 60 + s - UTC_OFFSET_SECS
}

fn schedules(list: &[(&str, bool)]) -> Inbound {
    Inbound::Schedules(
        list.iter()
            .map(|(time, enabled)| ScheduleWire {
                time: (*time).to_string(),
                enabled: *enabled,
            })
            .collect(),
    )
}

fn feeds_started(rig: &Rig) -> usize {
    rig.sink.logs(LogKind::FeedingStart)
}

#[test]
fn fires_once_at_local_time() {
    let mut rig = Rig::new(MockHardware::new());
    rig.set_wall_clock(unix_at(7, 58, 0));
    rig.step(50);
    rig.inbound(schedules(&[("08:00", true)]));
    assert!(rig.app.schedule().armed_due().is_some());

    rig.run_for(115_000);
    assert_eq!(feeds_started(&rig), 0);

    rig.run_for(10_000);
    assert_eq!(feeds_started(&rig), 1);
    assert!(rig.app.is_busy());

    assert!(rig.run_until_idle(40_000));
    let source = rig.sink.events.iter().find_map(|e| match e {
        AppEvent::FeedingComplete(FeedReport { source, .. }) => Some(*source),
        _ => None,
    });
    assert_eq!(source, Some(CommandSource::Schedule));

    // Nothing more for the rest of the hour.
    rig.run_for(120_000);
    assert_eq!(feeds_started(&rig), 1);
    assert_eq!(rig.hw.hatch_opens(), 1);
}

#[test]
fn skipped_while_busy_without_catch_up() {
    let mut rig = Rig::new(MockHardware::new());
    rig.set_wall_clock(unix_at(7, 59, 50));
    rig.step(50);
    rig.inbound(schedules(&[("08:00", true)]));

    let mut req = CommandRequest::named("water", CommandSource::Remote);
    req.duration = Some(15);
    rig.command(&req);
    assert!(rig.app.is_busy());

    rig.run_for(12_000);
    assert_eq!(rig.sink.logs(LogKind::ScheduleSkipped), 1);
    assert_eq!(feeds_started(&rig), 0);

    assert!(rig.run_until_idle(5_000));
    rig.run_for(70_000);
    assert_eq!(feeds_started(&rig), 0);
    assert_eq!(rig.hw.hatch_opens(), 0);
    assert_eq!(rig.sink.logs(LogKind::ScheduleSkipped), 1);
}

#[test]
fn list_before_clock_sync_arms_on_first_poll() {
    let mut rig = Rig::new(MockHardware::new());
    rig.inbound(schedules(&[("08:00", true)]));
    assert_eq!(rig.app.schedule().armed_due(), None);

    rig.run_for(5_000);
    assert_eq!(feeds_started(&rig), 0);

    rig.set_wall_clock(unix_at(7, 59, 0));
    rig.step(50);
    assert!(rig.app.schedule().armed_due().is_some());
    assert_eq!(feeds_started(&rig), 0);

    rig.run_for(65_000);
    assert_eq!(feeds_started(&rig), 1);
}

#[test]
fn disabled_and_invalid_entries_never_fire() {
    let mut rig = Rig::new(MockHardware::new());
    rig.set_wall_clock(unix_at(7, 59, 30));
    rig.step(50);
    rig.inbound(schedules(&[("08:00", false), ("8:0x", true), ("24:00", true)]));
    assert_eq!(rig.app.schedule().armed_due(), None);

    rig.run_for(90_000);
    assert_eq!(feeds_started(&rig), 0);
}

#[test]
fn replacing_the_list_rearms() {
    let mut rig = Rig::new(MockHardware::new());
    rig.set_wall_clock(unix_at(7, 59, 0));
    rig.step(50);
    rig.inbound(schedules(&[("08:00", true)]));
    rig.inbound(schedules(&[("09:00", true)]));

    rig.run_for(90_000);
    assert_eq!(feeds_started(&rig), 0);
    assert_eq!(rig.app.schedule().entries().len(), 1);
}
