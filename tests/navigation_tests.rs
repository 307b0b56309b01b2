use gridrover::core::{CellState, DistanceReading, Grid, Maneuver, ModeRequest, MotionOutcome};
use gridrover::navigation::{MotionTiming, NavOutcome};
use gridrover::sim::{DriveAction, RecordingDrive, ScriptedRanger, SimClock};
use gridrover::{AutoNavigator, GridExplorer, Mode, ModeSwitch, Phase, Position, Scan, Vehicle};
use rstest::rstest;
use std::time::Duration;

use DriveAction::{RotateLeft, RotateRight, Stop};

const FWD: DriveAction = DriveAction::Forward { blocked: false };

fn timing() -> MotionTiming {
    MotionTiming {
        cell: Duration::from_millis(400),
        turn: Duration::from_millis(350),
        poll: Duration::from_millis(20),
    }
}

struct Rig {
    vehicle: Vehicle<RecordingDrive, ScriptedRanger, SimClock>,
    drive: RecordingDrive,
    ranger: ScriptedRanger,
    clock: SimClock,
    switch: ModeSwitch,
}

fn rig() -> Rig {
    let drive = RecordingDrive::new();
    let ranger = ScriptedRanger::default();
    let clock = SimClock::new();
    Rig {
        vehicle: Vehicle::new(drive.clone(), ranger.clone(), clock.clone(), 5.0),
        drive,
        ranger,
        clock,
        switch: ModeSwitch::new(),
    }
}

fn navigator(rows: usize, columns: usize, switch: &ModeSwitch) -> AutoNavigator {
    AutoNavigator::new(rows, columns, timing(), switch.clone()).unwrap()
}

#[test]
fn find_next_accepts_the_start_cell() {
    let explorer = GridExplorer::new(Grid::new(3, 3).unwrap());
    assert_eq!(explorer.find_next(Position::ORIGIN), Scan::Next(Position::ORIGIN));
}

#[test]
fn find_next_skips_visited_cells_across_rows() {
    let mut explorer = GridExplorer::new(Grid::new(3, 3).unwrap());
    for x in 0..3 {
        explorer.mark_visited(Position::new(x, 0));
    }
    assert_eq!(explorer.find_next(Position::new(2, 0)), Scan::Next(Position::new(0, 1)));
}

#[test]
fn find_next_is_exhausted_once_everything_is_visited() {
    let mut explorer = GridExplorer::new(Grid::new(3, 3).unwrap());
    for y in 0..3 {
        for x in 0..3 {
            assert!(explorer.mark_visited(Position::new(x, y)));
        }
    }
    assert_eq!(explorer.find_next(Position::ORIGIN), Scan::Exhausted);
    assert_eq!(explorer.find_next(Position::ORIGIN).target(), None);
}

#[test]
fn find_next_halts_at_a_blocked_cell() {
    let mut explorer = GridExplorer::new(Grid::new(3, 3).unwrap());
    explorer.mark_visited(Position::new(0, 0));
    explorer.mark_blocked(Position::new(1, 0));

    // (2, 0) is still unvisited but lies past the blocked cell.
    assert_eq!(explorer.find_next(Position::ORIGIN), Scan::Blocked(Position::new(1, 0)));
    assert_eq!(explorer.find_next(Position::new(2, 0)), Scan::Next(Position::new(2, 0)));
}

#[rstest]
#[case(1, 1)]
#[case(1, 4)]
#[case(4, 1)]
#[case(3, 5)]
fn find_next_reaches_the_last_row_and_column(#[case] rows: usize, #[case] columns: usize) {
    let mut explorer = GridExplorer::new(Grid::new(rows, columns).unwrap());
    let last = Position::new(columns - 1, rows - 1);
    for y in 0..rows {
        for x in 0..columns {
            if Position::new(x, y) != last {
                explorer.mark_visited(Position::new(x, y));
            }
        }
    }
    assert_eq!(explorer.find_next(Position::ORIGIN), Scan::Next(last));
    explorer.mark_visited(last);
    assert_eq!(explorer.find_next(last), Scan::Exhausted);
}

#[test]
fn navigate_runs_x_leg_then_y_leg() {
    let mut rig = rig();
    let mut nav = navigator(3, 3, &rig.switch);

    let outcome = nav.navigate(&mut rig.vehicle, Position::new(2, 1)).unwrap();

    assert_eq!(outcome, NavOutcome::Arrived);
    assert_eq!(
        rig.drive.actions(),
        vec![FWD, Stop, FWD, Stop, RotateLeft, Stop, FWD, Stop, RotateRight, Stop]
    );
    assert_eq!(nav.position(), Position::new(2, 1));
    assert_eq!((nav.heading().x(), nav.heading().y()), (1, 1));
}

#[test]
fn navigate_reverses_with_two_left_turns() {
    let mut rig = rig();
    let mut nav = navigator(3, 3, &rig.switch);
    nav.navigate(&mut rig.vehicle, Position::new(2, 0)).unwrap();
    assert_eq!(rig.drive.actions(), vec![FWD, Stop, FWD, Stop, RotateRight, Stop]);
    rig.drive.clear();

    nav.navigate(&mut rig.vehicle, Position::new(0, 1)).unwrap();

    assert_eq!(
        rig.drive.actions(),
        vec![
            RotateLeft, Stop, RotateLeft, Stop, FWD, Stop, FWD, Stop, RotateRight, Stop, FWD,
            Stop, RotateLeft, Stop,
        ]
    );
    assert_eq!(nav.position(), Position::new(0, 1));
    assert_eq!((nav.heading().x(), nav.heading().y()), (-1, 1));
}

#[test]
fn navigate_rejects_targets_outside_the_grid() {
    let mut rig = rig();
    let mut nav = navigator(2, 2, &rig.switch);
    assert!(nav.navigate(&mut rig.vehicle, Position::new(2, 0)).is_err());
    assert!(rig.drive.actions().is_empty());
}

#[rstest]
#[case(1, 1)]
#[case(3, 3)]
#[case(2, 4)]
#[case(4, 2)]
fn exploration_visits_every_cell_once_and_returns_home(
    #[case] rows: usize,
    #[case] columns: usize,
) {
    let mut rig = rig();
    let mut nav = navigator(rows, columns, &rig.switch);
    assert_eq!(nav.remaining(), rows * columns);

    let mut visited_order = Vec::new();
    while nav.phase() != Phase::Idle {
        if let Phase::Navigating(target) = nav.step(&mut rig.vehicle).unwrap() {
            visited_order.push(target);
        }
    }

    let expected: Vec<_> = (0..rows)
        .flat_map(|y| (0..columns).map(move |x| Position::new(x, y)))
        .collect();
    assert_eq!(visited_order, expected);
    assert_eq!(nav.remaining(), 0);
    assert_eq!(nav.explorer().grid().count(CellState::Visited), rows * columns);
    assert_eq!(nav.position(), Position::ORIGIN);
    assert!(!nav.dead_reckoning().is_confirmed());
    assert!(!nav.dead_reckoning().drift_suspected());
}

#[test]
fn obstacle_on_a_step_blocks_the_cell_and_ends_exploration() {
    let mut rig = rig();
    let mut nav = navigator(3, 3, &rig.switch);
    rig.ranger.push([DistanceReading::Centimeters(3.0)]);

    let phase = nav.explore(&mut rig.vehicle).unwrap();

    assert_eq!(phase, Phase::Idle);
    assert_eq!(nav.explorer().grid().state(Position::new(1, 0)), Some(CellState::Blocked));
    assert_eq!(nav.remaining(), 8);
    assert_eq!(nav.position(), Position::ORIGIN);
    assert!(nav.dead_reckoning().drift_suspected());
    assert!(rig.drive.actions().contains(&DriveAction::Forward { blocked: true }));
}

#[test]
fn timed_forward_aborts_early_on_a_close_reading() {
    let mut rig = rig();
    rig.ranger.push([
        DistanceReading::NoEcho,
        DistanceReading::Centimeters(40.0),
        DistanceReading::Centimeters(2.0),
    ]);

    let outcome = rig.vehicle.timed(
        Maneuver::Forward,
        Duration::from_millis(400),
        Duration::from_millis(20),
        &rig.switch,
        Mode::Automatic,
    );

    assert_eq!(outcome, MotionOutcome::Obstructed);
    assert_eq!(rig.drive.actions(), vec![FWD, Stop]);
    assert_eq!(rig.clock.elapsed(), Duration::from_millis(40));
}

#[test]
fn timed_motion_is_bounded_by_its_duration() {
    let mut rig = rig();
    let outcome = rig.vehicle.timed(
        Maneuver::Forward,
        Duration::from_millis(410),
        Duration::from_millis(100),
        &rig.switch,
        Mode::Automatic,
    );

    assert_eq!(outcome, MotionOutcome::Completed);
    assert_eq!(rig.clock.elapsed(), Duration::from_millis(410));
    assert_eq!(rig.ranger.measurements(), 6);
}

#[test]
fn rotation_ignores_the_rangefinder() {
    let mut rig = rig();
    rig.ranger.set_fallback(DistanceReading::Centimeters(1.0));
    let outcome = rig.vehicle.timed(
        Maneuver::RotateLeft,
        Duration::from_millis(350),
        Duration::from_millis(20),
        &rig.switch,
        Mode::Automatic,
    );
    assert_eq!(outcome, MotionOutcome::Completed);
    assert_eq!(rig.ranger.measurements(), 0);
}

#[test]
fn pending_mode_request_interrupts_navigation() {
    let mut rig = rig();
    let mut nav = navigator(3, 3, &rig.switch);
    rig.switch.request(ModeRequest::Manual);

    let outcome = nav.navigate(&mut rig.vehicle, Position::new(2, 2)).unwrap();

    assert_eq!(outcome, NavOutcome::Interrupted);
    assert_eq!(rig.drive.actions(), vec![Stop]);
    assert_eq!(nav.position(), Position::ORIGIN);
    assert_eq!(nav.explore(&mut rig.vehicle).unwrap(), Phase::Searching);
}

#[test]
fn request_for_the_running_mode_does_not_cut_a_step_short() {
    let mut rig = rig();
    rig.switch.request(ModeRequest::Automatic);

    let outcome = rig.vehicle.timed(
        Maneuver::Forward,
        Duration::from_millis(400),
        Duration::from_millis(20),
        &rig.switch,
        Mode::Automatic,
    );

    assert_eq!(outcome, MotionOutcome::Completed);
    assert_eq!(rig.drive.actions(), vec![FWD, Stop]);
    assert_eq!(rig.clock.elapsed(), Duration::from_millis(400));
    assert_eq!(rig.switch.pending(), Some(ModeRequest::Automatic));
}
