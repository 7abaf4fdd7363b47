//! End-to-end session tests: level start analysis, auto-solve playback and
//! manual interruption, driven on a paused clock with a scripted oracle.

mod common;

use common::{solvable, unsolvable, Scripted, ScriptedOracle};
use sokolink::{
    AutoPlayStop, ClientConfig, Direction, Level, PlayerInput, Session, SessionNotice,
    SolvabilityStatus,
};
use std::sync::Arc;
use std::time::Duration;

const CORRIDOR: &str = "#######\n#@ $ .#\n#######";

fn session(script: Vec<Scripted>) -> (Session, ScriptedOracle) {
    let oracle = ScriptedOracle::new(script);
    let level = Level::parse(CORRIDOR).unwrap().with_name("Corridor");
    let session = Session::new(ClientConfig::for_testing(), level, Arc::new(oracle.clone()), 7);
    (session, oracle)
}

/// Handles the next event; panics if nothing arrives within a minute.
async fn step(session: &mut Session) -> Vec<SessionNotice> {
    let event = tokio::time::timeout(Duration::from_secs(60), session.next_event())
        .await
        .expect("an event should arrive")
        .expect("channels open");
    session.handle_event(event)
}

/// Steps until a notice matches, collecting everything seen.
async fn step_until(
    session: &mut Session,
    done: impl Fn(&SessionNotice) -> bool,
) -> Vec<SessionNotice> {
    let mut seen = Vec::new();
    loop {
        let notices = step(session).await;
        let finished = notices.iter().any(&done);
        seen.extend(notices);
        if finished {
            return seen;
        }
    }
}

fn is_status(notice: &SessionNotice) -> bool {
    matches!(
        notice,
        SessionNotice::Status(status) if !matches!(status, SolvabilityStatus::Checking { .. })
    )
}

#[tokio::test(start_paused = true)]
async fn test_level_start_runs_deep_analysis() {
    let plan = [Direction::Right; 3];
    let (mut session, oracle) = session(vec![Scripted::after_ms(30, solvable(&plan))]);

    let notices = session.start();
    assert!(notices.contains(&SessionNotice::LevelLoaded {
        name: Some("Corridor".to_string())
    }));
    assert!(notices.contains(&SessionNotice::BoardChanged));

    step_until(&mut session, is_status).await;
    assert!(matches!(
        session.status(),
        SolvabilityStatus::Solvable {
            plan_len: Some(3),
            ..
        }
    ));

    let requests = oracle.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].deep);
}

#[tokio::test(start_paused = true)]
async fn test_autosolve_plays_cached_plan_without_querying() {
    let plan = [Direction::Right; 3];
    let (mut session, oracle) = session(vec![Scripted::after_ms(30, solvable(&plan))]);

    session.start();
    step_until(&mut session, is_status).await;
    assert_eq!(oracle.call_count(), 1);

    let notices = session.handle_input(PlayerInput::ToggleAutoSolve);
    assert_eq!(notices, vec![SessionNotice::AutoSolveStarted { moves: 3 }]);
    assert!(session.autoplay().is_playing());

    let seen = step_until(&mut session, |notice| {
        matches!(notice, SessionNotice::Solved { .. })
    })
    .await;

    assert!(seen.contains(&SessionNotice::AutoSolveStopped(AutoPlayStop::Solved)));
    assert!(seen.contains(&SessionNotice::Won { moves: 3 }));
    assert!(session.is_won());
    assert_eq!(session.puzzle().move_count(), 3);
    assert_eq!(oracle.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_autosolve_asks_in_auto_mode_when_nothing_cached() {
    let plan = [Direction::Right; 3];
    let (mut session, oracle) = session(vec![
        Scripted::after_ms(10, unsolvable("not within horizon")),
        Scripted::after_ms(50, solvable(&plan)),
    ]);

    session.start();
    step_until(&mut session, is_status).await;

    let notices = session.handle_input(PlayerInput::ToggleAutoSolve);
    assert!(matches!(notices.as_slice(), [SessionNotice::Message(_)]));
    assert!(session.autoplay().is_active());

    step_until(&mut session, |notice| {
        matches!(notice, SessionNotice::AutoSolveStarted { .. })
    })
    .await;
    step_until(&mut session, |notice| {
        matches!(notice, SessionNotice::Solved { .. })
    })
    .await;

    let requests = oracle.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].auto);
    assert_eq!(session.puzzle().move_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_manual_move_interrupts_autosolve() {
    let plan = [Direction::Right; 3];
    let (mut session, oracle) = session(vec![Scripted::after_ms(10, solvable(&plan))]);

    session.start();
    step_until(&mut session, is_status).await;
    session.handle_input(PlayerInput::ToggleAutoSolve);

    // One scripted move, then the player takes over.
    step_until(&mut session, |notice| *notice == SessionNotice::BoardChanged).await;
    assert_eq!(session.puzzle().move_count(), 1);

    let notices = session.handle_input(PlayerInput::Move(Direction::Left));
    assert!(notices.contains(&SessionNotice::AutoSolveStopped(AutoPlayStop::Interrupted)));
    assert!(!session.autoplay().is_active());
    assert_eq!(session.puzzle().move_count(), 2);

    // The manual move is analysed once the explore debounce passes.
    step_until(&mut session, is_status).await;
    assert_eq!(oracle.call_count(), 2);
    assert!(!session.is_won());
}

#[tokio::test(start_paused = true)]
async fn test_undo_after_win_allows_play_again() {
    let (mut session, _oracle) = session(vec![]);
    session.start();

    for _ in 0..3 {
        session.handle_input(PlayerInput::Move(Direction::Right));
    }
    assert!(session.is_won());
    assert!(session
        .handle_input(PlayerInput::Move(Direction::Left))
        .is_empty());

    let notices = session.handle_input(PlayerInput::Undo);
    assert!(notices.contains(&SessionNotice::BoardChanged));
    assert!(!session.is_won());
    assert_eq!(session.puzzle().move_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_move_reports_direction() {
    let (mut session, oracle) = session(vec![]);
    session.start();

    let notices = session.handle_input(PlayerInput::Move(Direction::Up));
    assert_eq!(
        notices,
        vec![SessionNotice::Blocked {
            direction: Direction::Up
        }]
    );
    assert_eq!(session.puzzle().move_count(), 0);

    step_until(&mut session, is_status).await;
    assert_eq!(oracle.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_mode_toggle_rechecks_in_new_mode() {
    let (mut session, oracle) = session(vec![]);
    session.start();
    step_until(&mut session, is_status).await;

    let notices = session.handle_input(PlayerInput::ToggleMode);
    assert!(notices.contains(&SessionNotice::ModeChanged(sokolink::QueryMode::Auto)));
    step_until(&mut session, is_status).await;

    let requests = oracle.requests();
    assert_eq!(requests.len(), 2);
    assert!(!requests[0].auto);
    assert!(requests[1].auto);
}

#[tokio::test(start_paused = true)]
async fn test_solved_reveal_dropped_after_undo() {
    let (mut session, _oracle) = session(vec![]);
    session.start();

    for _ in 0..3 {
        session.handle_input(PlayerInput::Move(Direction::Right));
    }
    assert!(session.is_won());

    // Let the reveal timer post its event before the undo.
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.handle_input(PlayerInput::Undo);
    assert!(!session.is_won());

    let seen = step_until(&mut session, is_status).await;
    assert!(
        !seen
            .iter()
            .any(|notice| matches!(notice, SessionNotice::Solved { .. })),
        "unexpected notices {:?}",
        seen
    );
    assert_eq!(session.puzzle().move_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_queued_tick_ignored_after_restart() {
    let plan = [Direction::Right; 3];
    let (mut session, _oracle) = session(vec![Scripted::after_ms(10, solvable(&plan))]);

    session.start();
    step_until(&mut session, is_status).await;
    session.handle_input(PlayerInput::ToggleAutoSolve);

    // The first tick is queued but not handled when playback stops.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let stopped = session.handle_input(PlayerInput::ToggleAutoSolve);
    assert!(stopped.contains(&SessionNotice::AutoSolveStopped(AutoPlayStop::Interrupted)));

    let restarted = session.handle_input(PlayerInput::ToggleAutoSolve);
    assert_eq!(restarted, vec![SessionNotice::AutoSolveStarted { moves: 3 }]);

    assert!(step(&mut session).await.is_empty());
    assert_eq!(session.puzzle().move_count(), 0);

    step_until(&mut session, |notice| {
        matches!(notice, SessionNotice::Solved { .. })
    })
    .await;
    assert_eq!(session.puzzle().move_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_desync_stops_autosolve_and_rechecks() {
    let plan = [Direction::Up, Direction::Right, Direction::Right];
    let (mut session, oracle) = session(vec![Scripted::after_ms(10, solvable(&plan))]);

    session.start();
    step_until(&mut session, is_status).await;
    assert_eq!(oracle.call_count(), 1);

    let notices = session.handle_input(PlayerInput::ToggleAutoSolve);
    assert_eq!(notices, vec![SessionNotice::AutoSolveStarted { moves: 3 }]);

    let seen = step_until(&mut session, |notice| {
        matches!(notice, SessionNotice::AutoSolveStopped(_))
    })
    .await;
    assert!(seen.contains(&SessionNotice::AutoSolveStopped(AutoPlayStop::Desync {
        step: 1,
        direction: Direction::Up,
    })));
    assert!(!session.autoplay().is_active());
    assert_eq!(session.puzzle().move_count(), 0);

    step_until(&mut session, is_status).await;
    let requests = oracle.requests();
    assert_eq!(requests.len(), 2);
    assert!(!requests[1].deep);
}
