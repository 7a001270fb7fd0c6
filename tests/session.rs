mod common;

use common::*;
use serde_json::json;
use steptrace::error::Error;
use steptrace::proto::{Language, StepKind};
use steptrace::session::{Session, SessionState, StepOutcome};
use steptrace::view::ConsoleKind;

fn idle_session(script: Vec<(&'static str, Canned)>) -> Session<MockTransport, RecordingView> {
    let mut session = Session::new(
        MockTransport::new(script),
        RecordingView::default(),
        Language::C,
    );
    session.start();
    session
}

#[tokio::test(start_paused = true)]
async fn test_compile_enters_debug_and_builds_listing() {
    let session = debug_session(vec![]).await;

    // line 0 is the `.text` annotation, instructions map to lines 1 and 2
    assert_eq!(session.listing().line_for(0x1000), Some(1));
    assert_eq!(session.listing().line_for(0x1004), Some(2));
    assert_eq!(session.listing().lines()[0].text, "<.text>");
    assert_eq!(session.listing().lines()[0].pc, None);

    let view = session.view();
    assert_eq!(view.count(|e| matches!(e, Event::LoadListing(3))), 1);
    assert!(view.events.contains(&Event::State(SessionState::Debug)));
    session.transport().assert_drained();
}

#[tokio::test(start_paused = true)]
async fn test_compile_waits_out_not_ready_answers() {
    let mut script = vec![("/compile/", compile_ack("sess-1"))];
    for _ in 0..3 {
        script.push(("/session-state/", not_ready()));
    }
    script.push(("/session-state/", Canned::Json(compile_result())));

    let mut session = idle_session(script);
    session.compile("int main() {}", "").await.unwrap();

    assert_eq!(session.state(), SessionState::Debug);
    assert_eq!(session.transport().hits("/session-state/"), 4);
}

#[tokio::test(start_paused = true)]
async fn test_compile_failure_keeps_editing_state() {
    let failure = json!({
        "state": true, "retry": false, "arch": "aarch64",
        "compile": false, "done": false,
        "failures": [
            {"category": "error", "desc": "expected `;`", "line": 3, "column": 7},
            {"category": "fatal error", "desc": "1 error generated"}
        ]
    });
    let mut session = idle_session(vec![
        ("/compile/", compile_ack("sess-1")),
        ("/session-state/", Canned::Json(failure)),
    ]);
    session.compile("int main() {", "").await.unwrap();

    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.listing().is_empty());

    let view = session.view();
    assert!(view
        .events
        .contains(&Event::CompileError(Some(3), "expected `;`".to_string())));
    assert!(view
        .events
        .contains(&Event::CompileError(None, "1 error generated".to_string())));
    // a compile failure is not a communication failure
    assert!(view.console_lines().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_compile_ack_is_fatal() {
    let mut session = idle_session(vec![(
        "/compile/",
        Canned::Json(json!({"compile": false, "session": ""})),
    )]);

    let err = session.compile("int main() {}", "").await.unwrap_err();
    assert!(matches!(err, Error::CompileRejected));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(
        session.view().console_lines(),
        vec![(
            ConsoleKind::Stderr,
            "Error communicating with server".to_string()
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_exhaustion_is_fatal() {
    let mut script = vec![("/compile/", compile_ack("sess-1"))];
    // initial poll plus the full retry budget
    for _ in 0..31 {
        script.push(("/session-state/", not_ready()));
    }

    let mut session = idle_session(script);
    let err = session.compile("int main() {}", "").await.unwrap_err();

    assert!(matches!(err, Error::RetryBudgetExhausted(30)));
    assert_eq!(session.transport().hits("/session-state/"), 31);
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(
        session.view().console_lines(),
        vec![(
            ConsoleKind::Stderr,
            "Error communicating with server".to_string()
        )]
    );
    session.transport().assert_drained();
}

#[tokio::test(start_paused = true)]
async fn test_retry_counter_resets_between_sequences() {
    // two sequences, each eating most of the budget: only a counter that
    // restarts per sequence survives this script
    let mut session = debug_session(vec![]).await;

    let mut script = vec![("/step/", step_ack())];
    for _ in 0..29 {
        script.push(("/step-state/", Canned::Json(json!({"state": false}))));
    }
    script.push(("/step-state/", Canned::Json(step_reply(0x1004, false))));
    script.push(("/step/", step_ack()));
    for _ in 0..29 {
        script.push(("/step-state/", Canned::Json(json!({"state": false}))));
    }
    script.push(("/step-state/", Canned::Json(step_reply(0x1004, false))));
    session.transport_mut().extend_script(script);

    assert_eq!(
        session.step(StepKind::Instruction).await.unwrap(),
        StepOutcome::Stopped
    );
    assert_eq!(
        session.step(StepKind::Instruction).await.unwrap(),
        StepOutcome::Stopped
    );
    assert_eq!(session.state(), SessionState::Debug);
}

#[tokio::test(start_paused = true)]
async fn test_resume_replays_full_snapshot() {
    let mut snapshot = compile_result();
    snapshot["source"] = json!("int main() { return 0; }");
    snapshot["lang"] = json!("c");
    snapshot["pc"] = json!(0x1004);
    snapshot["regs"] = json!([{"name": "pc", "high": 0, "low": 0x1004}]);
    snapshot["vars"] = json!([{"name": "x", "value": "42"}]);
    snapshot["stacktrace"] = json!(["main"]);
    snapshot["bkpts"] = json!([0x1000]);
    snapshot["bkptLines"] = json!([2]);

    let mut session = idle_session(vec![("/session-state/", Canned::Json(snapshot))]);
    session.resume("sess-resumed").await.unwrap();

    assert_eq!(session.state(), SessionState::Debug);
    let view = session.view();
    assert!(view
        .events
        .contains(&Event::LoadSource("int main() { return 0; }".to_string())));
    assert!(view.events.contains(&Event::HighlightDisasm(2)));
    // first snapshot after resume: nothing flagged as changed
    assert!(view
        .events
        .contains(&Event::Registers(vec![("pc".to_string(), 0x1004)], vec![])));
    assert!(view
        .events
        .contains(&Event::Variables(vec![("x".to_string(), "42".to_string())])));
    assert!(view.events.contains(&Event::Stack(vec!["main".to_string()])));
    assert_eq!(view.last_gutters(), Some((vec![1], vec![1])));
}

#[tokio::test(start_paused = true)]
async fn test_resume_abandons_when_session_unknown() {
    let mut session = idle_session(vec![(
        "/session-state/",
        Canned::Json(json!({"state": false, "retry": false, "arch": "aarch64"})),
    )]);
    session.resume("gone").await.unwrap();

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.transport().hits("/session-state/"), 1);
    assert!(session.view().console_lines().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_guards_ignore_actions_outside_debug() {
    let mut session = idle_session(vec![]);

    assert_eq!(
        session.step(StepKind::Instruction).await.unwrap(),
        StepOutcome::Skipped
    );
    session.send_stdin("hello").await.unwrap();
    session.stop().await.unwrap();
    assert_eq!(session.download().await.unwrap(), None);

    assert!(session.transport().requests.is_empty());
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_is_immediately_fatal() {
    let mut session = debug_session(vec![("/step/", Canned::Unreachable)]).await;

    let err = session.step(StepKind::Instruction).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(session.state(), SessionState::Idle);
    // no retries for transport errors
    assert_eq!(session.transport().hits("/step/"), 1);
    assert_eq!(session.transport().hits("/step-state/"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transition_to_idle_cleans_everything() {
    let mut session = debug_session(vec![("/step/", Canned::Unreachable)]).await;
    session.step(StepKind::Instruction).await.unwrap_err();

    // after the state change the view saw a full teardown
    let view = session.view();
    let idle_at = view
        .events
        .iter()
        .rposition(|e| *e == Event::State(SessionState::Idle))
        .unwrap();
    let tail = &view.events[..idle_at];
    assert!(tail.contains(&Event::ClearAll));
    assert!(tail.contains(&Event::Gutters(vec![], vec![])));
    assert!(!session.auto_step_armed());
    assert_eq!(session.session_id(), "");
}

#[tokio::test(start_paused = true)]
async fn test_stdin_round_trip_echoes_line() {
    let mut session = debug_session(vec![(
        "/stdin/",
        Canned::Json(json!({"stdin": true})),
    )])
    .await;

    session.send_stdin("some input").await.unwrap();
    assert_eq!(
        session.transport().last_body("/stdin/"),
        Some("some input".to_string())
    );
    assert_eq!(
        session.view().console_lines(),
        vec![(ConsoleKind::Stdin, "some input".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_explicit_stop_tears_down() {
    let mut session = debug_session(vec![("/stop/", Canned::Raw(b"".to_vec()))]).await;
    session.stop().await.unwrap();

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.transport().hits("/stop/"), 1);
    assert!(session.view().console_lines().is_empty());
}
