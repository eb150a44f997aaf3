use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Result, ensure};
use pretty_assertions::assert_eq;

use livepy::driver::{CycleOutcome, Driver};
use livepy::interpreter::{Environment, Interpreter};
use livepy::run_state::{RunState, RunStateFormat};
use livepy::watch::ChangeEvent;
use test_support::{OutcomeKind, Session, load_sessions, normalize_output};

fn render(state: &RunState) -> String {
    state.render(RunStateFormat::Glyphs).replace('\n', "|")
}

fn outcome_kind(outcome: &CycleOutcome) -> OutcomeKind {
    match outcome {
        CycleOutcome::Committed { .. } => OutcomeKind::Committed,
        CycleOutcome::NothingToRun => OutcomeKind::NothingToRun,
        CycleOutcome::ParseFailed(_) => OutcomeKind::ParseFailed,
        CycleOutcome::Aborted(_) => OutcomeKind::Aborted,
    }
}

/// `str()` of every binding, in name order.
fn snapshot(environment: &Environment) -> Vec<(String, String)> {
    environment
        .names()
        .into_iter()
        .filter_map(|name| {
            environment
                .get(name)
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect()
}

fn clean_run(session: &Session, source: &str) -> Result<Vec<(String, String)>> {
    let mut driver = Driver::new(Interpreter::buffered(), |_: &RunState| {});
    let outcome = driver.on_change(&ChangeEvent::new(&session.dir, source));
    ensure!(
        matches!(outcome, CycleOutcome::Committed { .. }),
        "Clean run of {} did not commit: {outcome:?}",
        session.name
    );
    Ok(snapshot(driver.environment()))
}

fn replay(session: &Session) -> Result<()> {
    let sources = session.sources()?;
    let published = Rc::new(RefCell::new(Vec::new()));
    let sink = {
        let published = Rc::clone(&published);
        move |state: &RunState| published.borrow_mut().push(render(state))
    };
    let mut driver = Driver::new(Interpreter::buffered(), sink);

    for (revision, source) in session.spec.revisions.iter().zip(&sources) {
        let context = format!("{} / {}", session.name, revision.source);
        published.borrow_mut().clear();

        let event = ChangeEvent::new(session.dir.join(&revision.source), source.as_str());
        let outcome = driver.on_change(&event);
        let printed = driver.backend_mut().take_output();

        ensure!(
            outcome_kind(&outcome) == revision.outcome,
            "{context}: expected {:?}, got {outcome:?}",
            revision.outcome
        );
        if let Some(executed) = revision.executed {
            ensure!(
                outcome == CycleOutcome::Committed { executed },
                "{context}: expected {executed} executed statements, got {outcome:?}"
            );
        }
        if let CycleOutcome::Aborted(fault) = &outcome {
            if let Some(error) = &revision.error {
                assert_eq!(fault.error.class_name(), error.as_str(), "{context}");
            }
            if let Some(line) = revision.line {
                assert_eq!(fault.lines.start, line, "{context}");
            }
        }
        if let Some(expected) = &revision.stdout {
            assert_eq!(
                normalize_output(&printed.join("\n")),
                normalize_output(&expected.join("\n")),
                "{context}: printed output"
            );
        }
        if let Some(expected) = &revision.run_states {
            assert_eq!(&*published.borrow(), expected, "{context}: run states");
        }
    }

    for (name, expected) in &session.spec.globals {
        let actual = driver.environment().get(name).map(ToString::to_string);
        assert_eq!(
            actual.as_deref(),
            Some(expected.as_str()),
            "{}: global '{name}'",
            session.name
        );
    }

    if session.spec.clean_run_matches {
        let last = sources.last().map(String::as_str).unwrap_or_default();
        assert_eq!(
            snapshot(driver.environment()),
            clean_run(session, last)?,
            "{}: incremental state differs from a clean run",
            session.name
        );
    }

    Ok(())
}

#[test]
fn replays_editing_sessions() -> Result<()> {
    let sessions = load_sessions(Path::new("tests/sessions"))?;
    for session in &sessions {
        replay(session)?;
    }
    Ok(())
}

#[test]
fn every_session_is_described() -> Result<()> {
    for session in load_sessions(Path::new("tests/sessions"))? {
        ensure!(
            !session.spec.description.trim().is_empty(),
            "Session {} has an empty description",
            session.name
        );
    }
    Ok(())
}
