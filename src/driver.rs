//! One re-sync cycle per source change: parse, diff against the last good
//! revision, widen by dependencies, and run the result against the carried
//! environment.

use std::fmt;

use tracing::{debug, info, warn};

use crate::ast::{LineSpan, Statement};
use crate::backend::Backend;
use crate::diff::diff;
use crate::interpreter::{Environment, RuntimeError};
use crate::parser::{SyntaxError, parse};
use crate::propagate::expand;
use crate::run_state::{Marker, RunState, RunStateSink};
use crate::watch::ChangeEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    #[default]
    Idle,
    Parsed,
    Diffed,
    Running,
    Committed,
    Aborted,
}

/// A runtime fault in one statement of the run set.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementFault {
    /// Lines of the top-level statement that failed.
    pub lines: LineSpan,
    /// Line the error was raised on, which lies inside a called function or
    /// a nested block when it differs from `lines.start`.
    pub origin: usize,
    pub error: RuntimeError,
}

impl fmt::Display for StatementFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lines.start == self.lines.end {
            write!(f, "line {}", self.lines.start)?;
        } else {
            write!(f, "lines {}-{}", self.lines.start, self.lines.end)?;
        }
        if self.origin != self.lines.start {
            write!(f, " (raised on line {})", self.origin)?;
        }
        write!(f, ": {}", self.error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The new source did not parse; nothing ran and nothing was published.
    ParseFailed(SyntaxError),
    /// No statement needed to run. The new revision became the last good one.
    NothingToRun,
    /// Every statement in the run set succeeded.
    Committed { executed: usize },
    /// A statement failed. Bindings made before the failure are kept.
    Aborted(StatementFault),
}

pub struct Driver<B, S> {
    backend: B,
    sink: S,
    environment: Environment,
    last_good: Vec<Statement>,
    phase: CyclePhase,
}

impl<B: Backend, S: RunStateSink> Driver<B, S> {
    pub fn new(backend: B, sink: S) -> Self {
        Self::with_environment(backend, sink, Environment::new())
    }

    /// Driver whose environment starts with `environment`'s bindings.
    pub fn with_environment(backend: B, sink: S, environment: Environment) -> Self {
        Self {
            backend,
            sink,
            environment,
            last_good: Vec::new(),
            phase: CyclePhase::Idle,
        }
    }

    /// Current phase. Always [`CyclePhase::Idle`] between cycles.
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Statements of the last revision that was fully applied.
    pub fn last_good(&self) -> &[Statement] {
        &self.last_good
    }

    /// Runs cycles for every event in `feed`, handing each outcome to
    /// `on_outcome`. Faults never end the loop; only an exhausted feed does.
    pub fn run<I, F>(&mut self, feed: I, mut on_outcome: F)
    where
        I: IntoIterator<Item = ChangeEvent>,
        F: FnMut(&ChangeEvent, &CycleOutcome),
    {
        for event in feed {
            let outcome = self.on_change(&event);
            on_outcome(&event, &outcome);
        }
    }

    pub fn on_change(&mut self, event: &ChangeEvent) -> CycleOutcome {
        let outcome = self.cycle(event);
        match &outcome {
            CycleOutcome::ParseFailed(error) => {
                warn!(path = %event.path.display(), %error, "parse failed");
            }
            CycleOutcome::NothingToRun => info!(path = %event.path.display(), "nothing to run"),
            CycleOutcome::Committed { executed } => {
                info!(path = %event.path.display(), executed, "cycle committed");
            }
            CycleOutcome::Aborted(fault) => {
                warn!(path = %event.path.display(), %fault, "cycle aborted");
            }
        }
        self.enter(CyclePhase::Idle);
        outcome
    }

    fn cycle(&mut self, event: &ChangeEvent) -> CycleOutcome {
        let next = match parse(&event.source) {
            Ok(module) => module.statements,
            Err(error) => return CycleOutcome::ParseFailed(error),
        };
        self.enter(CyclePhase::Parsed);

        let changed = diff(&self.last_good, &next);
        let run_set = expand(&next, &changed);
        self.enter(CyclePhase::Diffed);
        debug!(changed = ?changed, run_set = ?run_set, "computed run set");

        let mut state = RunState::for_source(&event.source);
        if run_set.is_empty() {
            self.last_good = next;
            self.sink.publish(&state);
            return CycleOutcome::NothingToRun;
        }

        for &index in &run_set {
            state.mark(next[index].span, Marker::MarkedForRun);
        }
        self.sink.publish(&state);
        self.enter(CyclePhase::Running);

        for &index in &run_set {
            let statement = &next[index];
            state.mark(statement.span, Marker::Running);
            self.sink.publish(&state);

            debug!(
                backend = self.backend.name(),
                line = statement.span.start,
                "executing statement"
            );
            if let Err(error) = self.backend.execute(statement, &mut self.environment) {
                state.mark(statement.span, Marker::Failed);
                self.sink.publish(&state);
                self.enter(CyclePhase::Aborted);
                return CycleOutcome::Aborted(StatementFault {
                    lines: statement.span,
                    origin: self.backend.fault_origin().unwrap_or(statement.span.start),
                    error,
                });
            }

            state.mark(statement.span, Marker::MarkedForRun);
            self.sink.publish(&state);
        }

        self.last_good = next;
        self.sink.publish(&RunState::for_source(&event.source));
        self.enter(CyclePhase::Committed);
        CycleOutcome::Committed {
            executed: run_set.len(),
        }
    }

    fn enter(&mut self, phase: CyclePhase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "phase transition");
            self.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{Interpreter, Value};
    use crate::run_state::RunStateFormat;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    type Published = Vec<String>;

    fn driver() -> Driver<Interpreter, impl FnMut(&RunState)> {
        Driver::new(Interpreter::buffered(), |_: &RunState| {})
    }

    fn recording_driver(published: &mut Published) -> Driver<Interpreter, impl FnMut(&RunState) + '_> {
        Driver::new(Interpreter::buffered(), move |state: &RunState| {
            published.push(state.render(RunStateFormat::Glyphs).replace('\n', "|"));
        })
    }

    fn change(source: &str) -> ChangeEvent {
        ChangeEvent::new("script.py", source)
    }

    fn global(driver: &Driver<Interpreter, impl RunStateSink>, name: &str) -> Option<String> {
        driver.environment().get(name).map(Value::to_string)
    }

    #[test]
    fn appended_statements_see_earlier_state() {
        let mut driver = driver();
        assert_eq!(driver.on_change(&change("a = 'hello'")), CycleOutcome::Committed { executed: 1 });
        let outcome = driver.on_change(&change("a = 'hello'\nprint(a)\na *= 2"));
        assert_eq!(outcome, CycleOutcome::Committed { executed: 2 });
        assert_eq!(global(&driver, "a").as_deref(), Some("hellohello"));
        assert_eq!(driver.backend_mut().take_output(), vec!["hello"]);
        assert_eq!(driver.phase(), CyclePhase::Idle);
    }

    #[test]
    fn syntax_errors_leave_everything_untouched() {
        let mut published = Published::new();
        {
            let mut driver = recording_driver(&mut published);
            driver.on_change(&change("a = 'hello'"));
            let before = driver.last_good().len();

            let outcome = driver.on_change(&change("a = 'hello\nb = "));
            assert!(matches!(outcome, CycleOutcome::ParseFailed(_)));
            assert_eq!(driver.last_good().len(), before);
            assert_eq!(global(&driver, "a").as_deref(), Some("hello"));
            assert_eq!(driver.phase(), CyclePhase::Idle);

            driver.on_change(&change("a = 'world'"));
            assert_eq!(global(&driver, "a").as_deref(), Some("world"));
        }
        // The failed parse published nothing between the two successful cycles.
        assert_eq!(published, vec!["~", ">>", "~", ".", "~", ">>", "~", "."]);
    }

    #[test]
    fn failures_halt_without_reverting_earlier_effects() {
        let mut published = Published::new();
        let mut driver = recording_driver(&mut published);
        let outcome = driver.on_change(&change("a = 1\nraise 'foo'\nb = 2"));
        let CycleOutcome::Aborted(fault) = outcome else {
            panic!("expected an aborted cycle, got {outcome:?}");
        };
        assert_eq!(fault.lines, LineSpan::new(2, 2));
        assert_eq!(fault.origin, 2);
        assert_eq!(fault.error, RuntimeError::NotAnException { type_name: "str" });
        assert_eq!(global(&driver, "a").as_deref(), Some("1"));
        assert!(global(&driver, "b").is_none());
        assert!(driver.last_good().is_empty());
        assert_eq!(driver.phase(), CyclePhase::Idle);
        drop(driver);
        assert_eq!(
            published.last().map(String::as_str),
            Some("~|x|~"),
            "the failed statement is marked and later statements stay pending"
        );
    }

    #[test]
    fn oversized_values_abort_the_cycle() {
        let mut driver = driver();
        let outcome = driver.on_change(&change("a = 1\ns = 'ab' * 4611686018427387904"));
        let CycleOutcome::Aborted(fault) = outcome else {
            panic!("expected an aborted cycle, got {outcome:?}");
        };
        assert_eq!(fault.error.class_name(), "OverflowError");
        assert_eq!(fault.lines, LineSpan::new(2, 2));

        // Nothing was committed yet, so the whole script runs again.
        let outcome = driver.on_change(&change("a = 1\ns = 'ab' * 2"));
        assert_eq!(outcome, CycleOutcome::Committed { executed: 2 });
        assert_eq!(global(&driver, "s").as_deref(), Some("abab"));
    }

    #[test]
    fn faults_inside_calls_point_at_the_raising_line() {
        let mut driver = driver();
        let source = indoc! {"
            def ratio(a, b):
                scaled = a * 10
                return scaled // b
            r = ratio(1, 0)
        "};
        let outcome = driver.on_change(&change(source));
        let CycleOutcome::Aborted(fault) = outcome else {
            panic!("expected an aborted cycle, got {outcome:?}");
        };
        assert_eq!(fault.lines, LineSpan::new(4, 4));
        assert_eq!(fault.origin, 3);
        assert_eq!(
            fault.to_string(),
            "line 4 (raised on line 3): division by zero"
        );
    }

    #[test]
    fn corrected_statement_runs_after_an_exception() {
        let mut driver = driver();
        driver.on_change(&change("a = 'hello'\nraise 'foo'"));
        let outcome = driver.on_change(&change("a = 'hello'\na = 'world'"));
        assert_eq!(outcome, CycleOutcome::Committed { executed: 2 });
        assert_eq!(global(&driver, "a").as_deref(), Some("world"));
    }

    #[test]
    fn successful_cycle_publishes_every_transition() {
        let mut published = Published::new();
        {
            let mut driver = recording_driver(&mut published);
            driver.on_change(&change("x = 1\n\ny = x + 1"));
        }
        assert_eq!(
            published,
            vec![
                "~|.|~",
                ">>|.|~",
                "~|.|~",
                "~|.|>>",
                "~|.|~",
                ".|.|.",
            ]
        );
    }

    #[test]
    fn nothing_to_run_publishes_one_clean_state() {
        let mut published = Published::new();
        {
            let mut driver = recording_driver(&mut published);
            driver.on_change(&change("a = 1"));
            let outcome = driver.on_change(&change("a = 1\n\n"));
            assert_eq!(outcome, CycleOutcome::NothingToRun);
            assert_eq!(driver.last_good().len(), 1);
        }
        assert_eq!(published.len(), 4 + 1);
        assert_eq!(published.last().map(String::as_str), Some(".|.|."));
    }

    #[test]
    fn reapplying_the_same_source_is_a_no_op() {
        let mut driver = driver();
        let source = indoc! {"
            counter = 0
            counter += 1
        "};
        driver.on_change(&change(source));
        assert_eq!(global(&driver, "counter").as_deref(), Some("1"));
        assert_eq!(driver.on_change(&change(source)), CycleOutcome::NothingToRun);
        assert_eq!(global(&driver, "counter").as_deref(), Some("1"));
    }

    #[test]
    fn redefined_function_reruns_its_callers() {
        let mut driver = driver();
        let before = indoc! {"
            def greet(name):
                return 'hi ' + name
            message = greet('ada')
            unrelated = 5
        "};
        let after = indoc! {"
            def greet(name):
                return 'hello ' + name
            message = greet('ada')
            unrelated = 5
        "};
        driver.on_change(&change(before));
        let outcome = driver.on_change(&change(after));
        assert_eq!(outcome, CycleOutcome::Committed { executed: 2 });
        assert_eq!(global(&driver, "message").as_deref(), Some("hello ada"));
    }

    #[test]
    fn injected_bindings_are_visible_to_the_first_cycle() {
        let environment: Environment = [("seed", Value::from(41))].into_iter().collect();
        let mut driver = Driver::with_environment(Interpreter::buffered(), |_: &RunState| {}, environment);
        driver.on_change(&change("answer = seed + 1"));
        assert_eq!(global(&driver, "answer").as_deref(), Some("42"));
    }

    #[test]
    fn run_consumes_the_whole_feed() {
        let mut driver = driver();
        let feed = vec![
            change("a = 1"),
            change("a = "),
            change("a = 1\nb = a / 0"),
            change("a = 1\nb = a / 2"),
        ];
        let mut outcomes = Vec::new();
        driver.run(feed, |_, outcome| {
            outcomes.push(match outcome {
                CycleOutcome::ParseFailed(_) => "parse",
                CycleOutcome::NothingToRun => "none",
                CycleOutcome::Committed { .. } => "committed",
                CycleOutcome::Aborted(_) => "aborted",
            })
        });
        assert_eq!(outcomes, vec!["committed", "parse", "aborted", "committed"]);
        assert_eq!(global(&driver, "b").as_deref(), Some("0.5"));
    }
}
