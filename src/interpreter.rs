use std::io::Write;

use tracing::warn;

use crate::ast::Statement;
use crate::backend::Backend;

mod environment;
mod error;
mod natives;
mod ops;
mod runtime;
mod value;

pub use environment::Environment;
pub use error::{ExceptionKind, RaisedException, RuntimeError};
pub use value::{Class, Dict, Function, Instance, Param, Value};

use environment::Frame;
use runtime::{ExecResult, Runtime};

/// Destination of `print` output.
#[derive(Debug)]
pub enum Output {
    Stdout,
    /// Lines are kept in memory until taken with [`Interpreter::take_output`].
    Buffer(Vec<String>),
}

impl Output {
    fn write_line(&mut self, line: &str) {
        match self {
            Output::Stdout => {
                if let Err(error) = emit_line(&mut std::io::stdout().lock(), line) {
                    warn!(%error, "failed to write script output");
                }
            }
            Output::Buffer(lines) => lines.push(line.to_string()),
        }
    }
}

fn emit_line(writer: &mut impl Write, line: &str) -> std::io::Result<()> {
    writeln!(writer, "{line}")?;
    writer.flush()
}

/// AST-walking backend that executes one top-level statement at a time
/// against an environment owned by the caller.
pub struct Interpreter {
    output: Output,
    fault_origin: Option<usize>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            output: Output::Stdout,
            fault_origin: None,
        }
    }

    /// Interpreter whose `print` output is captured instead of written to
    /// stdout.
    pub fn buffered() -> Self {
        Self {
            output: Output::Buffer(Vec::new()),
            fault_origin: None,
        }
    }

    /// Drains captured output. Always empty when printing to stdout.
    pub fn take_output(&mut self) -> Vec<String> {
        match &mut self.output {
            Output::Buffer(lines) => std::mem::take(lines),
            Output::Stdout => Vec::new(),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for Interpreter {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn execute(
        &mut self,
        statement: &Statement,
        environment: &mut Environment,
    ) -> Result<(), RuntimeError> {
        // execute -> exec_statement -> eval_expression -> call_value
        // -> call_function -> exec_block (function body).
        let mut frame = Frame::top_level(environment);
        let mut runtime = Runtime::new(&mut self.output);
        let result = runtime.exec_statement(statement, &mut frame);
        self.fault_origin = runtime.origin.take();
        match result? {
            ExecResult::Next => Ok(()),
            ExecResult::Return(_) => Err(RuntimeError::ReturnOutsideFunction),
            ExecResult::Break | ExecResult::Continue => Err(RuntimeError::LoopControlOutsideLoop),
        }
    }

    fn fault_origin(&self) -> Option<usize> {
        self.fault_origin
    }
}
