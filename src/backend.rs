use crate::ast::Statement;
use crate::interpreter::{Environment, RuntimeError};

/// Executes single top-level statements against a persistent environment.
///
/// The driver only ever hands a backend one statement at a time, in source
/// order, and keeps the environment alive between calls and across cycles.
/// A backend must leave every binding made before a failure in place.
pub trait Backend {
    fn name(&self) -> &'static str;

    fn execute(
        &mut self,
        statement: &Statement,
        environment: &mut Environment,
    ) -> Result<(), RuntimeError>;

    /// Line of the innermost nested statement the last failed `execute`
    /// raised from. `None` when the fault came from the top-level statement
    /// itself or the backend does not track it.
    fn fault_origin(&self) -> Option<usize> {
        None
    }
}
