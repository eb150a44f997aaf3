use rustc_hash::FxHashMap;

use super::Value;

/// Module-level bindings carried from one cycle to the next.
#[derive(Debug, Default, Clone)]
pub struct Environment {
    globals: FxHashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }

    /// Bound names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.globals.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            globals: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FrameKind {
    Module,
    Class,
    Function,
}

/// Scoped view used while executing: the shared environment plus the locals
/// of the class body or function call being run, if any.
pub(super) struct Frame<'a> {
    globals: &'a mut Environment,
    locals: Option<&'a mut FxHashMap<String, Value>>,
    kind: FrameKind,
}

impl<'a> Frame<'a> {
    pub(super) fn top_level(globals: &'a mut Environment) -> Self {
        Self {
            globals,
            locals: None,
            kind: FrameKind::Module,
        }
    }

    pub(super) fn kind(&self) -> FrameKind {
        self.kind
    }

    pub(super) fn load(&self, name: &str) -> Option<Value> {
        if let Some(locals) = self.locals.as_deref()
            && let Some(value) = locals.get(name)
        {
            return Some(value.clone());
        }
        self.globals.get(name).cloned()
    }

    pub(super) fn store(&mut self, name: impl Into<String>, value: Value) {
        match self.locals.as_deref_mut() {
            Some(locals) => {
                locals.insert(name.into(), value);
            }
            None => self.globals.set(name, value),
        }
    }

    pub(super) fn child<'b>(
        &'b mut self,
        locals: &'b mut FxHashMap<String, Value>,
        kind: FrameKind,
    ) -> Frame<'b> {
        Frame {
            globals: &mut *self.globals,
            locals: Some(locals),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locals_shadow_globals_and_stay_local() {
        let mut environment: Environment = [("x", Value::from(1))].into_iter().collect();
        let mut locals = FxHashMap::default();
        {
            let mut top = Frame::top_level(&mut environment);
            let mut frame = top.child(&mut locals, FrameKind::Function);
            assert_eq!(frame.load("x").and_then(|value| value.as_int()), Some(1));
            frame.store("x", Value::from(2));
            assert_eq!(frame.load("x").and_then(|value| value.as_int()), Some(2));
        }
        assert_eq!(environment.get("x").and_then(Value::as_int), Some(1));
        assert_eq!(environment.names(), vec!["x"]);
    }

    #[test]
    fn top_level_stores_reach_the_environment() {
        let mut environment = Environment::new();
        Frame::top_level(&mut environment).store("y", Value::from("z"));
        assert_eq!(environment.get("y").and_then(Value::as_str), Some("z"));
    }
}
