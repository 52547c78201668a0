use crate::interpreter::value::Value;

use std::collections::HashMap;
use tracing::trace;

/// Globals plus one local frame per active function call.
///
/// Lookups consult the innermost frame only, then the globals. Frames never
/// see each other, so a recursive call cannot clobber its caller's
/// parameters.
#[derive(Debug, Clone)]
pub struct Scope {
    globals: HashMap<String, Value>,
    frames: Vec<HashMap<String, Value>>,
}

impl Scope {
    /// Create a global scope seeded with the built-in constants.
    pub fn new() -> Self {
        Self {
            globals: HashMap::from([
                (String::from("pi"), Value::Number(std::f64::consts::PI)),
                (String::from("e"), Value::Number(std::f64::consts::E)),
                (
                    String::from("golden"),
                    Value::Number((1.0 + 5f64.sqrt()) / 2.0),
                ),
                (String::from("h"), Value::Number(6.62607004e-34)),
            ]),
            frames: Vec::new(),
        }
    }

    /// Look up a name, innermost frame first.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.frames.last().and_then(|frame| frame.get(name)) {
            return Some(v.clone());
        }
        self.globals.get(name).cloned()
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Write a global binding, returning the previous value.
    pub fn set_global(&mut self, name: String, value: Value) -> Option<Value> {
        trace!(%name, %value, "global write");
        self.globals.insert(name, value)
    }

    pub fn push_frame(&mut self, bindings: HashMap<String, Value>) {
        self.frames.push(bindings);
    }

    /// Bind a name in the innermost frame.
    pub fn bind_local(&mut self, name: String, value: Value) -> Option<Value> {
        match self.frames.last_mut() {
            Some(frame) => frame.insert(name, value),
            None => None,
        }
    }

    /// Copy of the innermost frame, empty at top level.
    pub fn locals(&self) -> HashMap<String, Value> {
        self.frames.last().cloned().unwrap_or_default()
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}
