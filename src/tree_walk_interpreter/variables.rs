use rustc_hash::FxHashMap;

use super::{ExecutionErrorKind, Value};

/// The flat, program-wide mapping from names to values. A name is defined
/// exactly when it is present.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: FxHashMap<String, Value>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, name: &str) -> Result<&Value, ExecutionErrorKind> {
        self.values
            .get(name)
            .ok_or_else(|| ExecutionErrorKind::UndefinedVariable(name.to_string()))
    }

    pub fn write(&mut self, name: &str, value: Value) {
        match self.values.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.values.insert(name.to_string(), value);
            }
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn delete(&mut self, name: &str) -> Result<Value, ExecutionErrorKind> {
        self.values
            .remove(name)
            .ok_or_else(|| ExecutionErrorKind::UndefinedVariable(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
