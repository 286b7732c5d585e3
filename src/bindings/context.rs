//! Per-worker binding state.

use super::types::Value;
use std::collections::HashMap;

/// Scratch state owned by exactly one worker.
///
/// Stateful mappers such as `Save` and `Load` read and write named variables
/// here. The context is never shared, so no synchronization is needed.
#[derive(Debug, Default)]
pub struct WorkerContext {
    worker_id: usize,
    vars: HashMap<String, Value>,
}

impl WorkerContext {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            vars: HashMap::new(),
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vars_are_isolated_per_context() {
        let mut first = WorkerContext::new(0);
        let second = WorkerContext::new(1);

        first.set("user", Value::Long(9));
        assert_eq!(first.get("user"), Some(&Value::Long(9)));
        assert!(second.get("user").is_none());
        assert_eq!(second.worker_id(), 1);
    }
}
