use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use crate::{SHARED_CHIA_ROOT_KEY, SHARED_LOCAL_TEST_KEY};

/// Key-value bag the GUI layer reads. Values are not re-validated here.
#[derive(Debug, Default)]
pub struct SharedState {
    values: Mutex<Map<String, Value>>,
}

impl SharedState {
    pub fn new(local_test: bool) -> Self {
        let state = Self::default();
        state.set(SHARED_LOCAL_TEST_KEY, Value::Bool(local_test));
        state
    }

    fn values(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, key: &str, value: Value) {
        self.values().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values().get(key).cloned()
    }

    pub fn local_test(&self) -> bool {
        self.get(SHARED_LOCAL_TEST_KEY)
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    pub fn chia_root(&self) -> Option<String> {
        self.get(SHARED_CHIA_ROOT_KEY)
            .and_then(|value| value.as_str().map(str::to_string))
    }

    pub(crate) fn publish_chia_root(&self, root: &str) {
        self.set(SHARED_CHIA_ROOT_KEY, Value::String(root.to_string()));
    }

    pub fn snapshot(&self) -> Value {
        Value::Object(self.values().clone())
    }
}
