//! State-binding contract
//!
//! The engine does not re-render anything itself. At activation it hands the
//! adopted value to a [`StateBinder`] and keeps the returned [`StateSetter`]
//! handle; dispatcher operations push new values through that handle only.
//!
//! [`SharedStateBinder`] is the built-in binder: one shared cell per physical
//! key, with change listeners.

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Handle used to push a new value into bound state
pub trait StateSetter: Send + Sync {
    /// Replace the bound value
    fn set(&self, value: Value);
}

/// Result of binding a value into host state
#[derive(Clone)]
pub struct BoundState {
    /// Value the host currently holds for the key
    pub current: Value,
    /// Handle for later updates
    pub setter: Arc<dyn StateSetter>,
}

impl fmt::Debug for BoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundState")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

/// Capability binding persisted values into live application state
pub trait StateBinder: Send + Sync {
    /// Bind `initial` for `physical_key` and return the host's current value
    /// plus a setter
    ///
    /// The engine passes the namespaced physical key, so the same logical key
    /// under two namespaces binds two separate pieces of state.
    fn bind(&self, physical_key: &str, initial: Value) -> BoundState;
}

type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// One bound value and its listeners
#[derive(Default)]
struct StateCell {
    value: RwLock<Option<Value>>,
    listeners: RwLock<Vec<Listener>>,
}

impl StateSetter for StateCell {
    fn set(&self, value: Value) {
        *self.value.write() = Some(value.clone());
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener(&value);
        }
    }
}

/// Default binder keeping one shared cell per physical key
///
/// The first bind of a key stores the initial value; later binds of the same
/// key return whatever the cell holds, like a component re-rendering against
/// state it already owns.
#[derive(Default)]
pub struct SharedStateBinder {
    cells: DashMap<String, Arc<StateCell>>,
}

impl SharedStateBinder {
    /// Create empty binder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current bound value for a physical key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.cells.get(key).and_then(|cell| cell.value.read().clone())
    }

    /// Register a callback fired on every update of `key`
    pub fn subscribe<F>(&self, key: &str, listener: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.cell(key).listeners.write().push(Arc::new(listener));
    }

    /// Number of keys with a cell
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if no key has been bound or subscribed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn cell(&self, key: &str) -> Arc<StateCell> {
        self.cells
            .entry(key.to_string())
            .or_default()
            .value()
            .clone()
    }
}

impl StateBinder for SharedStateBinder {
    fn bind(&self, physical_key: &str, initial: Value) -> BoundState {
        let cell = self.cell(physical_key);
        let current = {
            let mut slot = cell.value.write();
            slot.get_or_insert(initial).clone()
        };
        BoundState {
            current,
            setter: cell,
        }
    }
}

impl fmt::Debug for SharedStateBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedStateBinder")
            .field("keys", &self.cells.len())
            .finish()
    }
}
