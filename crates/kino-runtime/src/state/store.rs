//! Player state store backed by one reactive cell per field

use super::catalog::{StateKey, StateValue};
use super::snapshot::StateSnapshot;
use crate::reactive::{untracked, Signal};
use crate::subscription::Subscription;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Notification published for every field change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub key: StateKey,
    pub value: StateValue,
}

impl<'de> Deserialize<'de> for StateChange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Wire {
            key: StateKey,
            value: serde_json::Value,
        }

        let wire = Wire::deserialize(deserializer)?;
        let value = StateValue::from_json(wire.key, wire.value).map_err(serde::de::Error::custom)?;
        Ok(StateChange { key: wire.key, value })
    }
}

type ChangeListener = Rc<dyn Fn(&StateChange) -> anyhow::Result<()>>;

#[derive(Default)]
struct ChangeListeners {
    next_id: u64,
    entries: Vec<(u64, ChangeListener)>,
}

impl ChangeListeners {
    fn insert(&mut self, listener: ChangeListener) -> u64 {
        self.next_id += 1;
        self.entries.push((self.next_id, listener));
        self.next_id
    }

    fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    fn snapshot(&self) -> Vec<ChangeListener> {
        self.entries.iter().map(|(_, l)| Rc::clone(l)).collect()
    }
}

/// Owns the canonical value of every player field.
///
/// The set of fields is fixed at construction. Besides per-field
/// subscriptions, every change is re-published on a global channel so that
/// observers can watch the whole store with one listener.
pub struct StateStore {
    cells: HashMap<StateKey, Signal<StateValue>>,
    defaults: HashMap<StateKey, StateValue>,
    listeners: Rc<RefCell<ChangeListeners>>,
    internal: RefCell<Vec<Subscription>>,
    destroyed: Cell<bool>,
}

impl StateStore {
    /// Create a store seeded with the documented defaults
    pub fn new() -> Self {
        Self::build(HashMap::new())
    }

    /// Create a store with some defaults replaced.
    ///
    /// Overrides are validated against the catalog; a mismatch fails.
    pub fn with_overrides(overrides: impl IntoIterator<Item = (StateKey, StateValue)>) -> Result<Self> {
        let mut map = HashMap::new();
        for (key, value) in overrides {
            key.validate(&value)?;
            map.insert(key, value);
        }
        Ok(Self::build(map))
    }

    fn build(mut overrides: HashMap<StateKey, StateValue>) -> Self {
        let listeners: Rc<RefCell<ChangeListeners>> = Rc::default();
        let mut cells = HashMap::with_capacity(StateKey::ALL.len());
        let mut defaults = HashMap::with_capacity(StateKey::ALL.len());
        let mut internal = Vec::with_capacity(StateKey::ALL.len());

        for key in StateKey::ALL {
            let initial = overrides.remove(&key).unwrap_or_else(|| key.default_value());
            let cell = Signal::new(initial.clone());
            internal.push(Self::forward_changes(key, &cell, &listeners));
            cells.insert(key, cell);
            defaults.insert(key, initial);
        }

        Self {
            cells,
            defaults,
            listeners,
            internal: RefCell::new(internal),
            destroyed: Cell::new(false),
        }
    }

    /// Store-internal listener re-publishing one field's changes globally
    fn forward_changes(
        key: StateKey,
        cell: &Signal<StateValue>,
        listeners: &Rc<RefCell<ChangeListeners>>,
    ) -> Subscription {
        let weak_cell = cell.downgrade();
        let listeners = Rc::downgrade(listeners);
        cell.subscribe(move || {
            let (Some(listeners), Some(cell)) = (listeners.upgrade(), weak_cell.upgrade()) else {
                return Ok(());
            };
            let change = StateChange {
                key,
                value: cell.peek(),
            };
            let snapshot = listeners.borrow().snapshot();
            for listener in snapshot {
                if let Err(e) = listener(&change) {
                    tracing::error!(key = %key, error = %e, "State change listener failed");
                }
            }
            Ok(())
        })
    }

    fn cell(&self, key: StateKey) -> Result<&Signal<StateValue>> {
        if self.destroyed.get() {
            return Err(Error::StoreDestroyed);
        }
        self.cells
            .get(&key)
            .ok_or_else(|| Error::UnknownStateKey(key.name().to_string()))
    }

    /// Read a field; tracks like [`Signal::get`]
    pub fn get(&self, key: StateKey) -> Result<StateValue> {
        Ok(self.cell(key)?.get())
    }

    /// Read a field by name
    pub fn get_by_name(&self, name: &str) -> Result<StateValue> {
        self.get(name.parse()?)
    }

    /// Write a field. Returns whether the value changed.
    pub fn set(&self, key: StateKey, value: impl Into<StateValue>) -> Result<bool> {
        let value = value.into();
        let cell = self.cell(key)?;
        key.validate(&value)?;
        Ok(cell.set(value))
    }

    /// Write a field by name
    pub fn set_by_name(&self, name: &str, value: impl Into<StateValue>) -> Result<bool> {
        self.set(name.parse()?, value)
    }

    /// Apply several writes. Names outside the catalog are skipped.
    ///
    /// Every value is validated before any field is written, so a mismatch
    /// leaves the store untouched. Returns the number of fields that changed.
    pub fn update<K, I>(&self, partial: I) -> Result<usize>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, StateValue)>,
    {
        if self.destroyed.get() {
            return Err(Error::StoreDestroyed);
        }
        let mut writes = Vec::new();
        for (name, value) in partial {
            let Ok(key) = name.as_ref().parse::<StateKey>() else {
                debug!(key = name.as_ref(), "Ignoring unknown state key in update");
                continue;
            };
            key.validate(&value)?;
            writes.push((key, value));
        }

        let mut changed = 0;
        for (key, value) in writes {
            if self.cell(key)?.set(value) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Apply several typed writes
    pub fn update_keys(&self, partial: impl IntoIterator<Item = (StateKey, StateValue)>) -> Result<usize> {
        self.update(partial.into_iter().map(|(k, v)| (k.name(), v)))
    }

    /// Subscribe to one field
    pub fn subscribe(
        &self,
        key: StateKey,
        listener: impl Fn(&StateValue) -> anyhow::Result<()> + 'static,
    ) -> Result<Subscription> {
        let cell = self.cell(key)?;
        let reader = cell.downgrade();
        Ok(cell.subscribe(move || match reader.upgrade() {
            Some(cell) => listener(&cell.peek()),
            None => Ok(()),
        }))
    }

    /// Subscribe to every field change
    pub fn subscribe_any(
        &self,
        listener: impl Fn(&StateChange) -> anyhow::Result<()> + 'static,
    ) -> Result<Subscription> {
        if self.destroyed.get() {
            return Err(Error::StoreDestroyed);
        }
        let id = self.listeners.borrow_mut().insert(Rc::new(listener));
        let listeners = Rc::downgrade(&self.listeners);
        Ok(Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.borrow_mut().remove(id);
            }
        }))
    }

    /// Immutable point-in-time copy of every field
    pub fn snapshot(&self) -> Result<StateSnapshot> {
        if self.destroyed.get() {
            return Err(Error::StoreDestroyed);
        }
        let values = untracked(|| {
            self.cells
                .iter()
                .map(|(key, cell)| (*key, cell.peek()))
                .collect::<HashMap<_, _>>()
        });
        Ok(StateSnapshot::from_values(values))
    }

    /// Reapply the construction-time defaults through [`StateStore::update`]
    pub fn reset(&self) -> Result<usize> {
        let defaults: Vec<_> = StateKey::ALL
            .iter()
            .filter_map(|key| self.defaults.get(key).map(|v| (key.name(), v.clone())))
            .collect();
        self.update(defaults)
    }

    /// Release every subscriber. Later operations fail with [`Error::StoreDestroyed`].
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        for subscription in self.internal.borrow_mut().drain(..) {
            subscription.unsubscribe();
        }
        for cell in self.cells.values() {
            cell.clear_subscribers();
        }
        *self.listeners.borrow_mut() = ChangeListeners::default();
        debug!("State store destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
