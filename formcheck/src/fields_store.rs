//! Registry of the fields a form knows about.

use std::sync::{PoisonError, RwLock};

use crate::event_emitter::{EventEmitter, ListenerId};
use crate::field::Field;
use crate::validation::{FieldFeedbackValidation, Feedbacks};

/// Channel emitted when a field is registered.
pub const FIELD_ADDED: &str = "FIELD_ADDED";
/// Channel emitted when a field is deregistered.
pub const FIELD_REMOVED: &str = "FIELD_REMOVED";
/// Channel emitted whenever a field record changes.
pub const FIELD_UPDATED: &str = "FIELD_UPDATED";

/// Field name to [`Field`] record, in registration order.
///
/// The store holds a record only while at least one rule group is mounted
/// for the name; mounting and unmounting groups maintains that, not the
/// store. Mutations that reference an unknown name are invariant
/// violations: they are logged and ignored.
#[derive(Debug, Default)]
pub struct FieldsStore {
    fields: RwLock<Vec<Field>>,
    events: EventEmitter<Field>,
}

impl FieldsStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`. Does nothing (and emits nothing) if already known.
    pub fn add_field(&self, name: &str) -> bool {
        let added = {
            let mut fields = self.fields.write().unwrap_or_else(PoisonError::into_inner);
            if fields.iter().any(|f| f.name == name) {
                None
            } else {
                let field = Field::new(name);
                fields.push(field.clone());
                Some(field)
            }
        };
        match added {
            Some(field) => {
                log::debug!("FieldsStore: added field '{}'", name);
                self.events.emit(FIELD_ADDED, &field);
                true
            }
            None => false,
        }
    }

    /// Deregister `name`.
    pub fn remove_field(&self, name: &str) -> bool {
        let removed = {
            let mut fields = self.fields.write().unwrap_or_else(PoisonError::into_inner);
            fields
                .iter()
                .position(|f| f.name == name)
                .map(|index| fields.remove(index))
        };
        match removed {
            Some(field) => {
                log::debug!("FieldsStore: removed field '{}'", name);
                self.events.emit(FIELD_REMOVED, &field);
                true
            }
            None => {
                log::error!("FieldsStore: cannot remove unknown field '{}'", name);
                false
            }
        }
    }

    /// Replace the record of `name`.
    pub fn update_field(&self, name: &str, field: Field) -> bool {
        self.update_with(name, move |existing| *existing = field)
    }

    /// Mutate the record of `name` in place and emit an update.
    pub fn update_with<F>(&self, name: &str, f: F) -> bool
    where
        F: FnOnce(&mut Field),
    {
        let updated = {
            let mut fields = self.fields.write().unwrap_or_else(PoisonError::into_inner);
            fields.iter_mut().find(|f| f.name == name).map(|field| {
                f(field);
                field.clone()
            })
        };
        match updated {
            Some(field) => {
                self.events.emit(FIELD_UPDATED, &field);
                true
            }
            None => {
                log::error!("FieldsStore: cannot update unknown field '{}'", name);
                false
            }
        }
    }

    /// Record one rule outcome for `name`.
    pub fn add_or_replace_validation(&self, name: &str, validation: FieldFeedbackValidation) {
        self.update_with(name, |field| field.add_or_replace_validation(validation));
    }

    /// Reset `name` to the default record.
    pub fn clear_field(&self, name: &str) -> bool {
        self.update_with(name, |field| *field = Field::new(field.name.clone()))
    }

    /// Reset every field to the default record, keeping the set of names.
    pub fn clear(&self) {
        let cleared: Vec<Field> = {
            let mut fields = self.fields.write().unwrap_or_else(PoisonError::into_inner);
            for field in fields.iter_mut() {
                *field = Field::new(field.name.clone());
            }
            fields.clone()
        };
        for field in &cleared {
            self.events.emit(FIELD_UPDATED, field);
        }
    }

    /// Snapshot of the record of `name`.
    pub fn get_field(&self, name: &str) -> Option<Field> {
        self.read(|fields| fields.iter().find(|f| f.name == name).cloned())
    }

    /// Whether a field named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.read(|fields| fields.iter().any(|f| f.name == name))
    }

    /// Known field names in registration order.
    pub fn field_names(&self) -> Vec<String> {
        self.read(|fields| fields.iter().map(|f| f.name.clone()).collect())
    }

    /// Snapshot of every record.
    pub fn fields(&self) -> Vec<Field> {
        self.read(|fields| fields.clone())
    }

    /// Number of registered fields.
    pub fn len(&self) -> usize {
        self.read(Vec::len)
    }

    /// Returns `true` if no field is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// No field shows an error.
    pub fn is_valid(&self) -> bool {
        self.read(|fields| fields.iter().all(Feedbacks::is_valid))
    }

    /// Some field shows an error, warning or info.
    pub fn has_feedbacks(&self) -> bool {
        self.read(|fields| fields.iter().any(Feedbacks::has_feedbacks))
    }

    /// Listen to one of [`FIELD_ADDED`], [`FIELD_REMOVED`], [`FIELD_UPDATED`].
    pub fn add_field_listener<F>(&self, channel: &'static str, listener: F) -> ListenerId
    where
        F: Fn(&Field) + Send + Sync + 'static,
    {
        self.events.add_listener(channel, listener)
    }

    /// Remove a listener from `channel`. Returns `false` for an unknown id.
    pub fn remove_field_listener(&self, channel: &'static str, id: ListenerId) -> bool {
        self.events.remove_listener(channel, id)
    }

    fn read<T>(&self, f: impl FnOnce(&Vec<Field>) -> T) -> T {
        let fields = self.fields.read().unwrap_or_else(PoisonError::into_inner);
        f(&fields)
    }
}
