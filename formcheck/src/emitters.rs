//! Channels shared by every node that hosts rules (form, groups, async rules).

use std::sync::{Arc, Weak};

use futures::future::BoxFuture;

use crate::error::Result;
use crate::event_emitter::{EventEmitter, ListenerId};
use crate::input::InputElement;
use crate::validation::ValidationNode;

pub(crate) const VALIDATE_FIELD_EVENT: &str = "VALIDATE_FIELD_EVENT";
pub(crate) const RESET_EVENT: &str = "RESET_EVENT";
pub(crate) const UNMOUNT_EVENT: &str = "UNMOUNT_EVENT";

/// What a validate listener eventually yields; `None` when the listener
/// ignored the input or was skipped by a stop policy.
pub(crate) type ValidateFuture = BoxFuture<'static, Result<Option<ValidationNode>>>;

/// Reset broadcast down the rule tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResetEvent {
    /// A group starts a new pass: rules forget what they showed.
    Pass,
    /// The form was reset, entirely or for one field.
    Form { field: Option<String> },
}

impl ResetEvent {
    pub(crate) fn targets(&self, field_name: &str) -> bool {
        match self {
            Self::Pass | Self::Form { field: None } => true,
            Self::Form { field: Some(name) } => name == field_name,
        }
    }
}

/// Validate, reset and unmount channels of a rule host.
#[derive(Debug, Default)]
pub(crate) struct RuleEmitters {
    validate: EventEmitter<InputElement, ValidateFuture>,
    reset: EventEmitter<ResetEvent>,
    unmount: EventEmitter<()>,
}

impl RuleEmitters {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a child. The returned registration detaches it again.
    pub(crate) fn register<V, R, U>(
        self: &Arc<Self>,
        on_validate: V,
        on_reset: R,
        on_unmount: U,
    ) -> Registration
    where
        V: Fn(&InputElement) -> ValidateFuture + Send + Sync + 'static,
        R: Fn(&ResetEvent) + Send + Sync + 'static,
        U: Fn(&()) + Send + Sync + 'static,
    {
        Registration {
            host: Arc::downgrade(self),
            validate: self.validate.add_listener(VALIDATE_FIELD_EVENT, on_validate),
            reset: self.reset.add_listener(RESET_EVENT, on_reset),
            unmount: self.unmount.add_listener(UNMOUNT_EVENT, on_unmount),
        }
    }

    /// Validate every child in mount order, each fully settled before the
    /// next starts. Children that ignored the input are left out.
    pub(crate) async fn emit_validate_field(
        &self,
        input: &InputElement,
    ) -> Result<Vec<ValidationNode>> {
        let results = self
            .validate
            .try_emit_serial(VALIDATE_FIELD_EVENT, input)
            .await?;
        Ok(results.into_iter().flatten().collect())
    }

    pub(crate) fn emit_reset(&self, event: &ResetEvent) {
        self.reset.emit(RESET_EVENT, event);
    }

    pub(crate) fn emit_unmount(&self) {
        self.unmount.emit(UNMOUNT_EVENT, &());
    }

    pub(crate) fn child_count(&self) -> usize {
        self.validate.listener_count(VALIDATE_FIELD_EVENT)
    }
}

/// Listener ids of a child on its host.
#[derive(Debug)]
pub(crate) struct Registration {
    host: Weak<RuleEmitters>,
    validate: ListenerId,
    reset: ListenerId,
    unmount: ListenerId,
}

impl Registration {
    pub(crate) fn release(self) {
        if let Some(host) = self.host.upgrade() {
            host.validate.remove_listener(VALIDATE_FIELD_EVENT, self.validate);
            host.reset.remove_listener(RESET_EVENT, self.reset);
            host.unmount.remove_listener(UNMOUNT_EVENT, self.unmount);
        }
    }
}
