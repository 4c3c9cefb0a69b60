//! The form: root of the rule tree and public validation API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

use crate::config::FormConfig;
use crate::emitters::{ResetEvent, RuleEmitters};
use crate::error::{FormError, Result};
use crate::event_emitter::{EventEmitter, ListenerId};
use crate::field::Field;
use crate::field_feedbacks::{FieldFeedbacks, FieldFeedbacksProps, GroupInner};
use crate::fields_store::FieldsStore;
use crate::input::{FieldRef, InputElement, InputResolver};
use crate::validation::{FieldFeedbackValidation, FieldValidation, Feedbacks, flatten};

/// Emitted with the field name right before a field pass starts.
pub const FIELD_WILL_VALIDATE_EVENT: &str = "FIELD_WILL_VALIDATE_EVENT";
/// Emitted with the aggregate result once a field pass has settled.
pub const FIELD_DID_VALIDATE_EVENT: &str = "FIELD_DID_VALIDATE_EVENT";
/// Emitted with the cleared record after a field was reset.
pub const FIELD_DID_RESET_EVENT: &str = "FIELD_DID_RESET_EVENT";

/// Unique identifier of a form instance, used in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormId(Uuid);

impl FormId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for FormId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) struct FormInner {
    pub(crate) id: FormId,
    pub(crate) config: FormConfig,
    resolver: Arc<dyn InputResolver>,
    pub(crate) store: Arc<FieldsStore>,
    /// Top-level groups attach here.
    pub(crate) emitters: Arc<RuleEmitters>,
    pub(crate) will_validate: EventEmitter<String>,
    pub(crate) did_validate: EventEmitter<FieldValidation>,
    did_reset: EventEmitter<Field>,
    group_key_counter: AtomicUsize,
    mounted_groups: Mutex<HashMap<String, usize>>,
    /// Per-field pass sequence, bumped by every field pass and every reset.
    passes: Mutex<HashMap<String, u64>>,
}

impl FormInner {
    /// Next group key; never reused for the lifetime of the form.
    pub(crate) fn next_group_key(&self) -> usize {
        self.group_key_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Sequence number of the newest pass (or reset) of `name`.
    pub(crate) fn current_pass(&self, name: &str) -> u64 {
        let passes = self.passes.lock().unwrap_or_else(PoisonError::into_inner);
        passes.get(name).copied().unwrap_or(0)
    }

    fn begin_pass(&self, name: &str) -> u64 {
        let mut passes = self.passes.lock().unwrap_or_else(PoisonError::into_inner);
        let pass = passes.entry(name.to_string()).or_insert(0);
        *pass += 1;
        *pass
    }

    /// Supersede every in-flight pass of `name`, or of every field.
    fn supersede_passes(&self, name: Option<&str>) {
        let mut passes = self.passes.lock().unwrap_or_else(PoisonError::into_inner);
        match name {
            Some(name) => *passes.entry(name.to_string()).or_insert(0) += 1,
            None => passes.values_mut().for_each(|pass| *pass += 1),
        }
    }

    pub(crate) fn register_field(&self, name: &str) {
        let mut mounted = self.mounted_groups.lock().unwrap_or_else(PoisonError::into_inner);
        *mounted.entry(name.to_string()).or_insert(0) += 1;
        drop(mounted);
        self.store.add_field(name);
    }

    pub(crate) fn unregister_field(&self, name: &str) {
        let mut mounted = self.mounted_groups.lock().unwrap_or_else(PoisonError::into_inner);
        let last = match mounted.get_mut(name) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                mounted.remove(name);
                true
            }
            None => false,
        };
        drop(mounted);
        if last {
            self.store.remove_field(name);
        }
    }
}

/// A form: owns the fields store and the top-level rule groups, and runs
/// validation passes over them.
///
/// `Form` is cheap to clone; clones share the same state.
///
/// # Example
///
/// ```ignore
/// let inputs = Arc::new(InputRegistry::new());
/// inputs.insert(InputElement::new("username", "ab"));
///
/// let form = Form::new(inputs.clone());
/// let username = form.field_feedbacks(FieldFeedbacksProps::for_field("username"))?;
/// username.field_feedback(FieldFeedbackProps::new(When::predicate(|v| v.len() < 3)).message("Too short"))?;
///
/// let results = form.validate_fields(["username"]).await?;
/// assert!(!form.is_valid());
/// ```
#[derive(Clone)]
pub struct Form {
    inner: Arc<FormInner>,
}

impl Form {
    /// Create a form with the default configuration.
    pub fn new(resolver: Arc<dyn InputResolver>) -> Self {
        Self::with_config(resolver, FormConfig::default())
    }

    /// Create a form with the given configuration.
    pub fn with_config(resolver: Arc<dyn InputResolver>, config: FormConfig) -> Self {
        let id = FormId::new();
        log::debug!("Form {}: created with {:?}", id, config);
        Self {
            inner: Arc::new(FormInner {
                id,
                config,
                resolver,
                store: Arc::new(FieldsStore::new()),
                emitters: RuleEmitters::new(),
                will_validate: EventEmitter::new(),
                did_validate: EventEmitter::new(),
                did_reset: EventEmitter::new(),
                group_key_counter: AtomicUsize::new(0),
                mounted_groups: Mutex::new(HashMap::new()),
                passes: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Identifier used in this form's log output.
    pub fn id(&self) -> FormId {
        self.inner.id
    }

    /// The form's configuration.
    pub fn config(&self) -> FormConfig {
        self.inner.config
    }

    /// The fields store backing this form.
    pub fn fields(&self) -> &FieldsStore {
        &self.inner.store
    }

    /// Mount a top-level rule group. `props` must name a field.
    pub fn field_feedbacks(&self, props: FieldFeedbacksProps) -> Result<FieldFeedbacks> {
        let field_name = props.field_name.clone().ok_or(FormError::MissingFieldName)?;
        let group = GroupInner::mount(&self.inner, &self.inner.emitters, None, field_name, props.stop);
        Ok(FieldFeedbacks::from_inner(group))
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Validate the given fields, whether or not they were validated before.
    ///
    /// Each reference is a field name, resolved through the form's
    /// [`InputResolver`], or a snapshot. Every reference is resolved before
    /// any validation starts. Fields without a mounted rule group are left
    /// out of the result.
    pub async fn validate_fields<I, R>(&self, fields: I) -> Result<Vec<FieldValidation>>
    where
        I: IntoIterator<Item = R>,
        R: Into<FieldRef>,
    {
        let refs: Vec<FieldRef> = fields.into_iter().map(Into::into).collect();
        let inputs = self.resolve(refs)?;
        self.validate_inputs(inputs, false).await
    }

    /// Validate every input the resolver knows about.
    pub async fn validate_all_fields(&self) -> Result<Vec<FieldValidation>> {
        let inputs = self.resolve(Vec::new())?;
        self.validate_inputs(inputs, false).await
    }

    /// Validate every field that was not validated since the last reset.
    pub async fn validate_form(&self) -> Result<Vec<FieldValidation>> {
        let inputs = self.resolve(Vec::new())?;
        self.validate_inputs(inputs, true).await
    }

    /// Emit the validate event for `input` straight to the rule tree, without
    /// clearing the store or notifying listeners. Unknown fields, and passes
    /// overtaken by a newer one while an async check was in flight, yield `[]`.
    pub async fn emit_validate_field_event(
        &self,
        input: &InputElement,
    ) -> Result<Vec<FieldFeedbackValidation>> {
        match self.inner.emitters.emit_validate_field(input).await {
            Ok(nodes) => Ok(flatten(nodes)),
            Err(FormError::Superseded(name)) => {
                log::debug!("Form {}: dropped superseded event for '{}'", self.inner.id, name);
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// No field currently shows an error.
    pub fn is_valid(&self) -> bool {
        self.inner.store.is_valid()
    }

    /// Some field currently shows an error, warning or info.
    pub fn has_feedbacks(&self) -> bool {
        self.inner.store.has_feedbacks()
    }

    /// Clear every field and every rule's visible state.
    pub fn reset(&self) {
        log::debug!("Form {}: reset", self.inner.id);
        self.inner.supersede_passes(None);
        self.inner.store.clear();
        self.inner
            .emitters
            .emit_reset(&ResetEvent::Form { field: None });
        for field in self.inner.store.fields() {
            self.inner.did_reset.emit(FIELD_DID_RESET_EVENT, &field);
        }
    }

    /// Reset only the named fields. Unknown names are ignored.
    pub fn reset_fields<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            if !self.inner.store.contains(name) {
                continue;
            }
            log::debug!("Form {}: reset field '{}'", self.inner.id, name);
            self.inner.supersede_passes(Some(name));
            self.inner.store.clear_field(name);
            self.inner.emitters.emit_reset(&ResetEvent::Form {
                field: Some(name.to_string()),
            });
            if let Some(field) = self.inner.store.get_field(name) {
                self.inner.did_reset.emit(FIELD_DID_RESET_EVENT, &field);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Listeners
    // -------------------------------------------------------------------------

    /// Called with the field name right before each field pass.
    pub fn add_field_will_validate_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&String) + Send + Sync + 'static,
    {
        self.inner
            .will_validate
            .add_listener(FIELD_WILL_VALIDATE_EVENT, listener)
    }

    /// Remove a will-validate listener. Returns `false` for an unknown id.
    pub fn remove_field_will_validate_listener(&self, id: ListenerId) -> bool {
        self.inner
            .will_validate
            .remove_listener(FIELD_WILL_VALIDATE_EVENT, id)
    }

    /// Called with each field's result once its pass has settled.
    pub fn add_field_did_validate_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&FieldValidation) + Send + Sync + 'static,
    {
        self.inner
            .did_validate
            .add_listener(FIELD_DID_VALIDATE_EVENT, listener)
    }

    /// Remove a did-validate listener. Returns `false` for an unknown id.
    pub fn remove_field_did_validate_listener(&self, id: ListenerId) -> bool {
        self.inner
            .did_validate
            .remove_listener(FIELD_DID_VALIDATE_EVENT, id)
    }

    /// Called with the cleared record of each reset field.
    pub fn add_field_did_reset_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Field) + Send + Sync + 'static,
    {
        self.inner.did_reset.add_listener(FIELD_DID_RESET_EVENT, listener)
    }

    /// Remove a did-reset listener. Returns `false` for an unknown id.
    pub fn remove_field_did_reset_listener(&self, id: ListenerId) -> bool {
        self.inner
            .did_reset
            .remove_listener(FIELD_DID_RESET_EVENT, id)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn resolve(&self, refs: Vec<FieldRef>) -> Result<Vec<InputElement>> {
        if refs.is_empty() {
            let mut inputs: Vec<InputElement> = Vec::new();
            for input in self.inner.resolver.all() {
                if !inputs.iter().any(|i| i.name == input.name) {
                    inputs.push(input);
                }
            }
            return Ok(inputs);
        }

        refs.into_iter()
            .map(|field| match field {
                FieldRef::Input(input) => Ok(input),
                FieldRef::Name(name) => {
                    let mut matches = self.inner.resolver.matching(&name);
                    match matches.len() {
                        0 => Err(FormError::NotFound(name)),
                        1 => Ok(matches.remove(0)),
                        count => Err(FormError::multiple_matches(name, count)),
                    }
                }
            })
            .collect()
    }

    async fn validate_inputs(
        &self,
        inputs: Vec<InputElement>,
        skip_dirty: bool,
    ) -> Result<Vec<FieldValidation>> {
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            let Some(field) = self.inner.store.get_field(&input.name) else {
                log::trace!(
                    "Form {}: skipping '{}', no rule group mounted",
                    self.inner.id,
                    input.name
                );
                continue;
            };
            if skip_dirty && field.dirty {
                continue;
            }
            if let Some(result) = self.validate_field(input).await? {
                results.push(result);
            }
        }
        Ok(results)
    }

    /// Run one field pass. `None` when a newer pass or a reset of the same
    /// field took over before this one settled; the stale pass then leaves
    /// the store and the did-validate listeners alone.
    async fn validate_field(&self, input: InputElement) -> Result<Option<FieldValidation>> {
        let inner = &self.inner;
        let pass = inner.begin_pass(&input.name);
        log::debug!("Form {}: validating field '{}' (pass {})", inner.id, input.name, pass);

        let message = input.validation_message.clone();
        inner.store.update_with(&input.name, |field| {
            field.clear_validations();
            field.dirty = true;
            field.validation_message = message;
        });
        inner
            .will_validate
            .emit(FIELD_WILL_VALIDATE_EVENT, &input.name);

        let nodes = match inner.emitters.emit_validate_field(&input).await {
            Ok(nodes) => nodes,
            Err(FormError::Superseded(name)) => {
                log::debug!("Form {}: pass {} of '{}' superseded", inner.id, pass, name);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let validations = flatten(nodes);

        if inner.config.check_consistency {
            let stored = inner
                .store
                .get_field(&input.name)
                .map(|field| field.validations)
                .unwrap_or_default();
            if stored != validations {
                log::warn!(
                    "Form {}: field '{}' store holds {:?} but the rule tree reported {:?}",
                    inner.id,
                    input.name,
                    stored,
                    validations
                );
            }
        }

        let result = FieldValidation::new(input.name, validations);
        inner.did_validate.emit(FIELD_DID_VALIDATE_EVENT, &result);
        log::debug!(
            "Form {}: field '{}' validated, valid={}",
            inner.id,
            result.name,
            result.is_valid()
        );
        Ok(Some(result))
    }
}

impl std::fmt::Debug for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Form")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("fields", &self.inner.store.field_names())
            .finish()
    }
}
