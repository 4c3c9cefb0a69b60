//! Single feedback rules.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use futures::FutureExt;
use futures::future;

use crate::emitters::{Registration, ResetEvent, RuleEmitters};
use crate::error::{FormError, Result};
use crate::event_emitter::ListenerId;
use crate::field_feedbacks::GroupInner;
use crate::form::{FIELD_DID_VALIDATE_EVENT, FIELD_WILL_VALIDATE_EVENT, FormInner};
use crate::input::{InputElement, ValidityFlag};
use crate::validation::{FieldFeedbackType, FieldFeedbackValidation, Feedbacks, ValidationNode};

/// Predicate over the raw field value.
pub type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Condition under which a rule is shown.
#[derive(Clone)]
pub enum When {
    /// Any native-style constraint fails (`"*"`).
    AnyInvalid,
    /// The field is invalid and this flag is set (`"valueMissing"`, ...).
    Constraint(ValidityFlag),
    /// Custom check of the value, independent of the validity flags.
    Predicate(Predicate),
    /// Shown once the whole field ends up valid (`"valid"`).
    Valid,
}

impl When {
    /// Shown when `f` returns `true` for the field value.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Parse a condition token: `*`, `valid` or a validity flag name.
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "*" => Ok(Self::AnyInvalid),
            "valid" => Ok(Self::Valid),
            flag => flag.parse().map(Self::Constraint),
        }
    }

    // Predicates only match when they are the very same closure.
    fn same_shape(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::AnyInvalid, Self::AnyInvalid) | (Self::Valid, Self::Valid) => true,
            (Self::Constraint(a), Self::Constraint(b)) => a == b,
            (Self::Predicate(a), Self::Predicate(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl FromStr for When {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<ValidityFlag> for When {
    fn from(flag: ValidityFlag) -> Self {
        Self::Constraint(flag)
    }
}

impl fmt::Debug for When {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyInvalid => f.write_str("AnyInvalid"),
            Self::Constraint(flag) => f.debug_tuple("Constraint").field(flag).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::Valid => f.write_str("Valid"),
        }
    }
}

/// Declaration of a rule.
///
/// ```ignore
/// FieldFeedbackProps::new(When::predicate(|v| v.is_empty())).message("Cannot be empty");
/// FieldFeedbackProps::parse("typeMismatch")?.warning();
/// FieldFeedbackProps::new(When::Valid).message("Looks good!");
/// ```
#[derive(Debug, Clone)]
pub struct FieldFeedbackProps {
    when: When,
    severity: Option<FieldFeedbackType>,
    message: Option<String>,
}

impl FieldFeedbackProps {
    /// A rule with the default severity (error, or the valid marker for
    /// [`When::Valid`]).
    pub fn new(when: impl Into<When>) -> Self {
        Self {
            when: when.into(),
            severity: None,
            message: None,
        }
    }

    /// A rule whose condition is given as a token, see [`When::parse`].
    pub fn parse(token: &str) -> Result<Self> {
        When::parse(token).map(Self::new)
    }

    /// Show as an error.
    pub fn error(mut self) -> Self {
        self.severity = Some(FieldFeedbackType::Error);
        self
    }

    /// Show as a warning.
    pub fn warning(mut self) -> Self {
        self.severity = Some(FieldFeedbackType::Warning);
        self
    }

    /// Show as an info.
    pub fn info(mut self) -> Self {
        self.severity = Some(FieldFeedbackType::Info);
        self
    }

    /// Text shown instead of the input's validation message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The rule's condition.
    pub fn when(&self) -> &When {
        &self.when
    }

    fn kind(&self) -> Result<FieldFeedbackType> {
        match (&self.when, self.severity) {
            (When::Valid, Some(_)) => Err(FormError::ValidWithSeverity),
            (When::Valid, None) => Ok(FieldFeedbackType::WhenValid),
            (_, severity) => Ok(severity.unwrap_or(FieldFeedbackType::Error)),
        }
    }

    /// Same condition, severity and message: a mounted rule can be kept.
    pub(crate) fn same_element(&self, other: &Self) -> bool {
        self.when.same_shape(&other.when)
            && self.severity == other.severity
            && self.message == other.message
    }
}

/// What a rule currently displays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleState {
    /// Outcome of the last pass that reached the rule.
    pub validation: Option<FieldFeedbackValidation>,
    /// Text to display when shown.
    pub text: Option<String>,
    /// Aggregate validity of the field, tracked by valid markers only.
    pub field_is_valid: Option<bool>,
}

pub(crate) struct RuleInner {
    key: String,
    when: When,
    kind: FieldFeedbackType,
    message: Option<String>,
    group: Weak<GroupInner>,
    state: RwLock<RuleState>,
    registration: Mutex<Option<Registration>>,
    form_listeners: Mutex<Option<(Weak<FormInner>, ListenerId, ListenerId)>>,
}

impl RuleInner {
    /// Mount under `group`, attached to `host` (the group itself or an async
    /// rule inside it).
    pub(crate) fn mount(
        group: &Arc<GroupInner>,
        host: &Arc<RuleEmitters>,
        props: FieldFeedbackProps,
    ) -> Result<Arc<Self>> {
        let kind = props.kind()?;
        let rule = Arc::new(Self {
            key: group.next_rule_key(),
            when: props.when,
            kind,
            message: props.message,
            group: Arc::downgrade(group),
            state: RwLock::new(RuleState::default()),
            registration: Mutex::new(None),
            form_listeners: Mutex::new(None),
        });

        let on_validate = Arc::clone(&rule);
        let on_reset = Arc::clone(&rule);
        let on_unmount = Arc::clone(&rule);
        let registration = host.register(
            move |input: &InputElement| future::ready(on_validate.validate(input)).boxed(),
            move |event| on_reset.reset(event),
            move |_| on_unmount.unmount(),
        );
        *rule
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(registration);

        if kind == FieldFeedbackType::WhenValid {
            if let Some(form) = group.form.upgrade() {
                rule.listen_field_validity(&form, group.field_name());
            }
        }

        log::trace!("FieldFeedback {}: mounted ({:?}, {:?})", rule.key, rule.kind, rule.when);
        Ok(rule)
    }

    fn listen_field_validity(self: &Arc<Self>, form: &Arc<FormInner>, field_name: &str) {
        let weak = Arc::downgrade(self);
        let name = field_name.to_string();
        let will = form
            .will_validate
            .add_listener(FIELD_WILL_VALIDATE_EVENT, move |validating: &String| {
                if *validating == name {
                    if let Some(rule) = weak.upgrade() {
                        rule.update_state(|state| state.field_is_valid = None);
                    }
                }
            });

        let weak = Arc::downgrade(self);
        let name = field_name.to_string();
        let did = form
            .did_validate
            .add_listener(FIELD_DID_VALIDATE_EVENT, move |field| {
                if field.name == name {
                    if let Some(rule) = weak.upgrade() {
                        let valid = field.is_valid();
                        rule.update_state(|state| state.field_is_valid = Some(valid));
                    }
                }
            });

        *self
            .form_listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((Arc::downgrade(form), will, did));
    }

    fn validate(&self, input: &InputElement) -> Result<Option<ValidationNode>> {
        let Some(group) = self.group.upgrade() else {
            return Ok(None);
        };
        if input.name != group.field_name() {
            return Ok(None);
        }

        let show = if group.should_stop() {
            None
        } else {
            self.evaluate(input)
        };
        let validation = FieldFeedbackValidation::new(self.key.clone(), self.kind, show);
        log::trace!(
            "FieldFeedback {}: '{}' -> {:?}",
            self.key,
            input.name,
            validation.show
        );

        group.merge(std::slice::from_ref(&validation));
        group
            .store
            .add_or_replace_validation(group.field_name(), validation.clone());

        let text = self
            .message
            .clone()
            .unwrap_or_else(|| input.validation_message.clone());
        let stored = validation.clone();
        self.update_state(move |state| {
            state.validation = Some(stored);
            state.text = Some(text);
        });

        Ok(Some(ValidationNode::Leaf(validation)))
    }

    fn evaluate(&self, input: &InputElement) -> Option<bool> {
        let validity = &input.validity;
        match &self.when {
            When::Valid => None,
            When::AnyInvalid => Some(!validity.valid),
            When::Constraint(flag) => Some(!validity.valid && validity.get(*flag)),
            When::Predicate(predicate) => Some(predicate(&input.value)),
        }
    }

    fn reset(&self, event: &ResetEvent) {
        let form_reset = matches!(event, ResetEvent::Form { .. });
        self.update_state(|state| {
            state.validation = None;
            state.text = None;
            if form_reset {
                state.field_is_valid = None;
            }
        });
    }

    fn unmount(&self) {
        let registration = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(registration) = registration else {
            return;
        };
        registration.release();

        let listeners = self
            .form_listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((form, will, did)) = listeners {
            if let Some(form) = form.upgrade() {
                form.will_validate.remove_listener(FIELD_WILL_VALIDATE_EVENT, will);
                form.did_validate.remove_listener(FIELD_DID_VALIDATE_EVENT, did);
            }
        }
        log::trace!("FieldFeedback {}: unmounted", self.key);
    }

    fn update_state(&self, f: impl FnOnce(&mut RuleState)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    fn state(&self) -> RuleState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_mounted(&self) -> bool {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Handle to a mounted rule; the rendering side reads its state from here.
#[derive(Clone)]
pub struct FieldFeedback {
    inner: Arc<RuleInner>,
}

impl FieldFeedback {
    pub(crate) fn from_inner(inner: Arc<RuleInner>) -> Self {
        Self { inner }
    }

    /// Stable key, `"{group key}.{n}"`.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Severity, or [`FieldFeedbackType::WhenValid`] for the valid marker.
    pub fn kind(&self) -> FieldFeedbackType {
        self.inner.kind
    }

    /// The rule's condition.
    pub fn when(&self) -> &When {
        &self.inner.when
    }

    /// Custom text, if one was declared.
    pub fn message(&self) -> Option<&str> {
        self.inner.message.as_deref()
    }

    /// Snapshot of the rule's visible state.
    pub fn state(&self) -> RuleState {
        self.inner.state()
    }

    /// Outcome of the last pass that reached this rule.
    pub fn validation(&self) -> Option<FieldFeedbackValidation> {
        self.inner.state().validation
    }

    /// Whether the rule is visible. A valid marker is visible when it was
    /// reached by the last pass and the field ended up valid.
    pub fn is_shown(&self) -> bool {
        let state = self.inner.state();
        match self.inner.kind {
            FieldFeedbackType::WhenValid => {
                state.validation.is_some() && state.field_is_valid == Some(true)
            }
            _ => state.validation.is_some_and(|v| v.is_shown()),
        }
    }

    /// Text to display, if the rule is visible.
    pub fn text(&self) -> Option<String> {
        if self.is_shown() {
            self.inner.state().text
        } else {
            None
        }
    }

    /// Detach the rule from its group.
    pub fn unmount(&self) {
        self.inner.unmount();
    }

    /// Whether the rule is still attached to its group.
    pub fn is_mounted(&self) -> bool {
        self.inner.is_mounted()
    }
}

impl fmt::Debug for FieldFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldFeedback")
            .field("key", &self.inner.key)
            .field("kind", &self.inner.kind)
            .field("when", &self.inner.when)
            .finish()
    }
}
