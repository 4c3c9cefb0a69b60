//! Rule groups: ordered, nestable collections of rules for one field.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use futures::FutureExt;

use crate::async_feedback::{AsyncFeedback, AsyncFeedbackProps, AsyncInner};
use crate::emitters::{Registration, ResetEvent, RuleEmitters};
use crate::error::{FormError, Result};
use crate::field_feedback::{FieldFeedback, FieldFeedbackProps, RuleInner};
use crate::fields_store::FieldsStore;
use crate::form::FormInner;
use crate::input::InputElement;
use crate::validation::{
    FieldFeedbackValidation, Feedbacks, ValidationNode, add_or_replace, flatten,
};

/// When a group stops evaluating its remaining children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Stop {
    /// Evaluate every child.
    No,
    /// Stop once anything is shown.
    First,
    /// Stop once an error is shown.
    #[default]
    FirstError,
    /// Stop once a warning is shown.
    FirstWarning,
    /// Stop once an info is shown.
    FirstInfo,
}

impl Stop {
    /// Whether the outcomes seen so far mean the next child must be skipped.
    pub fn is_satisfied_by<F: Feedbacks + ?Sized>(&self, seen: &F) -> bool {
        match self {
            Self::No => false,
            Self::First => seen.has_feedbacks(),
            Self::FirstError => seen.has_errors(),
            Self::FirstWarning => seen.has_warnings(),
            Self::FirstInfo => seen.has_infos(),
        }
    }

    /// The token used by `Display` and `FromStr`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::No => "no",
            Self::First => "first",
            Self::FirstError => "first-error",
            Self::FirstWarning => "first-warning",
            Self::FirstInfo => "first-info",
        }
    }
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stop {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "no" => Ok(Self::No),
            "first" => Ok(Self::First),
            "first-error" => Ok(Self::FirstError),
            "first-warning" => Ok(Self::FirstWarning),
            "first-info" => Ok(Self::FirstInfo),
            other => Err(format!("unknown stop policy '{other}'")),
        }
    }
}

/// Declaration of a rule group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldFeedbacksProps {
    /// Required on a top-level group, forbidden on a nested one.
    pub field_name: Option<String>,
    pub stop: Stop,
}

impl FieldFeedbacksProps {
    /// Props without a field name, as nested groups take them.
    pub fn new() -> Self {
        Self::default()
    }

    /// Props for a top-level group on `field_name`.
    pub fn for_field(field_name: impl Into<String>) -> Self {
        Self {
            field_name: Some(field_name.into()),
            ..Self::default()
        }
    }

    /// Set the field name.
    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    /// Set the stop policy.
    pub fn stop(mut self, stop: Stop) -> Self {
        self.stop = stop;
        self
    }
}

pub(crate) struct GroupInner {
    key: usize,
    field_name: String,
    stop: Stop,
    pub(crate) form: Weak<FormInner>,
    pub(crate) store: Arc<FieldsStore>,
    parent: Option<Weak<GroupInner>>,
    rule_key_counter: AtomicUsize,
    /// Outcomes of the current pass, as far as it got.
    last_validation: RwLock<Vec<FieldFeedbackValidation>>,
    /// Children attach here.
    pub(crate) emitters: Arc<RuleEmitters>,
    registration: Mutex<Option<Registration>>,
}

impl GroupInner {
    pub(crate) fn mount(
        form: &Arc<FormInner>,
        host: &Arc<RuleEmitters>,
        parent: Option<&Arc<GroupInner>>,
        field_name: String,
        stop: Stop,
    ) -> Arc<Self> {
        let key = form.next_group_key();
        if parent.is_none() {
            form.register_field(&field_name);
        }

        let group = Arc::new(Self {
            key,
            field_name,
            stop,
            form: Arc::downgrade(form),
            store: Arc::clone(&form.store),
            parent: parent.map(Arc::downgrade),
            rule_key_counter: AtomicUsize::new(0),
            last_validation: RwLock::new(Vec::new()),
            emitters: RuleEmitters::new(),
            registration: Mutex::new(None),
        });

        let on_validate = Arc::clone(&group);
        let on_reset = Arc::clone(&group);
        let on_unmount = Arc::clone(&group);
        let registration = host.register(
            move |input: &InputElement| {
                let group = Arc::clone(&on_validate);
                let input = input.clone();
                async move { group.validate(input).await }.boxed()
            },
            move |event| on_reset.reset(event),
            move |_| on_unmount.unmount(),
        );
        *group
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(registration);

        log::debug!(
            "FieldFeedbacks {}: mounted for '{}' (stop={}, nested={})",
            group.key,
            group.field_name,
            group.stop,
            group.parent.is_some()
        );
        group
    }

    pub(crate) fn key(&self) -> usize {
        self.key
    }

    pub(crate) fn field_name(&self) -> &str {
        &self.field_name
    }

    /// `"{group key}.{n}"`, `n` counting every rule ever created here.
    pub(crate) fn next_rule_key(&self) -> String {
        let n = self.rule_key_counter.fetch_add(1, Ordering::SeqCst);
        format!("{}.{}", self.key, n)
    }

    /// Sequence number of the form's newest pass of this field.
    pub(crate) fn current_pass(&self) -> Option<u64> {
        self.form
            .upgrade()
            .map(|form| form.current_pass(&self.field_name))
    }

    /// Whether this group's own stop policy says its next child is skipped.
    pub(crate) fn should_stop(&self) -> bool {
        let seen = self
            .last_validation
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        self.stop.is_satisfied_by(&*seen)
    }

    pub(crate) fn merge(&self, validations: &[FieldFeedbackValidation]) {
        let mut seen = self
            .last_validation
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for validation in validations {
            add_or_replace(&mut seen, validation.clone());
        }
    }

    fn last_validation(&self) -> Vec<FieldFeedbackValidation> {
        self.last_validation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear_last_validation(&self) {
        self.last_validation
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    async fn validate(self: Arc<Self>, input: InputElement) -> Result<Option<ValidationNode>> {
        if input.name != self.field_name {
            return Ok(None);
        }

        self.clear_last_validation();
        self.emitters.emit_reset(&ResetEvent::Pass);

        // The parent decides from everything its earlier children showed.
        let parent = self.parent.as_ref().and_then(Weak::upgrade);
        if let Some(parent) = &parent {
            if parent.should_stop() {
                log::trace!(
                    "FieldFeedbacks {}: skipped by parent {} (stop={})",
                    self.key,
                    parent.key,
                    parent.stop
                );
                return Ok(None);
            }
        }

        let nodes = self.emitters.emit_validate_field(&input).await?;
        let validations = flatten(nodes);
        if let Some(parent) = &parent {
            parent.merge(&validations);
        }

        Ok(Some(ValidationNode::Group(
            validations.into_iter().map(ValidationNode::Leaf).collect(),
        )))
    }

    fn reset(&self, event: &ResetEvent) {
        if !event.targets(&self.field_name) {
            return;
        }
        if matches!(event, ResetEvent::Form { .. }) {
            self.clear_last_validation();
        }
        self.emitters.emit_reset(event);
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
        self.emitters.emit_unmount();

        if self.parent.is_none() {
            if let Some(form) = self.form.upgrade() {
                form.unregister_field(&self.field_name);
            }
        }
        log::debug!(
            "FieldFeedbacks {}: unmounted from '{}'",
            self.key,
            self.field_name
        );
    }

    fn is_mounted(&self) -> bool {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Handle to a mounted rule group.
///
/// Rules, async rules and nested groups are mounted through the handle and
/// are evaluated in mount order. The group stays mounted (and keeps its
/// children alive) until [`unmount`](Self::unmount) is called, even if every
/// handle is dropped.
#[derive(Clone)]
pub struct FieldFeedbacks {
    inner: Arc<GroupInner>,
}

impl FieldFeedbacks {
    pub(crate) fn from_inner(inner: Arc<GroupInner>) -> Self {
        Self { inner }
    }

    /// Group key, unique within the form.
    pub fn key(&self) -> usize {
        self.inner.key
    }

    /// Name of the field this group validates.
    pub fn field_name(&self) -> &str {
        &self.inner.field_name
    }

    /// The group's stop policy.
    pub fn stop(&self) -> Stop {
        self.inner.stop
    }

    /// Outcomes gathered by the current (or last) pass.
    pub fn last_validation(&self) -> Vec<FieldFeedbackValidation> {
        self.inner.last_validation()
    }

    /// Number of direct children currently mounted.
    pub fn child_count(&self) -> usize {
        self.inner.emitters.child_count()
    }

    /// Mount a nested group. It inherits this group's field name.
    pub fn field_feedbacks(&self, props: FieldFeedbacksProps) -> Result<FieldFeedbacks> {
        if let Some(name) = props.field_name {
            return Err(FormError::NestedFieldName(name));
        }
        let form = self.form()?;
        let group = GroupInner::mount(
            &form,
            &self.inner.emitters,
            Some(&self.inner),
            self.inner.field_name.clone(),
            props.stop,
        );
        Ok(FieldFeedbacks::from_inner(group))
    }

    /// Mount a rule.
    pub fn field_feedback(&self, props: FieldFeedbackProps) -> Result<FieldFeedback> {
        let rule = RuleInner::mount(&self.inner, &self.inner.emitters, props)?;
        Ok(FieldFeedback::from_inner(rule))
    }

    /// Mount an async rule.
    pub fn async_feedback<T, E>(&self, props: AsyncFeedbackProps<T, E>) -> Result<AsyncFeedback<T, E>>
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let form = self.form()?;
        let inner = AsyncInner::mount(&self.inner, &self.inner.emitters, form.config.stale_async, props);
        Ok(AsyncFeedback::from_inner(inner))
    }

    /// Detach the group and everything mounted under it.
    pub fn unmount(&self) {
        self.inner.unmount();
    }

    /// Whether the group is still attached to the form.
    pub fn is_mounted(&self) -> bool {
        self.inner.is_mounted()
    }

    fn form(&self) -> Result<Arc<FormInner>> {
        self.inner
            .form
            .upgrade()
            .ok_or_else(|| FormError::Detached(self.inner.field_name.clone()))
    }
}

impl fmt::Debug for FieldFeedbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldFeedbacks")
            .field("key", &self.inner.key)
            .field("field_name", &self.inner.field_name)
            .field("stop", &self.inner.stop)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldFeedbackType;

    fn outcome(kind: FieldFeedbackType, show: Option<bool>) -> FieldFeedbackValidation {
        FieldFeedbackValidation::new("0.0", kind, show)
    }

    #[test]
    fn test_stop_policies() {
        let error = vec![outcome(FieldFeedbackType::Error, Some(true))];
        let hidden_error = vec![outcome(FieldFeedbackType::Error, Some(false))];
        let info = vec![outcome(FieldFeedbackType::Info, Some(true))];

        assert!(!Stop::No.is_satisfied_by(&error));
        assert!(Stop::First.is_satisfied_by(&error));
        assert!(Stop::First.is_satisfied_by(&info));
        assert!(!Stop::First.is_satisfied_by(&hidden_error));
        assert!(Stop::FirstError.is_satisfied_by(&error));
        assert!(!Stop::FirstError.is_satisfied_by(&info));
        assert!(!Stop::FirstWarning.is_satisfied_by(&error));
        assert!(Stop::FirstInfo.is_satisfied_by(&info));
    }

    #[test]
    fn test_stop_parse() {
        assert_eq!("first-warning".parse::<Stop>(), Ok(Stop::FirstWarning));
        assert_eq!(Stop::default(), Stop::FirstError);
        assert!("sometimes".parse::<Stop>().is_err());
        assert_eq!(Stop::FirstInfo.to_string(), "first-info");
    }
}
