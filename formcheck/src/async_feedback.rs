//! Async rules: feedback that depends on a caller-supplied async check.
//!
//! An async rule sits inside a rule group like any other child. When a pass
//! reaches it, it switches to [`AsyncStatus::Pending`], awaits the check with
//! the field value, then mounts the rules produced by its `then` (or `catch`)
//! render function and validates them. Rules that keep the same shape from
//! one resolution to the next keep their key; anything else is unmounted and
//! replaced by freshly keyed rules.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::config::StaleAsyncPolicy;
use crate::emitters::{Registration, ResetEvent, RuleEmitters};
use crate::error::{FormError, Result};
use crate::event_emitter::{EventEmitter, ListenerId};
use crate::field_feedback::{FieldFeedback, FieldFeedbackProps, RuleInner};
use crate::field_feedbacks::GroupInner;
use crate::input::InputElement;
use crate::validation::{ValidationNode, flatten};

/// Emitted with the new status every time an async rule changes status.
pub const ASYNC_STATUS_EVENT: &str = "ASYNC_STATUS_EVENT";

/// Status of an async rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncStatus<T, E> {
    /// Not run since mount or the last reset.
    None,
    /// Check in flight.
    Pending,
    /// Check succeeded with a value.
    Resolved(T),
    /// Check failed; an ordinary outcome, not an engine error.
    Rejected(E),
}

impl<T, E> Default for AsyncStatus<T, E> {
    fn default() -> Self {
        Self::None
    }
}

impl<T, E> AsyncStatus<T, E> {
    /// Returns `true` if the rule has not run since mount or the last reset.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns `true` while the check is in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns `true` if the check succeeded.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Returns `true` if the check failed.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// The resolved value, if any.
    pub fn as_resolved(&self) -> Option<&T> {
        match self {
            Self::Resolved(value) => Some(value),
            _ => None,
        }
    }

    /// The rejection error, if any.
    pub fn as_rejected(&self) -> Option<&E> {
        match self {
            Self::Rejected(error) => Some(error),
            _ => None,
        }
    }
}

type Check<T, E> = Arc<dyn Fn(String) -> BoxFuture<'static, std::result::Result<T, E>> + Send + Sync>;
type Render<V> = Arc<dyn Fn(&V) -> Vec<FieldFeedbackProps> + Send + Sync>;

/// Declaration of an async rule.
///
/// ```ignore
/// AsyncFeedbackProps::new(|username: String| async move { api.is_available(&username).await })
///     .then(|available: &bool| {
///         if *available {
///             vec![FieldFeedbackProps::new(When::predicate(|_| true)).info().message("Username available")]
///         } else {
///             vec![FieldFeedbackProps::new(When::predicate(|_| true)).message("Username already taken")]
///         }
///     })
///     .catch(|err: &ApiError| vec![FieldFeedbackProps::new(When::predicate(|_| true)).warning().message(err.to_string())]);
/// ```
pub struct AsyncFeedbackProps<T, E> {
    check: Check<T, E>,
    then: Option<Render<T>>,
    catch: Option<Render<E>>,
}

impl<T, E> AsyncFeedbackProps<T, E> {
    /// An async rule running `check` on the field value.
    pub fn new<F, Fut>(check: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        Self {
            check: Arc::new(move |value| check(value).boxed()),
            then: None,
            catch: None,
        }
    }

    /// Rules to mount once the check resolved.
    pub fn then<F>(mut self, render: F) -> Self
    where
        F: Fn(&T) -> Vec<FieldFeedbackProps> + Send + Sync + 'static,
    {
        self.then = Some(Arc::new(render));
        self
    }

    /// Rules to mount once the check was rejected.
    pub fn catch<F>(mut self, render: F) -> Self
    where
        F: Fn(&E) -> Vec<FieldFeedbackProps> + Send + Sync + 'static,
    {
        self.catch = Some(Arc::new(render));
        self
    }
}

impl<T, E> Clone for AsyncFeedbackProps<T, E> {
    fn clone(&self) -> Self {
        Self {
            check: Arc::clone(&self.check),
            then: self.then.clone(),
            catch: self.catch.clone(),
        }
    }
}

pub(crate) struct AsyncInner<T, E> {
    props: AsyncFeedbackProps<T, E>,
    group: Weak<GroupInner>,
    stale_async: StaleAsyncPolicy,
    /// Rules produced by `then` / `catch` attach here.
    emitters: Arc<RuleEmitters>,
    status: RwLock<AsyncStatus<T, E>>,
    status_events: EventEmitter<AsyncStatus<T, E>>,
    /// Bumped by every check started and every form reset.
    invocation: AtomicU64,
    children: Mutex<Vec<(FieldFeedbackProps, FieldFeedback)>>,
    registration: Mutex<Option<Registration>>,
}

impl<T, E> AsyncInner<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn mount(
        group: &Arc<GroupInner>,
        host: &Arc<RuleEmitters>,
        stale_async: StaleAsyncPolicy,
        props: AsyncFeedbackProps<T, E>,
    ) -> Arc<Self> {
        let rule = Arc::new(Self {
            props,
            group: Arc::downgrade(group),
            stale_async,
            emitters: RuleEmitters::new(),
            status: RwLock::new(AsyncStatus::None),
            status_events: EventEmitter::new(),
            invocation: AtomicU64::new(0),
            children: Mutex::new(Vec::new()),
            registration: Mutex::new(None),
        });

        let on_validate = Arc::clone(&rule);
        let on_reset = Arc::clone(&rule);
        let on_unmount = Arc::clone(&rule);
        let registration = host.register(
            move |input: &InputElement| {
                let rule = Arc::clone(&on_validate);
                let input = input.clone();
                async move { rule.validate(input).await }.boxed()
            },
            move |event| on_reset.reset(event),
            move |_| on_unmount.unmount(),
        );
        *rule
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(registration);

        log::debug!(
            "Async: mounted under FieldFeedbacks {} for '{}'",
            group.key(),
            group.field_name()
        );
        rule
    }

    async fn validate(self: Arc<Self>, input: InputElement) -> Result<Option<ValidationNode>> {
        let Some(group) = self.group.upgrade() else {
            return Ok(None);
        };
        if input.name != group.field_name() || group.should_stop() {
            return Ok(None);
        }

        let invocation = self.invocation.fetch_add(1, Ordering::SeqCst) + 1;
        let pass = group.current_pass();
        self.set_status(AsyncStatus::Pending);

        let outcome = (self.props.check)(input.value.clone()).await;

        let stale = self.invocation.load(Ordering::SeqCst) != invocation
            || group.current_pass() != pass;
        if stale {
            match self.stale_async {
                StaleAsyncPolicy::Discard => {
                    // Fails the rest of the pass; siblings must not run on the old value.
                    log::warn!(
                        "Async: dropping stale result for '{}' (invocation {})",
                        input.name,
                        invocation
                    );
                    return Err(FormError::Superseded(input.name));
                }
                StaleAsyncPolicy::Apply => {
                    log::debug!(
                        "Async: applying stale result for '{}' (invocation {})",
                        input.name,
                        invocation
                    );
                }
            }
        }

        let (status, props) = match outcome {
            Ok(value) => {
                let props = self.props.then.as_ref().map(|render| render(&value));
                (AsyncStatus::Resolved(value), props.unwrap_or_default())
            }
            Err(error) => {
                let props = self.props.catch.as_ref().map(|render| render(&error));
                (AsyncStatus::Rejected(error), props.unwrap_or_default())
            }
        };
        self.set_status(status);
        self.reconcile(&group, props)?;

        let nodes = self.emitters.emit_validate_field(&input).await?;
        let validations = flatten(nodes);
        group.merge(&validations);

        Ok(Some(ValidationNode::Group(
            validations.into_iter().map(ValidationNode::Leaf).collect(),
        )))
    }

    /// Keep the leading children whose props did not change, replace the rest.
    fn reconcile(&self, group: &Arc<GroupInner>, props: Vec<FieldFeedbackProps>) -> Result<()> {
        let mut children = self
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let kept = children
            .iter()
            .zip(&props)
            .take_while(|((old, _), new)| old.same_element(new))
            .count();

        for (_, rule) in children.drain(kept..) {
            rule.unmount();
        }
        for props in props.into_iter().skip(kept) {
            let rule = RuleInner::mount(group, &self.emitters, props.clone())?;
            children.push((props, FieldFeedback::from_inner(rule)));
        }
        Ok(())
    }

    fn set_status(&self, status: AsyncStatus<T, E>) {
        {
            let mut current = self.status.write().unwrap_or_else(PoisonError::into_inner);
            *current = status.clone();
        }
        self.status_events.emit(ASYNC_STATUS_EVENT, &status);
    }

    fn status(&self) -> AsyncStatus<T, E> {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn reset(&self, event: &ResetEvent) {
        if matches!(event, ResetEvent::Form { .. }) {
            // In-flight checks must not resurrect a reset rule.
            self.invocation.fetch_add(1, Ordering::SeqCst);
            self.set_status(AsyncStatus::None);
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
        self.children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        log::debug!("Async: unmounted");
    }

    fn children(&self) -> Vec<FieldFeedback> {
        self.children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, rule)| rule.clone())
            .collect()
    }

    fn is_mounted(&self) -> bool {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Handle to a mounted async rule.
pub struct AsyncFeedback<T, E> {
    inner: Arc<AsyncInner<T, E>>,
}

impl<T, E> AsyncFeedback<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn from_inner(inner: Arc<AsyncInner<T, E>>) -> Self {
        Self { inner }
    }

    /// Current status.
    pub fn status(&self) -> AsyncStatus<T, E> {
        self.inner.status()
    }

    /// Called with every status the rule goes through, `Pending` included.
    pub fn add_status_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&AsyncStatus<T, E>) + Send + Sync + 'static,
    {
        self.inner
            .status_events
            .add_listener(ASYNC_STATUS_EVENT, listener)
    }

    /// Remove a status listener. Returns `false` for an unknown id.
    pub fn remove_status_listener(&self, id: ListenerId) -> bool {
        self.inner
            .status_events
            .remove_listener(ASYNC_STATUS_EVENT, id)
    }

    /// Rules currently mounted from the last resolution.
    pub fn children(&self) -> Vec<FieldFeedback> {
        self.inner.children()
    }

    /// Detach the rule and the rules it rendered.
    pub fn unmount(&self) {
        self.inner.unmount();
    }

    /// Whether the rule is still attached to its group.
    pub fn is_mounted(&self) -> bool {
        self.inner.is_mounted()
    }
}

impl<T, E> Clone for AsyncFeedback<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for AsyncFeedback<T, E>
where
    T: fmt::Debug + Clone,
    E: fmt::Debug + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self
            .inner
            .status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        f.debug_struct("AsyncFeedback")
            .field("status", &status)
            .finish()
    }
}
