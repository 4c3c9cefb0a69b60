//! Declarative form validation engine
//!
//! Rules are declared as a tree attached to named fields: a [`Form`] holds
//! top-level [`FieldFeedbacks`] groups, which hold [`FieldFeedback`] rules,
//! [`AsyncFeedback`] rules and nested groups. Validating a field walks that
//! tree in mount order, honors each group's [`Stop`] policy, and records
//! which feedbacks are shown in the form's [`FieldsStore`].

pub mod async_feedback;
pub mod config;
pub mod constraints;
pub mod error;
pub mod event_emitter;
pub mod field;
pub mod field_feedback;
pub mod field_feedbacks;
pub mod fields_store;
pub mod form;
pub mod input;
pub mod validation;

mod emitters;

pub use async_feedback::{ASYNC_STATUS_EVENT, AsyncFeedback, AsyncFeedbackProps, AsyncStatus};
pub use config::{FormConfig, StaleAsyncPolicy};
pub use constraints::{InputConstraints, InputKind};
pub use error::{FormError, Result};
pub use event_emitter::{EventEmitter, ListenerId};
pub use field::Field;
pub use field_feedback::{FieldFeedback, FieldFeedbackProps, Predicate, RuleState, When};
pub use field_feedbacks::{FieldFeedbacks, FieldFeedbacksProps, Stop};
pub use fields_store::{FIELD_ADDED, FIELD_REMOVED, FIELD_UPDATED, FieldsStore};
pub use form::{
    FIELD_DID_RESET_EVENT, FIELD_DID_VALIDATE_EVENT, FIELD_WILL_VALIDATE_EVENT, Form, FormId,
};
pub use input::{FieldRef, InputElement, InputRegistry, InputResolver, ValidityFlag, ValidityState};
pub use validation::{
    FieldFeedbackType, FieldFeedbackValidation, FieldValidation, Feedbacks, ValidationNode,
    flatten,
};
