//! Error types for form validation.

/// Errors raised by the validation engine.
///
/// Usage errors describe a rule tree that was declared wrongly, lookup errors
/// come from resolving field names to inputs. Both fail fast and propagate
/// to the caller of the public operation that triggered them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    /// A top-level `FieldFeedbacks` was mounted without a field name.
    #[error("FieldFeedbacks mounted on a form needs a field name")]
    MissingFieldName,

    /// A nested `FieldFeedbacks` declared its own field name.
    #[error("Nested FieldFeedbacks cannot declare field name '{0}', it inherits its parent's")]
    NestedFieldName(String),

    /// A condition token is neither `*`, `valid` nor a validity flag.
    #[error("Invalid condition '{0}': expected '*', 'valid' or a validity flag")]
    InvalidCondition(String),

    /// The valid marker was combined with an explicit severity.
    #[error("A 'valid' FieldFeedback cannot also be an error, warning or info")]
    ValidWithSeverity,

    /// No input matches the given field name.
    #[error("Could not find field '{0}'")]
    NotFound(String),

    /// More than one input matches the given field name.
    #[error("Multiple elements ({count}) match field '{name}'")]
    MultipleMatches {
        /// The ambiguous field name.
        name: String,
        /// How many inputs matched.
        count: usize,
    },

    /// The form a rule group belongs to was dropped.
    #[error("The form owning field '{0}' no longer exists")]
    Detached(String),

    /// A field pass was overtaken by a newer pass (or a reset) of the same
    /// field while an async check was in flight. Only raised under
    /// [`StaleAsyncPolicy::Discard`](crate::StaleAsyncPolicy::Discard); the
    /// form catches it and leaves the field out of the stale pass's result.
    #[error("Validation of field '{0}' was superseded by a newer pass")]
    Superseded(String),

    /// A `pattern` constraint is not a valid regular expression.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Message from the regex compiler.
        message: String,
    },
}

impl FormError {
    /// Creates a multiple matches error.
    pub fn multiple_matches(name: impl Into<String>, count: usize) -> Self {
        Self::MultipleMatches {
            name: name.into(),
            count,
        }
    }

    /// Returns `true` for errors caused by resolving field names.
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::MultipleMatches { .. })
    }

    /// Returns `true` for errors caused by a wrongly declared rule tree.
    pub fn is_usage(&self) -> bool {
        !self.is_lookup() && !self.is_superseded()
    }

    /// Returns `true` when a stale pass was cancelled.
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FormError>;

