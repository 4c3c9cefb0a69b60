//! Input snapshots and the collaborator that resolves field names to them.

use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::FormError;

/// Native-style constraint validity of one input.
///
/// Mirrors the browser `ValidityState`; field names serialize in camelCase
/// so the browser object can be forwarded as-is. Missing keys deserialize as
/// `false`, and `valid` is always derived from the flags: a set flag makes
/// the state invalid whatever `valid` said.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawValidityState")]
pub struct ValidityState {
    pub bad_input: bool,
    pub pattern_mismatch: bool,
    pub range_overflow: bool,
    pub range_underflow: bool,
    pub step_mismatch: bool,
    pub too_long: bool,
    pub too_short: bool,
    pub type_mismatch: bool,
    pub value_missing: bool,
    pub valid: bool,
}

/// Wire form of [`ValidityState`] before `valid` is reconciled.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawValidityState {
    bad_input: bool,
    pattern_mismatch: bool,
    range_overflow: bool,
    range_underflow: bool,
    step_mismatch: bool,
    too_long: bool,
    too_short: bool,
    type_mismatch: bool,
    value_missing: bool,
    valid: Option<bool>,
}

impl From<RawValidityState> for ValidityState {
    fn from(raw: RawValidityState) -> Self {
        let mut state = Self {
            bad_input: raw.bad_input,
            pattern_mismatch: raw.pattern_mismatch,
            range_overflow: raw.range_overflow,
            range_underflow: raw.range_underflow,
            step_mismatch: raw.step_mismatch,
            too_long: raw.too_long,
            too_short: raw.too_short,
            type_mismatch: raw.type_mismatch,
            value_missing: raw.value_missing,
            valid: true,
        };
        // An explicit `valid: false` without flags stands for a failure the
        // flags cannot name (a custom error, say).
        state.valid = raw.valid.unwrap_or(true) && !state.has_failing_flag();
        state
    }
}

impl Default for ValidityState {
    fn default() -> Self {
        Self::valid()
    }
}

impl ValidityState {
    /// A state with no failing constraint.
    pub fn valid() -> Self {
        Self {
            bad_input: false,
            pattern_mismatch: false,
            range_overflow: false,
            range_underflow: false,
            step_mismatch: false,
            too_long: false,
            too_short: false,
            type_mismatch: false,
            value_missing: false,
            valid: true,
        }
    }

    /// Build a state from the failing flags; `valid` is derived.
    pub fn with_flags(flags: &[ValidityFlag]) -> Self {
        let mut state = Self::valid();
        for flag in flags {
            state.set(*flag, true);
        }
        state
    }

    /// Read one constraint flag.
    pub fn get(&self, flag: ValidityFlag) -> bool {
        match flag {
            ValidityFlag::BadInput => self.bad_input,
            ValidityFlag::PatternMismatch => self.pattern_mismatch,
            ValidityFlag::RangeOverflow => self.range_overflow,
            ValidityFlag::RangeUnderflow => self.range_underflow,
            ValidityFlag::StepMismatch => self.step_mismatch,
            ValidityFlag::TooLong => self.too_long,
            ValidityFlag::TooShort => self.too_short,
            ValidityFlag::TypeMismatch => self.type_mismatch,
            ValidityFlag::ValueMissing => self.value_missing,
        }
    }

    /// Set one constraint flag and recompute `valid`.
    pub fn set(&mut self, flag: ValidityFlag, value: bool) {
        let slot = match flag {
            ValidityFlag::BadInput => &mut self.bad_input,
            ValidityFlag::PatternMismatch => &mut self.pattern_mismatch,
            ValidityFlag::RangeOverflow => &mut self.range_overflow,
            ValidityFlag::RangeUnderflow => &mut self.range_underflow,
            ValidityFlag::StepMismatch => &mut self.step_mismatch,
            ValidityFlag::TooLong => &mut self.too_long,
            ValidityFlag::TooShort => &mut self.too_short,
            ValidityFlag::TypeMismatch => &mut self.type_mismatch,
            ValidityFlag::ValueMissing => &mut self.value_missing,
        };
        *slot = value;
        self.valid = !self.has_failing_flag();
    }

    fn has_failing_flag(&self) -> bool {
        ValidityFlag::ALL.iter().any(|flag| self.get(*flag))
    }
}

/// One named constraint flag of a [`ValidityState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidityFlag {
    BadInput,
    PatternMismatch,
    RangeOverflow,
    RangeUnderflow,
    StepMismatch,
    TooLong,
    TooShort,
    TypeMismatch,
    ValueMissing,
}

impl ValidityFlag {
    /// Every flag, in `ValidityState` declaration order.
    pub const ALL: [ValidityFlag; 9] = [
        Self::BadInput,
        Self::PatternMismatch,
        Self::RangeOverflow,
        Self::RangeUnderflow,
        Self::StepMismatch,
        Self::TooLong,
        Self::TooShort,
        Self::TypeMismatch,
        Self::ValueMissing,
    ];

    /// The camelCase token used in condition strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadInput => "badInput",
            Self::PatternMismatch => "patternMismatch",
            Self::RangeOverflow => "rangeOverflow",
            Self::RangeUnderflow => "rangeUnderflow",
            Self::StepMismatch => "stepMismatch",
            Self::TooLong => "tooLong",
            Self::TooShort => "tooShort",
            Self::TypeMismatch => "typeMismatch",
            Self::ValueMissing => "valueMissing",
        }
    }
}

impl fmt::Display for ValidityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidityFlag {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.as_str() == s)
            .ok_or_else(|| FormError::InvalidCondition(s.to_string()))
    }
}

/// Immutable view of one field at validation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputElement {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub validity: ValidityState,
    #[serde(default)]
    pub validation_message: String,
}

impl InputElement {
    /// A snapshot with a valid `ValidityState` and no message.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            validity: ValidityState::valid(),
            validation_message: String::new(),
        }
    }

    /// Replace the validity state.
    pub fn with_validity(mut self, validity: ValidityState) -> Self {
        self.validity = validity;
        self
    }

    /// Replace the validation message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.validation_message = message.into();
        self
    }
}

/// Reference to a field passed to `Form::validate_fields`: either a name
/// to resolve, or a snapshot supplied directly by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    Name(String),
    Input(InputElement),
}

impl From<&str> for FieldRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for FieldRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&String> for FieldRef {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

impl From<InputElement> for FieldRef {
    fn from(input: InputElement) -> Self {
        Self::Input(input)
    }
}

/// Source of input snapshots, implemented by the rendering host.
pub trait InputResolver: Send + Sync {
    /// Every live input whose name is `name`, in document order.
    fn matching(&self, name: &str) -> Vec<InputElement>;

    /// Every live input, in document order.
    fn all(&self) -> Vec<InputElement>;
}

/// In-memory [`InputResolver`] for hosts that keep inputs themselves.
///
/// Several inputs may share a name; resolution then reports the ambiguity.
#[derive(Debug, Default)]
pub struct InputRegistry {
    inputs: RwLock<Vec<InputElement>>,
}

impl InputRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an input.
    pub fn insert(&self, input: InputElement) {
        self.write(|inputs| inputs.push(input));
    }

    /// Remove every input named `name`. Returns how many were removed.
    pub fn remove(&self, name: &str) -> usize {
        self.write(|inputs| {
            let before = inputs.len();
            inputs.retain(|i| i.name != name);
            before - inputs.len()
        })
    }

    /// Change the value of every input named `name`.
    pub fn set_value(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.write(|inputs| {
            for input in inputs.iter_mut().filter(|i| i.name == name) {
                input.value = value.clone();
            }
        });
    }

    /// Change validity and message of every input named `name`.
    pub fn set_validity(&self, name: &str, validity: ValidityState, message: impl Into<String>) {
        let message = message.into();
        self.write(|inputs| {
            for input in inputs.iter_mut().filter(|i| i.name == name) {
                input.validity = validity;
                input.validation_message = message.clone();
            }
        });
    }

    /// Replace every input named like `input` with `input`, or append it.
    pub fn upsert(&self, input: InputElement) {
        self.write(|inputs| {
            let mut replaced = false;
            for existing in inputs.iter_mut().filter(|i| i.name == input.name) {
                *existing = input.clone();
                replaced = true;
            }
            if !replaced {
                inputs.push(input);
            }
        });
    }

    fn write<T>(&self, f: impl FnOnce(&mut Vec<InputElement>) -> T) -> T {
        let mut guard = self.inputs.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl InputResolver for InputRegistry {
    fn matching(&self, name: &str) -> Vec<InputElement> {
        self.inputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|i| i.name == name)
            .cloned()
            .collect()
    }

    fn all(&self) -> Vec<InputElement> {
        self.inputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
