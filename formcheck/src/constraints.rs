//! Native-style constraint validation for hosts without a browser.
//!
//! Browsers compute `ValidityState` and `validationMessage` for every input.
//! Terminal and native hosts can describe the same constraints with
//! [`InputConstraints`] and get equivalent snapshots.

use regex::Regex;

use crate::error::{FormError, Result};
use crate::input::{InputElement, ValidityFlag, ValidityState};

/// Kind of value an input accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum InputKind {
    #[default]
    Text,
    Email,
    Number {
        min: Option<f64>,
        max: Option<f64>,
        step: Option<f64>,
    },
}

/// Constraints declared on an input, like the HTML attributes of the same
/// names.
#[derive(Debug, Clone, Default)]
pub struct InputConstraints {
    kind: InputKind,
    required: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
}

impl InputConstraints {
    /// Constraints of a plain text input.
    pub fn text() -> Self {
        Self::default()
    }

    /// Constraints of an email input.
    pub fn email() -> Self {
        Self {
            kind: InputKind::Email,
            ..Self::default()
        }
    }

    /// Constraints of a number input, unbounded.
    pub fn number() -> Self {
        Self {
            kind: InputKind::Number {
                min: None,
                max: None,
                step: None,
            },
            ..Self::default()
        }
    }

    /// Reject empty values.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Minimum length in characters.
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    /// Maximum length in characters.
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// The whole value must match `pattern`.
    pub fn pattern(mut self, pattern: &str) -> Result<Self> {
        let anchored = format!("^(?:{pattern})$");
        let regex = Regex::new(&anchored).map_err(|err| FormError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })?;
        self.pattern = Some(regex);
        Ok(self)
    }

    /// Range and step of a number input. Ignored for other kinds.
    pub fn range(mut self, min: Option<f64>, max: Option<f64>, step: Option<f64>) -> Self {
        if let InputKind::Number { .. } = self.kind {
            self.kind = InputKind::Number { min, max, step };
        }
        self
    }

    /// The input kind.
    pub fn kind(&self) -> InputKind {
        self.kind
    }

    /// Validity of `value` against these constraints.
    pub fn validity(&self, value: &str) -> ValidityState {
        let mut validity = ValidityState::valid();

        // Only `required` applies to an empty value.
        if value.is_empty() {
            validity.set(ValidityFlag::ValueMissing, self.required);
            return validity;
        }

        let length = value.chars().count();
        if self.min_length.is_some_and(|min| length < min) {
            validity.set(ValidityFlag::TooShort, true);
        }
        if self.max_length.is_some_and(|max| length > max) {
            validity.set(ValidityFlag::TooLong, true);
        }
        if self.pattern.as_ref().is_some_and(|re| !re.is_match(value)) {
            validity.set(ValidityFlag::PatternMismatch, true);
        }

        match self.kind {
            InputKind::Text => {}
            InputKind::Email => {
                if !email_address::EmailAddress::is_valid(value) {
                    validity.set(ValidityFlag::TypeMismatch, true);
                }
            }
            InputKind::Number { min, max, step } => match value.trim().parse::<f64>() {
                Err(_) => validity.set(ValidityFlag::BadInput, true),
                Ok(number) => {
                    if min.is_some_and(|min| number < min) {
                        validity.set(ValidityFlag::RangeUnderflow, true);
                    }
                    if max.is_some_and(|max| number > max) {
                        validity.set(ValidityFlag::RangeOverflow, true);
                    }
                    if let Some(step) = step.filter(|s| *s > 0.0) {
                        let steps = (number - min.unwrap_or(0.0)) / step;
                        if (steps - steps.round()).abs() > 1e-9 {
                            validity.set(ValidityFlag::StepMismatch, true);
                        }
                    }
                }
            },
        }

        validity
    }

    /// English message for the first failing constraint, empty when valid.
    pub fn validation_message(&self, value: &str, validity: &ValidityState) -> String {
        let length = value.chars().count();
        let (min, max) = match self.kind {
            InputKind::Number { min, max, .. } => (min, max),
            _ => (None, None),
        };

        if validity.value_missing {
            "Please fill out this field.".to_string()
        } else if validity.type_mismatch {
            "Please enter an email address.".to_string()
        } else if validity.bad_input {
            "Please enter a number.".to_string()
        } else if validity.too_short {
            format!(
                "Please lengthen this text to {} characters or more (you are currently using {} characters).",
                self.min_length.unwrap_or_default(),
                length
            )
        } else if validity.too_long {
            format!(
                "Please shorten this text to {} characters or less (you are currently using {} characters).",
                self.max_length.unwrap_or_default(),
                length
            )
        } else if validity.pattern_mismatch {
            "Please match the requested format.".to_string()
        } else if validity.range_underflow {
            format!("Value must be greater than or equal to {}.", min.unwrap_or_default())
        } else if validity.range_overflow {
            format!("Value must be less than or equal to {}.", max.unwrap_or_default())
        } else if validity.step_mismatch {
            "Please enter a valid value.".to_string()
        } else {
            String::new()
        }
    }

    /// Snapshot of an input named `name` holding `value`.
    pub fn snapshot(&self, name: impl Into<String>, value: impl Into<String>) -> InputElement {
        let value = value.into();
        let validity = self.validity(&value);
        let message = self.validation_message(&value, &validity);
        InputElement::new(name, value)
            .with_validity(validity)
            .with_message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_value_only_checks_required() {
        let constraints = InputConstraints::text().min_length(3).pattern("[a-z]+").unwrap();
        assert!(constraints.validity("").valid);

        let required = constraints.required();
        let validity = required.validity("");
        assert!(validity.value_missing);
        assert!(!validity.too_short);
        assert!(!validity.valid);
    }

    #[test]
    fn test_number_step_from_min() {
        let constraints = InputConstraints::number().range(Some(1.0), None, Some(2.0));
        assert!(constraints.validity("5").valid);
        assert!(constraints.validity("4").step_mismatch);
    }

    #[test]
    fn test_message_for_too_short() {
        let constraints = InputConstraints::text().min_length(5);
        let input = constraints.snapshot("password", "abc");
        assert!(input.validity.too_short);
        assert_eq!(
            input.validation_message,
            "Please lengthen this text to 5 characters or more (you are currently using 3 characters)."
        );
    }
}
