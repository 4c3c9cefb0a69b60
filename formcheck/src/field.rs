//! Per-field record kept by the [`FieldsStore`](crate::FieldsStore).

use serde::Serialize;

use crate::validation::{
    FieldFeedbackType, FieldFeedbackValidation, Feedbacks, add_or_replace,
};

/// Validation state of one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    /// Validated at least once since the last reset.
    pub dirty: bool,
    /// Outcomes of the current pass, in rule evaluation order.
    pub validations: Vec<FieldFeedbackValidation>,
    /// Last validation message seen on the input.
    pub validation_message: String,
}

impl Field {
    /// A field with no feedback yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Record one rule outcome, replacing a previous one with the same key.
    pub fn add_or_replace_validation(&mut self, validation: FieldFeedbackValidation) {
        add_or_replace(&mut self.validations, validation);
    }

    /// Forget every outcome; dirtiness is left alone.
    pub fn clear_validations(&mut self) {
        self.validations.clear();
    }

    /// Keys of the errors currently shown.
    pub fn errors(&self) -> Vec<&str> {
        self.shown_keys(FieldFeedbackType::Error)
    }

    /// Keys of the warnings currently shown.
    pub fn warnings(&self) -> Vec<&str> {
        self.shown_keys(FieldFeedbackType::Warning)
    }

    /// Keys of the infos currently shown.
    pub fn infos(&self) -> Vec<&str> {
        self.shown_keys(FieldFeedbackType::Info)
    }

    /// Whether the given rule is shown as an error.
    pub fn has_error(&self, key: &str) -> bool {
        self.validations
            .iter()
            .any(|v| v.key == key && v.is_shown_as(FieldFeedbackType::Error))
    }
}

impl Feedbacks for Field {
    fn validations(&self) -> &[FieldFeedbackValidation] {
        &self.validations
    }
}
