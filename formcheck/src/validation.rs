//! Outcome records produced by a validation pass.

use serde::{Deserialize, Serialize};

/// Severity of a feedback rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldFeedbackType {
    Error,
    Warning,
    Info,
    /// Shown only once the whole field ends up valid.
    #[serde(rename = "whenValid")]
    WhenValid,
}

/// Outcome of one rule for one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFeedbackValidation {
    /// Stable rule key, `"{group}.{n}"`.
    pub key: String,
    #[serde(rename = "type")]
    pub kind: FieldFeedbackType,
    /// `None` when the rule was not evaluated (stop policy) or is a valid
    /// marker whose visibility is decided after the pass.
    pub show: Option<bool>,
}

impl FieldFeedbackValidation {
    /// Creates an outcome record.
    pub fn new(key: impl Into<String>, kind: FieldFeedbackType, show: Option<bool>) -> Self {
        Self {
            key: key.into(),
            kind,
            show,
        }
    }

    /// Evaluated and visible.
    pub fn is_shown(&self) -> bool {
        self.show == Some(true)
    }

    pub(crate) fn is_shown_as(&self, kind: FieldFeedbackType) -> bool {
        self.kind == kind && self.is_shown()
    }
}

/// Predicates shared by everything that holds a list of outcomes.
pub trait Feedbacks {
    fn validations(&self) -> &[FieldFeedbackValidation];

    /// Keys of shown feedbacks of the given severity, in order.
    fn shown_keys(&self, kind: FieldFeedbackType) -> Vec<&str> {
        self.validations()
            .iter()
            .filter(|v| v.is_shown_as(kind))
            .map(|v| v.key.as_str())
            .collect()
    }

    fn has_errors(&self) -> bool {
        self.validations()
            .iter()
            .any(|v| v.is_shown_as(FieldFeedbackType::Error))
    }

    fn has_warnings(&self) -> bool {
        self.validations()
            .iter()
            .any(|v| v.is_shown_as(FieldFeedbackType::Warning))
    }

    fn has_infos(&self) -> bool {
        self.validations()
            .iter()
            .any(|v| v.is_shown_as(FieldFeedbackType::Info))
    }

    /// Any error, warning or info currently shown.
    fn has_feedbacks(&self) -> bool {
        self.has_errors() || self.has_warnings() || self.has_infos()
    }

    /// No shown error.
    fn is_valid(&self) -> bool {
        !self.has_errors()
    }
}

/// Aggregate result for one field after a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidation {
    pub name: String,
    pub validations: Vec<FieldFeedbackValidation>,
}

impl FieldValidation {
    /// Creates a field result.
    pub fn new(name: impl Into<String>, validations: Vec<FieldFeedbackValidation>) -> Self {
        Self {
            name: name.into(),
            validations,
        }
    }

    /// Outcome of the rule with the given key.
    pub fn get(&self, key: &str) -> Option<&FieldFeedbackValidation> {
        self.validations.iter().find(|v| v.key == key)
    }
}

impl Feedbacks for FieldValidation {
    fn validations(&self) -> &[FieldFeedbackValidation] {
        &self.validations
    }
}

impl Feedbacks for Vec<FieldFeedbackValidation> {
    fn validations(&self) -> &[FieldFeedbackValidation] {
        self
    }
}

/// Value produced by one validate listener: a single rule outcome or the
/// outcomes of a nested group / async rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationNode {
    Leaf(FieldFeedbackValidation),
    Group(Vec<ValidationNode>),
}

/// Flatten nodes depth-first into outcome order.
pub fn flatten<I>(nodes: I) -> Vec<FieldFeedbackValidation>
where
    I: IntoIterator<Item = ValidationNode>,
{
    let mut out = Vec::new();
    for node in nodes {
        flatten_into(node, &mut out);
    }
    out
}

fn flatten_into(node: ValidationNode, out: &mut Vec<FieldFeedbackValidation>) {
    match node {
        ValidationNode::Leaf(validation) => out.push(validation),
        ValidationNode::Group(children) => {
            for child in children {
                flatten_into(child, out);
            }
        }
    }
}

/// Insert `validation`, replacing an existing outcome with the same key
/// in place so the list keeps first-seen order.
pub(crate) fn add_or_replace(
    list: &mut Vec<FieldFeedbackValidation>,
    validation: FieldFeedbackValidation,
) {
    match list.iter_mut().find(|v| v.key == validation.key) {
        Some(existing) => *existing = validation,
        None => list.push(validation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(key: &str, show: Option<bool>) -> ValidationNode {
        ValidationNode::Leaf(FieldFeedbackValidation::new(
            key,
            FieldFeedbackType::Error,
            show,
        ))
    }

    #[test]
    fn test_flatten_nested_groups() {
        let nodes = vec![
            leaf("0.0", Some(false)),
            ValidationNode::Group(vec![
                leaf("1.0", Some(true)),
                ValidationNode::Group(vec![leaf("2.0", None)]),
                ValidationNode::Group(vec![]),
            ]),
            leaf("0.1", None),
        ];

        let keys: Vec<String> = flatten(nodes).into_iter().map(|v| v.key).collect();
        assert_eq!(keys, ["0.0", "1.0", "2.0", "0.1"]);
    }

    #[test]
    fn test_add_or_replace_keeps_position() {
        let mut list = vec![
            FieldFeedbackValidation::new("0.0", FieldFeedbackType::Error, None),
            FieldFeedbackValidation::new("0.1", FieldFeedbackType::Info, None),
        ];
        add_or_replace(
            &mut list,
            FieldFeedbackValidation::new("0.0", FieldFeedbackType::Error, Some(true)),
        );
        add_or_replace(
            &mut list,
            FieldFeedbackValidation::new("0.2", FieldFeedbackType::Warning, Some(false)),
        );

        assert_eq!(list.len(), 3);
        assert_eq!(list[0].show, Some(true));
        assert_eq!(list[2].key, "0.2");
    }

    #[test]
    fn test_predicates_ignore_unevaluated() {
        let validation = FieldValidation::new(
            "username",
            vec![
                FieldFeedbackValidation::new("0.0", FieldFeedbackType::Error, None),
                FieldFeedbackValidation::new("0.1", FieldFeedbackType::Warning, Some(true)),
                FieldFeedbackValidation::new("0.2", FieldFeedbackType::Error, Some(false)),
            ],
        );

        assert!(validation.is_valid());
        assert!(validation.has_warnings());
        assert!(!validation.has_infos());
        assert!(validation.has_feedbacks());
        assert_eq!(validation.shown_keys(FieldFeedbackType::Warning), ["0.1"]);
    }
}
