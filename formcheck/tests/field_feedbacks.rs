//! Tests for rule groups, stop policies and rule evaluation.

use std::sync::Arc;

use futures::FutureExt;

use formcheck::{
    FieldFeedbackProps, FieldFeedbackType, FieldFeedbackValidation, FieldFeedbacks,
    FieldFeedbacksProps, Form, FormError, InputElement, InputRegistry, Stop, ValidityFlag,
    ValidityState, When,
};

fn form() -> Form {
    Form::new(Arc::new(InputRegistry::new()))
}

fn run(form: &Form, input: InputElement) -> Vec<FieldFeedbackValidation> {
    let mut results = form
        .validate_fields([input])
        .now_or_never()
        .expect("synchronous pass")
        .unwrap();
    results.remove(0).validations
}

fn shows(validations: &[FieldFeedbackValidation]) -> Vec<(&str, Option<bool>)> {
    validations
        .iter()
        .map(|v| (v.key.as_str(), v.show))
        .collect()
}

fn always() -> When {
    When::predicate(|_| true)
}

// =============================================================================
// Stop policies
// =============================================================================

#[test]
fn test_stop_no_evaluates_every_rule() {
    let form = form();
    let group = form
        .field_feedbacks(FieldFeedbacksProps::for_field("name").stop(Stop::No))
        .unwrap();
    group.field_feedback(FieldFeedbackProps::new(always())).unwrap();
    group.field_feedback(FieldFeedbackProps::new(When::predicate(|v| v.len() > 10))).unwrap();
    group.field_feedback(FieldFeedbackProps::new(always()).warning()).unwrap();

    let validations = run(&form, InputElement::new("name", "x"));

    assert_eq!(
        shows(&validations),
        [("0.0", Some(true)), ("0.1", Some(false)), ("0.2", Some(true))]
    );
}

#[test]
fn test_stop_first_error_ignores_warnings() {
    let form = form();
    let group = form.field_feedbacks(FieldFeedbacksProps::for_field("name")).unwrap();
    group.field_feedback(FieldFeedbackProps::new(always()).warning()).unwrap();
    group.field_feedback(FieldFeedbackProps::new(always())).unwrap();
    group.field_feedback(FieldFeedbackProps::new(always()).info()).unwrap();

    let validations = run(&form, InputElement::new("name", "x"));

    assert_eq!(
        shows(&validations),
        [("0.0", Some(true)), ("0.1", Some(true)), ("0.2", None)]
    );
}

#[test]
fn test_stop_first_stops_on_any_severity() {
    let form = form();
    let group = form
        .field_feedbacks(FieldFeedbacksProps::for_field("name").stop(Stop::First))
        .unwrap();
    group.field_feedback(FieldFeedbackProps::new(When::predicate(|v| v.is_empty()))).unwrap();
    group.field_feedback(FieldFeedbackProps::new(always()).info()).unwrap();
    group.field_feedback(FieldFeedbackProps::new(always())).unwrap();

    let validations = run(&form, InputElement::new("name", "x"));

    assert_eq!(
        shows(&validations),
        [("0.0", Some(false)), ("0.1", Some(true)), ("0.2", None)]
    );
    assert!(form.is_valid());
}

#[test]
fn test_stop_first_warning() {
    let form = form();
    let group = form
        .field_feedbacks(FieldFeedbacksProps::for_field("name").stop(Stop::FirstWarning))
        .unwrap();
    group.field_feedback(FieldFeedbackProps::new(always())).unwrap();
    group.field_feedback(FieldFeedbackProps::new(always()).warning()).unwrap();
    group.field_feedback(FieldFeedbackProps::new(always())).unwrap();

    let validations = run(&form, InputElement::new("name", "x"));

    assert_eq!(
        shows(&validations),
        [("0.0", Some(true)), ("0.1", Some(true)), ("0.2", None)]
    );
}

// =============================================================================
// Nested groups
// =============================================================================

/// `password` (first-error) holding two nested groups:
/// 1: [shorter than 5 => error, no digit => warning], stop no
/// 2: [always => error]
fn nested_form() -> (Form, FieldFeedbacks, FieldFeedbacks, FieldFeedbacks) {
    let form = form();
    let root = form.field_feedbacks(FieldFeedbacksProps::for_field("password")).unwrap();
    let first = root
        .field_feedbacks(FieldFeedbacksProps::new().stop(Stop::No))
        .unwrap();
    first
        .field_feedback(FieldFeedbackProps::new(When::predicate(|v| v.len() < 5)))
        .unwrap();
    first
        .field_feedback(
            FieldFeedbackProps::new(When::predicate(|v| !v.chars().any(|c| c.is_ascii_digit()))).warning(),
        )
        .unwrap();
    let second = root.field_feedbacks(FieldFeedbacksProps::new()).unwrap();
    second.field_feedback(FieldFeedbackProps::new(always())).unwrap();
    (form, root, first, second)
}

#[test]
fn test_parent_skips_later_nested_group() {
    let (form, root, first, second) = nested_form();

    let validations = run(&form, InputElement::new("password", "abc"));

    // The second group is skipped entirely and reports nothing.
    assert_eq!(shows(&validations), [("1.0", Some(true)), ("1.1", Some(true))]);
    assert_eq!(shows(&root.last_validation()), [("1.0", Some(true)), ("1.1", Some(true))]);
    assert_eq!(first.last_validation().len(), 2);
    assert!(second.last_validation().is_empty());
}

#[test]
fn test_parent_continues_when_nothing_shown() {
    let (form, _root, _first, second) = nested_form();

    let validations = run(&form, InputElement::new("password", "abcde1"));

    assert_eq!(
        shows(&validations),
        [("1.0", Some(false)), ("1.1", Some(false)), ("2.0", Some(true))]
    );
    assert_eq!(second.last_validation().len(), 1);
}

#[test]
fn test_warning_does_not_stop_first_error_parent() {
    let (form, _root, _first, _second) = nested_form();

    let validations = run(&form, InputElement::new("password", "abcdef"));

    assert_eq!(
        shows(&validations),
        [("1.0", Some(false)), ("1.1", Some(true)), ("2.0", Some(true))]
    );
    let field = form.fields().get_field("password").unwrap();
    assert_eq!(field.warnings(), ["1.1"]);
    assert_eq!(field.errors(), ["2.0"]);
}

#[test]
fn test_rules_after_nested_group_see_its_outcomes() {
    let form = form();
    let root = form.field_feedbacks(FieldFeedbacksProps::for_field("code")).unwrap();
    let nested = root.field_feedbacks(FieldFeedbacksProps::new()).unwrap();
    nested.field_feedback(FieldFeedbackProps::new(always())).unwrap();
    root.field_feedback(FieldFeedbackProps::new(always())).unwrap();

    let validations = run(&form, InputElement::new("code", ""));

    assert_eq!(shows(&validations), [("1.0", Some(true)), ("0.0", None)]);
}

#[test]
fn test_nested_group_cannot_name_a_field() {
    let form = form();
    let root = form.field_feedbacks(FieldFeedbacksProps::for_field("code")).unwrap();

    let err = root
        .field_feedbacks(FieldFeedbacksProps::new().field_name("other"))
        .unwrap_err();

    assert_eq!(err, FormError::NestedFieldName("other".to_string()));
}

// =============================================================================
// Keys and mounting
// =============================================================================

#[test]
fn test_rule_keys_never_reused() {
    let form = form();
    let group = form.field_feedbacks(FieldFeedbacksProps::for_field("name")).unwrap();
    group.field_feedback(FieldFeedbackProps::new(always()).info()).unwrap();
    let removed = group.field_feedback(FieldFeedbackProps::new(always()).info()).unwrap();
    assert_eq!(group.child_count(), 2);

    removed.unmount();
    assert!(!removed.is_mounted());
    assert_eq!(group.child_count(), 1);

    let added = group.field_feedback(FieldFeedbackProps::new(always()).info()).unwrap();
    assert_eq!(added.key(), "0.2");

    let validations = run(&form, InputElement::new("name", "x"));
    assert_eq!(shows(&validations), [("0.0", Some(true)), ("0.2", Some(true))]);
}

#[test]
fn test_unmount_cascades_to_children() {
    let form = form();
    let root = form.field_feedbacks(FieldFeedbacksProps::for_field("name")).unwrap();
    let nested = root.field_feedbacks(FieldFeedbacksProps::new()).unwrap();
    let rule = nested.field_feedback(FieldFeedbackProps::new(always())).unwrap();

    root.unmount();

    assert!(!root.is_mounted());
    assert!(!nested.is_mounted());
    assert!(!rule.is_mounted());
    assert!(!form.fields().contains("name"));
}

#[test]
fn test_group_outlives_dropped_handle() {
    let form = form();
    {
        let group = form.field_feedbacks(FieldFeedbacksProps::for_field("name")).unwrap();
        group.field_feedback(FieldFeedbackProps::new(always())).unwrap();
    }

    let validations = run(&form, InputElement::new("name", "x"));

    assert_eq!(shows(&validations), [("0.0", Some(true))]);
}

#[test]
fn test_nested_mount_after_form_dropped() {
    let form = form();
    let group = form.field_feedbacks(FieldFeedbacksProps::for_field("name")).unwrap();
    drop(form);

    let err = group.field_feedbacks(FieldFeedbacksProps::new()).unwrap_err();

    assert_eq!(err, FormError::Detached("name".to_string()));
}

// =============================================================================
// Conditions
// =============================================================================

#[test]
fn test_constraint_conditions() {
    let form = form();
    let group = form
        .field_feedbacks(FieldFeedbacksProps::for_field("email").stop(Stop::No))
        .unwrap();
    for token in ["*", "valueMissing", "typeMismatch"] {
        group.field_feedback(FieldFeedbackProps::parse(token).unwrap()).unwrap();
    }

    let missing = InputElement::new("email", "")
        .with_validity(ValidityState::with_flags(&[ValidityFlag::ValueMissing]))
        .with_message("Please fill out this field.");
    let validations = run(&form, missing);
    assert_eq!(
        shows(&validations),
        [("0.0", Some(true)), ("0.1", Some(true)), ("0.2", Some(false))]
    );

    let valid = InputElement::new("email", "a@b.c");
    let validations = run(&form, valid);
    assert_eq!(
        shows(&validations),
        [("0.0", Some(false)), ("0.1", Some(false)), ("0.2", Some(false))]
    );
}

#[test]
fn test_flag_ignored_when_input_valid() {
    let form = form();
    let group = form.field_feedbacks(FieldFeedbacksProps::for_field("age")).unwrap();
    group
        .field_feedback(FieldFeedbackProps::new(ValidityFlag::RangeOverflow))
        .unwrap();

    // Inconsistent snapshot: a flag set while `valid` is true.
    let mut validity = ValidityState::valid();
    validity.range_overflow = true;
    let validations = run(&form, InputElement::new("age", "200").with_validity(validity));

    assert_eq!(shows(&validations), [("0.0", Some(false))]);
}

#[test]
fn test_text_defaults_to_validation_message() {
    let form = form();
    let group = form.field_feedbacks(FieldFeedbacksProps::for_field("email")).unwrap();
    let rule = group.field_feedback(FieldFeedbackProps::parse("*").unwrap()).unwrap();

    let input = InputElement::new("email", "")
        .with_validity(ValidityState::with_flags(&[ValidityFlag::ValueMissing]))
        .with_message("Please fill out this field.");
    run(&form, input);

    assert_eq!(rule.text().as_deref(), Some("Please fill out this field."));
    assert_eq!(
        form.fields().get_field("email").unwrap().validation_message,
        "Please fill out this field."
    );
}

#[test]
fn test_invalid_condition_token() {
    let err = FieldFeedbackProps::parse("tooLongish").unwrap_err();
    assert_eq!(err, FormError::InvalidCondition("tooLongish".to_string()));
}

#[test]
fn test_valid_marker_rejects_severity() {
    let form = form();
    let group = form.field_feedbacks(FieldFeedbacksProps::for_field("name")).unwrap();

    let err = group
        .field_feedback(FieldFeedbackProps::new(When::Valid).warning())
        .unwrap_err();

    assert_eq!(err, FormError::ValidWithSeverity);
    assert_eq!(group.child_count(), 0);
}

#[test]
fn test_valid_marker_kind() {
    let form = form();
    let group = form.field_feedbacks(FieldFeedbacksProps::for_field("name")).unwrap();

    let marker = group.field_feedback(FieldFeedbackProps::new(When::Valid)).unwrap();

    assert_eq!(marker.kind(), FieldFeedbackType::WhenValid);
    assert_eq!(marker.message(), None);
}
