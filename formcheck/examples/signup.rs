//! Signup form example.
//!
//! Run with: cargo run --example signup
//!
//! Validates a username and an email address for a few values and prints
//! the feedback a UI would show. Engine logs go to signup.log.

use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

use formcheck::{
    AsyncFeedbackProps, FieldFeedback, FieldFeedbackProps, FieldFeedbacksProps, Form,
    InputConstraints, InputElement, InputRegistry, Stop, When,
};
use simplelog::{Config, LevelFilter, WriteLogger};

const TAKEN: [&str; 2] = ["john", "admin"];

async fn is_available(username: String) -> Result<bool, String> {
    tokio::time::sleep(Duration::from_millis(50)).await;
    if username == "error" {
        return Err("Availability service unreachable".to_string());
    }
    Ok(!TAKEN.contains(&username.as_str()))
}

fn print_feedbacks(label: &str, rules: &[FieldFeedback]) {
    for rule in rules {
        if let Some(text) = rule.text() {
            println!("  {label} [{:?}] {}", rule.kind(), text);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_file = File::create("signup.log")?;
    WriteLogger::init(LevelFilter::Debug, Config::default(), log_file)?;

    let inputs = Arc::new(InputRegistry::new());
    let form = Form::new(inputs.clone());

    // Username: local rules first, then the availability check.
    let username = form.field_feedbacks(FieldFeedbacksProps::for_field("username").stop(Stop::FirstError))?;
    let mut username_rules = vec![
        username.field_feedback(
            FieldFeedbackProps::new(When::predicate(|v| v.is_empty())).message("Cannot be empty"),
        )?,
        username.field_feedback(
            FieldFeedbackProps::new(When::predicate(|v| v.len() < 3))
                .message("Should be at least 3 characters long"),
        )?,
    ];
    let availability = username.async_feedback(
        AsyncFeedbackProps::new(is_available)
            .then(|available: &bool| {
                if *available {
                    vec![
                        FieldFeedbackProps::new(When::predicate(|_| true))
                            .info()
                            .message("Username available"),
                    ]
                } else {
                    vec![FieldFeedbackProps::new(When::predicate(|_| true)).message("Username already taken")]
                }
            })
            .catch(|err: &String| {
                vec![
                    FieldFeedbackProps::new(When::predicate(|_| true))
                        .warning()
                        .message(err.clone()),
                ]
            }),
    )?;
    availability.add_status_listener(|status| println!("  (availability: {:?})", status));
    username_rules.push(username.field_feedback(FieldFeedbackProps::new(When::Valid).message("Looks good!"))?);

    // Email: constraint based rules, messages come from the input.
    let email = form.field_feedbacks(FieldFeedbacksProps::for_field("email"))?;
    let email_rules = vec![
        email.field_feedback(FieldFeedbackProps::parse("valueMissing")?)?,
        email.field_feedback(FieldFeedbackProps::parse("typeMismatch")?)?,
        email.field_feedback(FieldFeedbackProps::new(When::Valid).message("Looks good!"))?,
    ];
    let email_constraints = InputConstraints::email().required().max_length(64);

    for (name, address) in [("", ""), ("ab", "ab"), ("john", "john@"), ("jane", "jane@example.com"), ("error", "e@x.io")] {
        inputs.upsert(InputElement::new("username", name));
        inputs.upsert(email_constraints.snapshot("email", address));

        println!("username={name:?} email={address:?}");
        form.validate_fields(["username", "email"]).await?;

        let mut shown = username_rules.clone();
        shown.extend(availability.children());
        print_feedbacks("username", &shown);
        print_feedbacks("email", &email_rules);
        println!("  form valid: {}\n", form.is_valid());
    }

    form.reset();
    println!("after reset, has feedbacks: {}", form.has_feedbacks());

    Ok(())
}
