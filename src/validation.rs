//! Field-level input validation.
//!
//! A [`Validator`] is a list of `(field, check)` pairs. Every check runs and
//! each failure is recorded under its field, so a form gets all of its
//! rejection reasons in one response.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

pub type Check<T> = fn(&T) -> Result<(), String>;

/// Rejection reasons keyed by field name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, reason: impl Into<String>) {
        self.0.entry(field).or_default().push(reason.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

pub struct Validator<T> {
    rules: Vec<(&'static str, Check<T>)>,
}

impl<T> Default for Validator<T> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<T> Validator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, field: &'static str, check: Check<T>) -> Self {
        self.rules.push((field, check));
        self
    }

    /// Runs every rule. The returned set may be extended with further
    /// (e.g. store-backed) checks before being turned into a result.
    pub fn collect(&self, input: &T) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for (field, check) in &self.rules {
            if let Err(reason) = check(input) {
                errors.add(*field, reason);
            }
        }
        errors
    }

    pub fn validate(&self, input: &T) -> Result<(), ValidationErrors> {
        self.collect(input).into_result()
    }
}

pub fn required(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("This field is required.".into());
    }
    Ok(())
}

pub fn max_len(value: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        return Err(format!("Field cannot be longer than {max} characters."));
    }
    Ok(())
}

pub fn min_len(value: &str, min: usize) -> Result<(), String> {
    if value.chars().count() < min {
        return Err(format!("Field must be at least {min} characters long."));
    }
    Ok(())
}

pub fn email(value: &str) -> Result<(), String> {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    if !EMAIL_RE.is_match(value) {
        return Err("Invalid email address.".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Form {
        name: String,
        mail: String,
    }

    fn validator() -> Validator<Form> {
        Validator::new()
            .rule("name", |f: &Form| required(&f.name))
            .rule("name", |f: &Form| max_len(&f.name, 5))
            .rule("mail", |f: &Form| email(&f.mail))
    }

    #[test]
    fn collects_every_failure_per_field() {
        let form = Form {
            name: "       ".into(),
            mail: "nope".into(),
        };
        let errors = validator().validate(&form).unwrap_err();
        assert_eq!(errors.field("name").len(), 2);
        assert_eq!(errors.field("mail"), ["Invalid email address."]);
    }

    #[test]
    fn passes_clean_input() {
        let form = Form {
            name: "bob".into(),
            mail: "bob@example.com".into(),
        };
        assert!(validator().validate(&form).is_ok());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(max_len("ééééé", 5).is_ok());
        assert!(max_len("éééééé", 5).is_err());
        assert!(min_len("abc", 4).is_err());
    }

    #[test]
    fn serializes_as_field_map() {
        let mut errors = ValidationErrors::new();
        errors.add("username", "taken");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({ "username": ["taken"] }));
    }
}
