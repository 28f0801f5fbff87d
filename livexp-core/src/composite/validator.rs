//! Validation results and the composite validator.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use super::CompositeExpression;
use crate::reactive::LiveExpression;

/// How bad a validation result is. Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Ok,
    Info,
    Warning,
    Error,
}

/// The value of a validator node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::with_status(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_status(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_status(Severity::Error, message)
    }

    fn with_status(status: Severity, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Severity::Ok
    }

    pub fn is_error(&self) -> bool {
        self.status == Severity::Error
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{:?}: {}", self.status, message),
            None => write!(f, "{:?}", self.status),
        }
    }
}

/// The worst result among `children`; the first one wins a tie. Stops at
/// the first error.
fn worst_of(children: &[LiveExpression<ValidationResult>]) -> ValidationResult {
    let mut worst = ValidationResult::ok();
    for child in children {
        let result = child.get_value();
        if result.status > worst.status {
            worst = result;
            if worst.is_error() {
                break;
            }
        }
    }
    worst
}

/// A validator combining child validators: its value is the worst child
/// result.
///
/// # Example
///
/// ```rust,ignore
/// let form = CompositeValidator::new();
/// form.add_child(url_validator).add_child(credentials_validator);
/// form.add_listener(|_, result| enable_finish(!result.is_error()));
/// ```
#[derive(Clone)]
pub struct CompositeValidator {
    composite: CompositeExpression<ValidationResult, ValidationResult>,
}

impl CompositeValidator {
    pub fn new() -> Self {
        Self {
            composite: CompositeExpression::new(ValidationResult::ok(), worst_of),
        }
    }

    pub fn add_child(&self, validator: LiveExpression<ValidationResult>) -> &Self {
        self.composite.add_child(validator);
        self
    }
}

impl Default for CompositeValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for CompositeValidator {
    type Target = CompositeExpression<ValidationResult, ValidationResult>;

    fn deref(&self) -> &Self::Target {
        &self.composite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::LiveVariable;

    #[test]
    fn severities_are_ordered() {
        assert!(Severity::Ok < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn worst_result_wins_first_on_tie() {
        let a = LiveVariable::new(ValidationResult::ok());
        let b = LiveVariable::new(ValidationResult::warning("first"));
        let c = LiveVariable::new(ValidationResult::warning("second"));

        let validator = CompositeValidator::new();
        validator
            .add_child(a.expression().clone())
            .add_child(b.expression().clone())
            .add_child(c.expression().clone());
        assert_eq!(validator.get_value(), ValidationResult::warning("first"));

        a.set_value(ValidationResult::error("bad url"));
        assert_eq!(validator.get_value(), ValidationResult::error("bad url"));

        a.set_value(ValidationResult::info("fine"));
        b.set_value(ValidationResult::ok());
        assert_eq!(validator.get_value(), ValidationResult::warning("second"));
    }

    #[test]
    fn error_short_circuits() {
        let error = LiveVariable::new(ValidationResult::error("missing"));
        let later = LiveVariable::new(ValidationResult::error("also missing"));

        let validator = CompositeValidator::new();
        validator.add_child(error.expression().clone());
        validator.add_child(later.expression().clone());
        assert_eq!(validator.get_value().message.as_deref(), Some("missing"));
    }

    #[test]
    fn empty_validator_is_ok() {
        assert!(CompositeValidator::new().get_value().is_ok());
    }

    #[test]
    fn results_serialize_as_json() {
        let json = serde_json::to_string(&ValidationResult::warning("slow")).unwrap();
        assert_eq!(json, r#"{"status":"warning","message":"slow"}"#);

        let ok: ValidationResult = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert!(ok.is_ok());
        assert_eq!(ok.to_string(), "Ok");
    }
}
