//! Validation System - Field Rules
//!
//! Rules produce structured violations.
//! The validator folds them into an error record, one message per field.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::templates::{CardTemplate, FieldKind};

/// Flat field name -> value mapping. Every value is kept as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormRecord(BTreeMap<String, String>);

impl FormRecord {
    /// A record holding an empty value for each named field.
    pub fn with_fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(|n| (n.into(), String::new())).collect())
    }

    /// Value of a field; missing fields read as empty.
    pub fn get(&self, name: &str) -> &str {
        self.0.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// At most one message per invalid field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorRecord(BTreeMap<String, String>);

impl ErrorRecord {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Records a message unless the field already has one.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) -> bool {
        let field = field.into();
        if self.0.contains_key(&field) {
            return false;
        }
        self.0.insert(field, message.into());
        true
    }

    /// Drops the message for one field, returning whether there was one.
    pub fn clear(&mut self, field: &str) -> bool {
        self.0.remove(field).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: ErrorRecord,
    pub violations: Vec<ValidationViolation>,
    pub template_id: String,
    pub template_version: String,
}

impl ValidationResult {
    pub fn success(template: &CardTemplate) -> Self {
        Self {
            valid: true,
            errors: ErrorRecord::default(),
            violations: vec![],
            template_id: template.id.clone(),
            template_version: template.template_version.clone(),
        }
    }

    pub fn failure(template: &CardTemplate, violations: Vec<ValidationViolation>) -> Self {
        let mut errors = ErrorRecord::default();
        for v in &violations {
            errors.insert(v.field.clone(), v.message.clone());
        }
        Self {
            valid: false,
            errors,
            violations,
            template_id: template.id.clone(),
            template_version: template.template_version.clone(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, form: &FormRecord, template: &CardTemplate) -> Vec<ValidationViolation>;
}

// --- Concrete Rules ---

pub struct RequiredRule;

impl ValidationRule for RequiredRule {
    fn name(&self) -> &'static str { "required" }

    fn validate(&self, form: &FormRecord, template: &CardTemplate) -> Vec<ValidationViolation> {
        template
            .fields
            .iter()
            .filter_map(|field| {
                let message = field.required.as_ref()?;
                if form.get(&field.name).trim().is_empty() {
                    Some(ValidationViolation {
                        rule: self.name().to_string(),
                        field: field.name.clone(),
                        message: message.clone(),
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Number fields must hold a whole number inside the declared range.
pub struct NumericRangeRule;

impl ValidationRule for NumericRangeRule {
    fn name(&self) -> &'static str { "numeric_range" }

    fn validate(&self, form: &FormRecord, template: &CardTemplate) -> Vec<ValidationViolation> {
        let mut violations = vec![];

        for field in template.fields.iter().filter(|f| f.kind == FieldKind::Number) {
            let raw = form.get(&field.name).trim();
            if raw.is_empty() {
                continue;
            }

            let in_range = raw.parse::<i64>().map_or(false, |n| {
                field.min.map_or(true, |min| n >= min) && field.max.map_or(true, |max| n <= max)
            });

            if !in_range {
                let message = match (field.min, field.max) {
                    (Some(min), Some(max)) => {
                        format!("{} must be a whole number between {} and {}", field.label, min, max)
                    }
                    (Some(min), None) => format!("{} must be a whole number of at least {}", field.label, min),
                    (None, Some(max)) => format!("{} must be a whole number up to {}", field.label, max),
                    (None, None) => format!("{} must be a whole number", field.label),
                };
                violations.push(ValidationViolation {
                    rule: self.name().to_string(),
                    field: field.name.clone(),
                    message,
                });
            }
        }

        violations
    }
}

/// Validator runs every rule; the first message for a field wins
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(RequiredRule),
                Box::new(NumericRangeRule),
            ],
        }
    }

    pub fn validate(&self, form: &FormRecord, template: &CardTemplate) -> ValidationResult {
        let mut all_violations = vec![];

        for rule in &self.rules {
            let violations = rule.validate(form, template);
            all_violations.extend(violations);
        }

        if all_violations.is_empty() {
            ValidationResult::success(template)
        } else {
            ValidationResult::failure(template, all_violations)
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateRegistry;

    fn anniversary() -> CardTemplate {
        TemplateRegistry::builtin().unwrap().get("anniversary").unwrap().clone()
    }

    fn filled(template: &CardTemplate) -> FormRecord {
        let mut form = FormRecord::with_fields(template.fields.iter().map(|f| f.name.clone()));
        form.set("guestName", "Anita");
        form.set("partner1", "Rahul Sharma");
        form.set("partner2", "Priya Sharma");
        form.set("years", "25");
        form.set("date", "2025-03-14");
        form.set("venue", "Hotel Grand");
        form
    }

    #[test]
    fn test_complete_form_is_valid() {
        let template = anniversary();
        let result = Validator::new().validate(&filled(&template), &template);
        assert!(result.valid);
        assert!(!result.has_errors());
        assert_eq!(result.template_id, "anniversary");
    }

    #[test]
    fn test_whitespace_only_counts_as_empty() {
        let template = anniversary();
        let mut form = filled(&template);
        form.set("venue", "   ");

        let result = Validator::new().validate(&form, &template);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors.get("venue"), Some("Venue name is required"));
    }

    #[test]
    fn test_empty_number_reports_required_only() {
        let template = anniversary();
        let mut form = filled(&template);
        form.set("years", "");

        let result = Validator::new().validate(&form, &template);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors.get("years"), Some("Anniversary year is required"));
        assert_eq!(result.violations.len(), 1);
    }

    #[test]
    fn test_number_out_of_range() {
        let template = anniversary();
        for bad in ["0", "101", "twenty", "2.5"] {
            let mut form = filled(&template);
            form.set("years", bad);
            let result = Validator::new().validate(&form, &template);
            assert!(!result.valid, "{} should be rejected", bad);
            assert_eq!(
                result.errors.get("years"),
                Some("Which Anniversary? (Years) must be a whole number between 1 and 100")
            );
        }
    }

    #[test]
    fn test_error_record_keeps_first_message() {
        let mut errors = ErrorRecord::default();
        assert!(errors.insert("age", "first"));
        assert!(!errors.insert("age", "second"));
        assert_eq!(errors.get("age"), Some("first"));
        assert!(errors.clear("age"));
        assert!(!errors.clear("age"));
    }
}
