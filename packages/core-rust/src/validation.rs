//! Field validation backed by [`garde`].
//!
//! Types that need checking derive [`Validate`]; a [`Validator`] runs them and
//! flattens garde's report into [`ValidationErrors`], keyed by lower-case
//! field path, so callers can report every problem at once.

use std::collections::BTreeMap;
use std::fmt;

pub use garde::Validate;

/// Runs `garde` rules. Built explicitly by whoever needs it (the
/// configuration loader, the HTTP state); there is no process-wide instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Checks `value` against its derived rules.
    ///
    /// # Errors
    ///
    /// Returns one message per failing field.
    pub fn validate<T>(&self, value: &T) -> Result<(), ValidationErrors>
    where
        T: Validate<Context = ()>,
    {
        value.validate_with(&()).map_err(ValidationErrors::from)
    }
}

/// Rule for required text: rejects empty and whitespace-only values.
///
/// # Errors
///
/// Fails when `value` is blank.
pub fn not_blank(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        Err(garde::Error::new("is required"))
    } else {
        Ok(())
    }
}

/// Rule body for enumerated text settings.
///
/// # Errors
///
/// Fails when `value` is not in `allowed`.
pub fn one_of(value: &str, allowed: &[&str]) -> garde::Result {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "must be one of: {}",
            allowed.join(" ")
        )))
    }
}

/// Field path (lower-case) to message. Several failures on one field are
/// joined with `, ` in the order they were reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    /// Records `message` against `field`.
    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        let message = message.into();
        self.fields
            .entry(field.to_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&message);
            })
            .or_insert(message);
    }

    /// Folds the failures of one config section in under `section.`.
    pub fn absorb(&mut self, section: &str, result: Result<(), ValidationErrors>) {
        if let Err(errors) = result {
            for (field, message) in errors.fields {
                self.insert(&format!("{section}.{field}"), message);
            }
        }
    }

    /// `Ok(())` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Message recorded for `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Iterates `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<garde::Report> for ValidationErrors {
    fn from(report: garde::Report) -> Self {
        let mut errors = Self::default();
        for (path, error) in report.iter() {
            errors.insert(&path.to_string(), error.to_string());
        }
        errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self
            .fields
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        f.write_str(&joined.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}
