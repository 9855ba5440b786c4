//! Issue accumulator shared by every validator.
//!
//! Validators never fail: they append to a [`Validation`]. Independent
//! validator chains each produce their own accumulator and are concatenated
//! with [`Validation::merge`]. Only the top-level caller decides whether the
//! collected ERROR issues become a failure, via [`Validation::alert_if_errors`].

use crate::error::{Result, RoninError};
use crate::issue::{Rule, Severity, ValidationIssue};
use crate::location::LocationContext;

/// Banner placed in front of aggregated error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Banner {
    /// `Encountered multiple validation errors:`, only when more than one
    /// error is present. A single error renders bare.
    #[default]
    Multiple,
    /// `Encountered validation error(s):`, always present.
    Plural,
}

impl Banner {
    fn text(&self) -> &'static str {
        match self {
            Banner::Multiple => "Encountered multiple validation errors:",
            Banner::Plural => "Encountered validation error(s):",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    issues: Vec<ValidationIssue>,
}

impl Validation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn add_rule(&mut self, rule: Rule, location: LocationContext) {
        self.add(ValidationIssue::new(rule, location));
    }

    /// Appends every issue of `other`, preserving its order.
    pub fn merge(&mut self, other: Validation) {
        self.issues.extend(other.issues);
    }

    /// Records `rule` at `location` when `condition` is false.
    pub fn check_true(&mut self, condition: bool, rule: Rule, location: &LocationContext) -> bool {
        if !condition {
            self.add_rule(rule, location.clone());
        }
        condition
    }

    /// Records `rule` at `location` when `value` is `None`, passing the value through.
    pub fn check_not_null<T>(
        &mut self,
        value: Option<T>,
        rule: Rule,
        location: &LocationContext,
    ) -> Option<T> {
        if value.is_none() {
            self.add_rule(rule, location.clone());
        }
        value
    }

    /// `REQ_FIELD` for `parent.field` when `value` is `None`.
    pub fn require<T>(
        &mut self,
        value: Option<T>,
        field: &str,
        parent: &LocationContext,
    ) -> Option<T> {
        self.check_not_null(value, Rule::required_field(field), &parent.append(field))
    }

    /// `REQ_FIELD` for `parent.field` when `values` is empty.
    pub fn require_non_empty<T>(
        &mut self,
        values: &[T],
        field: &str,
        parent: &LocationContext,
    ) -> bool {
        self.check_true(
            !values.is_empty(),
            Rule::required_field(field),
            &parent.append(field),
        )
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity() == Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Fails with every ERROR issue joined by newlines, using [`Banner::Multiple`].
    pub fn alert_if_errors(&self) -> Result<()> {
        self.alert_if_errors_with(Banner::default())
    }

    pub fn alert_if_errors_with(&self, banner: Banner) -> Result<()> {
        let errors: Vec<String> = self.errors().map(ToString::to_string).collect();
        if errors.is_empty() {
            return Ok(());
        }

        let body = errors.join("\n");
        let message = match banner {
            Banner::Multiple if errors.len() == 1 => body,
            _ => format!("{}\n{}", banner.text(), body),
        };
        Err(RoninError::validation(message))
    }
}

impl Extend<ValidationIssue> for Validation {
    fn extend<I: IntoIterator<Item = ValidationIssue>>(&mut self, iter: I) {
        self.issues.extend(iter);
    }
}

impl FromIterator<Validation> for Validation {
    fn from_iter<I: IntoIterator<Item = Validation>>(iter: I) -> Self {
        let mut merged = Validation::new();
        for validation in iter {
            merged.merge(validation);
        }
        merged
    }
}
