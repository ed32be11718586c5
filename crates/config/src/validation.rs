//! Per-section checks run on load (warnings) and on save (hard errors)

pub use crate::error::ValidationError;

/// One `[table]` of the config file
pub trait ConfigSection: Default {
    /// Every problem in the section, not just the first
    fn validate(&self) -> Result<(), Vec<ValidationError>>;

    /// Overwrites this section with `other`
    fn merge(&mut self, other: Self);

    /// TOML table name
    fn section_name(&self) -> &'static str;
}

/// Field checks shared by the sections
pub struct Validator;

impl Validator {
    /// Inclusive range check
    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if (min..=max).contains(&value) {
            return Ok(());
        }
        Err(ValidationError::with_value(
            field,
            format!("must be between {} and {}", min, max),
            value,
        ))
    }

    pub fn not_empty(value: &str, field: &str) -> Result<(), ValidationError> {
        match value.trim() {
            "" => Err(ValidationError::new(field, "must not be empty")),
            _ => Ok(()),
        }
    }

    /// Validates that a string looks like an absolute http(s) URL with a host
    pub fn http_url(value: &str, field: &str) -> Result<(), ValidationError> {
        let rest = value
            .strip_prefix("http://")
            .or_else(|| value.strip_prefix("https://"));
        match rest {
            Some(rest) if !rest.is_empty() && !rest.starts_with('/') => Ok(()),
            _ => Err(ValidationError::with_value(
                field,
                "must be an http:// or https:// URL",
                value,
            )),
        }
    }

    /// Validates that `low` does not exceed `high`
    pub fn ordered<T>(low: T, high: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if low > high {
            Err(ValidationError::with_value(
                field,
                format!("must be at least {}", low),
                high,
            ))
        } else {
            Ok(())
        }
    }

    /// Keeps the failures of `results`; `Ok` when there are none
    pub fn collect_errors<I>(results: I) -> Result<(), Vec<ValidationError>>
    where
        I: IntoIterator<Item = Result<(), ValidationError>>,
    {
        let errors: Vec<ValidationError> = results.into_iter().filter_map(Result::err).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
