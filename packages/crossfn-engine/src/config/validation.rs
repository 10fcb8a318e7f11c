//! Configuration validation

use super::error::ConfigResult;

/// Trait for validatable configuration objects
///
/// Returns `Ok(())` if valid, `Err(ConfigError)` with details if invalid.
pub trait Validatable {
    fn validate(&self) -> ConfigResult<()>;

    /// Configuration name for error messages
    fn config_name(&self) -> &'static str {
        "Config"
    }
}

/// Check `value` lies in `min..=max`
pub(crate) fn check_range<T>(field: &str, value: T, min: T, max: T, hint: &str) -> ConfigResult<()>
where
    T: PartialOrd + ToString + Copy,
{
    if value < min || value > max {
        return Err(super::ConfigError::range_with_hint(field, value, min, max, hint));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range_bounds_inclusive() {
        assert!(check_range("x", 1, 1, 4, "").is_ok());
        assert!(check_range("x", 4, 1, 4, "").is_ok());
        assert!(check_range("x", 5, 1, 4, "").is_err());
        assert!(check_range("x", 0, 1, 4, "").is_err());
    }
}
