//! Small validators shared by settings and scan configuration checks.
use std::ops::RangeInclusive;

/// Validates if a given string is a usable file path.
///
/// # Arguments
///
/// * `path` - The string to validate.
///
/// # Returns
///
/// * `Ok(())` if the file path is valid.
/// * `Err(&'static str)` if the file path is invalid.
pub fn is_valid_path(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Err("File path cannot be empty");
    }
    if path.contains('\0') {
        return Err("File path cannot contain null bytes");
    }
    Ok(())
}

/// Validates if a given value is within a specified inclusive range.
///
/// Incomparable values (`f64::NAN`) are outside every range.
///
/// # Arguments
///
/// * `value` - The value to validate.
/// * `range` - The inclusive range to validate against.
///
/// # Returns
///
/// * `Ok(())` if the value is within the range.
/// * `Err(&'static str)` if the value is outside the range.
pub fn is_in_range<T: PartialOrd>(value: T, range: RangeInclusive<T>) -> Result<(), &'static str> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err("Value is outside the specified range")
    }
}

/// Validates that a float is finite and strictly greater than zero.
pub fn is_positive_finite(value: f64) -> Result<(), &'static str> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err("Value must be a positive finite number")
    }
}

/// Validates that `start <= end`.
pub fn is_ordered<T: PartialOrd>(start: T, end: T) -> Result<(), &'static str> {
    if start <= end {
        Ok(())
    } else {
        Err("Range start must not exceed range end")
    }
}

/// Validates if a given string is not empty.
pub fn is_not_empty(value: &str) -> Result<(), &'static str> {
    if !value.is_empty() {
        Ok(())
    } else {
        Err("Value cannot be empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_check_is_inclusive() {
        assert!(is_in_range(1u32, 1..=10).is_ok());
        assert!(is_in_range(10u32, 1..=10).is_ok());
        assert!(is_in_range(11u32, 1..=10).is_err());
    }

    #[test]
    fn nan_is_never_in_range() {
        assert!(is_in_range(f64::NAN, 0.0..=f64::MAX).is_err());
    }

    #[test]
    fn positive_finite() {
        assert!(is_positive_finite(0.1).is_ok());
        assert!(is_positive_finite(0.0).is_err());
        assert!(is_positive_finite(-1.0).is_err());
        assert!(is_positive_finite(f64::INFINITY).is_err());
    }

    #[test]
    fn paths() {
        assert!(is_valid_path("data").is_ok());
        assert!(is_valid_path("").is_err());
        assert!(is_valid_path("a\0b").is_err());
    }

    #[test]
    fn ordering_and_emptiness() {
        assert!(is_ordered(1, 1).is_ok());
        assert!(is_ordered(2.0, 1.0).is_err());
        assert!(is_not_empty("x").is_ok());
        assert!(is_not_empty("").is_err());
    }
}
