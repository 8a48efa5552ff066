//! Input validation for profiles and curves
//!
//! Everything reaching the control loop from configuration or IPC passes
//! through these checks first.

use crate::constants::control;
use crate::data::Breakpoint;
use crate::error::{Result, UccError};
use ucc_protocol::{MAX_TEMPERATURE, MIN_TEMPERATURE};

/// Validates that a percentage is within the valid range (0-100)
pub fn validate_percent(field: &str, value: i32) -> Result<i32> {
    if !(control::MIN_PERCENT..=control::MAX_PERCENT).contains(&value) {
        return Err(UccError::invalid_profile(
            field,
            format!("{} is outside 0-100", value),
        ));
    }
    Ok(value)
}

/// Validates a signed speed offset (-100..=100)
pub fn validate_offset(value: i32) -> Result<i32> {
    if !(-control::MAX_OFFSET_PERCENT..=control::MAX_OFFSET_PERCENT).contains(&value) {
        return Err(UccError::invalid_profile(
            "offset",
            format!("{} is outside -100..100", value),
        ));
    }
    Ok(value)
}

/// Validates a curve table: non-empty, values in range, temperatures non-decreasing
pub fn validate_breakpoints(points: &[Breakpoint]) -> Result<()> {
    if points.is_empty() {
        return Err(UccError::invalid_curve("curve has no breakpoints"));
    }

    for (i, point) in points.iter().enumerate() {
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&point.temp) {
            return Err(UccError::invalid_curve(format!(
                "breakpoint {} temperature {} is outside {}..{}",
                i, point.temp, MIN_TEMPERATURE, MAX_TEMPERATURE
            )));
        }
        if !(control::MIN_PERCENT..=control::MAX_PERCENT).contains(&point.speed) {
            return Err(UccError::invalid_curve(format!(
                "breakpoint {} speed {} is outside 0-100",
                i, point.speed
            )));
        }
    }

    if let Some(i) = points.windows(2).position(|w| w[1].temp < w[0].temp) {
        return Err(UccError::invalid_curve(format!(
            "breakpoint {} temperature {} is below previous {}",
            i + 1,
            points[i + 1].temp,
            points[i].temp
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_percent() {
        assert!(validate_percent("min_speed", 0).is_ok());
        assert!(validate_percent("min_speed", 100).is_ok());
        assert!(validate_percent("min_speed", 101).is_err());
        assert!(validate_percent("min_speed", -1).is_err());
    }

    #[test]
    fn test_validate_offset() {
        assert!(validate_offset(-100).is_ok());
        assert!(validate_offset(100).is_ok());
        assert!(validate_offset(-101).is_err());
    }

    #[test]
    fn test_validate_breakpoints() {
        assert!(validate_breakpoints(&[]).is_err());
        assert!(validate_breakpoints(&[Breakpoint::new(50, 30)]).is_ok());

        // equal temperatures are allowed
        let flat = [Breakpoint::new(50, 30), Breakpoint::new(50, 60)];
        assert!(validate_breakpoints(&flat).is_ok());

        let decreasing = [Breakpoint::new(60, 30), Breakpoint::new(50, 60)];
        let err = validate_breakpoints(&decreasing).unwrap_err();
        assert!(err.to_string().contains("breakpoint 1"));

        let too_fast = [Breakpoint::new(50, 130)];
        assert!(validate_breakpoints(&too_fast).is_err());
    }

    #[test]
    fn test_validate_breakpoint_temperature_range() {
        let edges = [Breakpoint::new(MIN_TEMPERATURE, 0), Breakpoint::new(MAX_TEMPERATURE, 100)];
        assert!(validate_breakpoints(&edges).is_ok());

        let extreme = [Breakpoint::new(i32::MIN, 0), Breakpoint::new(i32::MAX, 100)];
        let err = validate_breakpoints(&extreme).unwrap_err();
        assert!(err.to_string().contains("breakpoint 0 temperature"));

        let hot = [Breakpoint::new(40, 0), Breakpoint::new(MAX_TEMPERATURE + 1, 100)];
        assert!(validate_breakpoints(&hot).is_err());
    }
}
