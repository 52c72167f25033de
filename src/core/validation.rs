//! Validation utilities for option values
//!
//! Shared by the command line parser (as clap `value_parser`s) and the config
//! file loader, so both report the same messages.

use std::time::Duration;

/// Validate positive integer value
pub fn validate_positive_int(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("Value must be greater than 0".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{}' is not a valid positive integer", value)),
    }
}

/// Validate a non-negative count (retries, max host errors)
pub fn validate_count(value: &str) -> Result<u32, String> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("'{}' is not a valid count", value))
}

/// Parse a duration such as `500ms`, `10s`, `2m` or a bare number of seconds
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let split_at = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split_at);
    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("'{}' is not a valid duration", value))?;

    match unit.trim() {
        "" | "s" => Ok(Duration::from_secs(amount)),
        "ms" => Ok(Duration::from_millis(amount)),
        "m" => Ok(Duration::from_secs(amount.saturating_mul(60))),
        other => Err(format!(
            "Unknown duration unit '{}' in '{}' (use ms, s or m)",
            other, value
        )),
    }
}

/// Parse a duration that must be greater than zero
pub fn parse_positive_duration(value: &str) -> Result<Duration, String> {
    let duration = parse_duration(value)?;
    if duration.is_zero() {
        return Err(format!("Duration '{}' must be greater than zero", value));
    }
    Ok(duration)
}

/// Validate the auto strategy crossover ratio
pub fn validate_ratio(value: &str) -> Result<f64, String> {
    match value.trim().parse::<f64>() {
        Ok(ratio) if ratio.is_finite() && ratio > 0.0 => Ok(ratio),
        Ok(_) => Err(format!("Ratio '{}' must be a positive number", value)),
        Err(_) => Err(format!("'{}' is not a valid number", value)),
    }
}
