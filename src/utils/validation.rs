use crate::error::{AppError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// 验证 HH:mm 本地时间字符串 (免打扰时段边界)
pub fn validate_clock_string(value: &str) -> Result<()> {
    static CLOCK_RE: OnceLock<Regex> = OnceLock::new();

    let pattern = CLOCK_RE.get_or_init(|| {
        Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").unwrap()
    });

    if !pattern.is_match(value) {
        return Err(AppError::Validation(format!(
            "'{}' is not a valid HH:mm clock string",
            value
        )));
    }

    Ok(())
}

/// 验证 IANA 时区名称
pub fn validate_timezone(value: &str) -> Result<()> {
    if value.parse::<chrono_tz::Tz>().is_err() {
        return Err(AppError::Validation(format!(
            "'{}' is not a valid IANA timezone",
            value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_string_accepts_valid_times() {
        assert!(validate_clock_string("00:00").is_ok());
        assert!(validate_clock_string("07:30").is_ok());
        assert!(validate_clock_string("22:00").is_ok());
        assert!(validate_clock_string("23:59").is_ok());
    }

    #[test]
    fn test_clock_string_rejects_invalid_times() {
        assert!(validate_clock_string("24:00").is_err());
        assert!(validate_clock_string("7:30").is_err());
        assert!(validate_clock_string("22:60").is_err());
        assert!(validate_clock_string("2200").is_err());
        assert!(validate_clock_string("").is_err());
    }

    #[test]
    fn test_timezone_validation() {
        assert!(validate_timezone("America/New_York").is_ok());
        assert!(validate_timezone("Asia/Shanghai").is_ok());
        assert!(validate_timezone("UTC").is_ok());
        assert!(validate_timezone("Mars/Olympus_Mons").is_err());
    }
}
