use lazy_static::lazy_static;
use regex::Regex;
use validator::Validate;
use crate::errors::AppError;

pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), AppError> {
    payload.validate()
        .map_err(|err| AppError::BadRequest(err.to_string()))
}

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[a-zA-Z0-9_]{3,30}$").unwrap();
}

pub fn validate_username(username: &str) -> Result<(), AppError> {
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::BadRequest(
            "Username must be 3-30 characters: letters, digits or underscores".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_frequency(frequency: i32) -> Result<(), AppError> {
    if frequency <= 0 {
        return Err(AppError::BadRequest("Frequency must be greater than zero".to_string()));
    }
    Ok(())
}

// Regex validation for uri
pub fn validate_url(uri: &str) -> Result<(), AppError> {
    lazy_static! {
        static ref URL_RE: Regex = Regex::new(r"^https?://[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}(/[^\s]*)?$").unwrap();
    }
    if !URL_RE.is_match(uri) {
        return Err(AppError::BadRequest("Invalid URI. It should be URI".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_shape() {
        assert!(validate_username("olivesarenice").is_ok());
        assert!(validate_username("user_42").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("dots.not.ok").is_err());
    }

    #[test]
    fn frequency_must_be_positive() {
        assert!(validate_frequency(3).is_ok());
        assert!(validate_frequency(0).is_err());
        assert!(validate_frequency(-1).is_err());
    }
}
