use lazy_static::lazy_static;
use regex::Regex;

use crate::types::ValidationError;

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).expect("email pattern")
    };
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(email) {
        Err(ValidationError::from(
            "email",
            format!("Invalid email: {}", email),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().len() < 3 {
        Err(ValidationError::from(
            "username",
            format!("Username too short: {}", username),
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("jake@jake.jake").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("trailing@dot.").is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("jake").is_ok());
        assert!(validate_username("jk").is_err());
        assert!(validate_username("  a ").is_err());
    }
}
