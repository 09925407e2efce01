use crate::utils::error::{AppError, AppResult};

pub const MAX_MESSAGE_LENGTH: usize = 1000;

fn is_printable_ascii(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii() && !c.is_ascii_control())
}

pub fn validate_username(username: &str) -> AppResult<()> {
    if username.is_empty() {
        return Err(AppError::Validation("Username cannot be empty".to_string()));
    }

    if username.len() > 64 {
        return Err(AppError::Validation(
            "Username must be at most 64 characters long".to_string(),
        ));
    }

    if !is_printable_ascii(username) {
        return Err(AppError::Validation(
            "Username must contain only printable ASCII characters".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.is_empty() {
        return Err(AppError::Validation("Password cannot be empty".to_string()));
    }

    if password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be at most 128 characters long".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_message_content(content: &str) -> AppResult<()> {
    if content.is_empty() {
        return Err(AppError::Validation(
            "Message content cannot be empty".to_string(),
        ));
    }

    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(AppError::Validation(format!(
            "Message content must be at most {} characters long",
            MAX_MESSAGE_LENGTH
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content_rejected() {
        assert!(validate_message_content("").is_err());
    }

    #[test]
    fn test_max_length_boundary() {
        let at_limit = "a".repeat(MAX_MESSAGE_LENGTH);
        assert!(validate_message_content(&at_limit).is_ok());

        let over_limit = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(validate_message_content(&over_limit).is_err());
    }

    #[test]
    fn test_multibyte_content_counted_by_chars() {
        // 500 two-byte characters is 1000 bytes but only 500 characters
        let content = "ü".repeat(500);
        assert!(validate_message_content(&content).is_ok());
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("anna_92").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username(&"x".repeat(65)).is_err());
        assert!(validate_username("bad\nname").is_err());
    }
}
