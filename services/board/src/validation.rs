//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Characters allowed in a password besides ASCII letters and digits
const PASSWORD_SPECIALS: &str = "@$!%*?&";

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a display name. Any script is fine; control characters are not.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    if username.chars().count() > 32 {
        return Err("Username must be at most 32 characters long".to_string());
    }

    if username.chars().any(char::is_control) {
        return Err("Username must not contain control characters".to_string());
    }

    Ok(())
}

/// Validate password
///
/// 8 to 20 characters drawn from ASCII letters, digits and `@$!%*?&`, with
/// at least one lowercase letter, uppercase letter, digit and special
/// character.
pub fn validate_password(password: &str) -> Result<(), String> {
    const POLICY: &str = "Password must be 8 to 20 characters and contain at least one uppercase letter, lowercase letter, digit and special character (@$!%*?&)";

    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    let length = password.chars().count();
    if !(8..=20).contains(&length) {
        return Err(POLICY.to_string());
    }

    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_digit = false;
    let mut has_special = false;

    for c in password.chars() {
        if c.is_ascii_uppercase() {
            has_upper = true;
        } else if c.is_ascii_lowercase() {
            has_lower = true;
        } else if c.is_ascii_digit() {
            has_digit = true;
        } else if PASSWORD_SPECIALS.contains(c) {
            has_special = true;
        } else {
            return Err(POLICY.to_string());
        }
    }

    if !(has_upper && has_lower && has_digit && has_special) {
        return Err(POLICY.to_string());
    }

    Ok(())
}
