// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Input validation for registration and password changes.

use crate::error::ValidationErrors;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const NAME_MAX: usize = 100;

/// Checks a username: 3 to 32 characters of `[A-Za-z0-9_]`.
pub fn check_username(username: &str, errors: &mut ValidationErrors) {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        errors.add(
            "username",
            format!("must be between {} and {} characters", USERNAME_MIN, USERNAME_MAX),
        );
    } else if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        errors.add("username", "may only contain letters, digits and underscores");
    }
}

/// Checks an email: exactly one `@` with non-empty local and domain parts.
pub fn check_email(email: &str, errors: &mut ValidationErrors) {
    let mut parts = email.split('@');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    };
    if !valid {
        errors.add("email", "must be a valid email address");
    }
}

/// Checks a password against the minimum length.
pub fn check_password(field: &str, password: &str, min_length: usize, errors: &mut ValidationErrors) {
    if password.chars().count() < min_length {
        errors.add(field, format!("must be at least {} characters", min_length));
    }
}

/// Checks a display name: non-empty after trimming, at most 100 characters.
pub fn check_name(name: &str, errors: &mut ValidationErrors) {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        errors.add("name", "must not be empty");
    } else if trimmed.chars().count() > NAME_MAX {
        errors.add("name", format!("must be at most {} characters", NAME_MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn username_ok(s: &str) -> bool {
        let mut errors = ValidationErrors::new();
        check_username(s, &mut errors);
        errors.is_empty()
    }

    fn email_ok(s: &str) -> bool {
        let mut errors = ValidationErrors::new();
        check_email(s, &mut errors);
        errors.is_empty()
    }

    #[test]
    fn test_username() {
        assert!(username_ok("alice"));
        assert!(username_ok("a_1"));
        assert!(username_ok(&"x".repeat(32)));
        assert!(!username_ok("ab"));
        assert!(!username_ok(&"x".repeat(33)));
        assert!(!username_ok("al ice"));
        assert!(!username_ok("alice!"));
    }

    #[test]
    fn test_email() {
        assert!(email_ok("alice@example.com"));
        assert!(email_ok("a@b"));
        assert!(!email_ok("alice"));
        assert!(!email_ok("@example.com"));
        assert!(!email_ok("alice@"));
        assert!(!email_ok("a@b@c"));
        assert!(!email_ok("al ice@example.com"));
    }

    #[test]
    fn test_password_and_name() {
        let mut errors = ValidationErrors::new();
        check_password("password", "short", 8, &mut errors);
        check_name("   ", &mut errors);
        assert!(errors.has_field("password"));
        assert!(errors.has_field("name"));

        let mut errors = ValidationErrors::new();
        check_password("password", "longenough", 8, &mut errors);
        check_name("Alice", &mut errors);
        check_name(&"n".repeat(100), &mut errors);
        assert!(errors.is_empty());

        check_name(&"n".repeat(101), &mut errors);
        assert!(errors.has_field("name"));
    }
}
