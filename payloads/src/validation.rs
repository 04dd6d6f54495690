//! Declarative validation rules for user-supplied fields.
//!
//! The rule tables are plain constants so the frontend can show limits next
//! to inputs and the backend can enforce the same limits on requests.

use std::fmt;
use std::str::FromStr;

/// A character-level pattern a field must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// ASCII letters, digits, underscores and hyphens.
    UsernameChars,
    /// `local@domain.tld` with no whitespace and exactly one `@`. The domain
    /// needs a dot with text on both sides; other dots are not checked.
    Email,
}

impl Pattern {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::UsernameChars => {
                !value.is_empty()
                    && value
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            }
            Self::Email => is_email(value),
        }
    }
}

fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    // any dot with something on both sides of it
    domain
        .match_indices('.')
        .any(|(dot, _)| dot > 0 && dot + 1 < domain.len())
}

/// Rules for a single text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRules {
    /// Human readable field name used in messages.
    pub label: &'static str,
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Pattern>,
    pub pattern_description: Option<&'static str>,
}

impl FieldRules {
    /// Check a value against these rules. An empty optional field passes.
    pub fn check(&self, value: &str) -> ValidationResult {
        let mut result = ValidationResult::default();
        if value.is_empty() {
            if self.required {
                result.push(format!("{} is required", self.label));
            }
            return result;
        }

        let length = value.chars().count();
        if let Some(min) = self.min_length
            && length < min
        {
            result.push(format!(
                "{} must be at least {min} characters",
                self.label
            ));
        }
        if let Some(max) = self.max_length
            && length > max
        {
            result.push(format!(
                "{} must not exceed {max} characters",
                self.label
            ));
        }
        if let Some(pattern) = self.pattern
            && !pattern.matches(value)
        {
            result.push(
                self.pattern_description
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{} is invalid", self.label)),
            );
        }
        result
    }
}

pub const USERNAME_RULES: FieldRules = FieldRules {
    label: "Username",
    required: true,
    min_length: Some(3),
    max_length: Some(50),
    pattern: Some(Pattern::UsernameChars),
    pattern_description: Some(
        "Username can only contain letters, numbers, underscores, and hyphens",
    ),
};

pub const EMAIL_RULES: FieldRules = FieldRules {
    label: "Email",
    required: true,
    min_length: None,
    max_length: None,
    pattern: Some(Pattern::Email),
    pattern_description: Some("Invalid email format"),
};

pub const NAME_RULES: FieldRules = FieldRules {
    label: "Name",
    required: false,
    min_length: None,
    max_length: Some(50),
    pattern: None,
    pattern_description: None,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordRules {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_number: bool,
    pub require_special: bool,
}

pub const PASSWORD_RULES: PasswordRules = PasswordRules {
    min_length: 8,
    max_length: 128,
    require_uppercase: true,
    require_lowercase: true,
    require_number: true,
    require_special: false,
};

const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Superadmin,
    Admin,
    User,
}

pub const VALID_ROLES: [Role; 3] = [Role::Superadmin, Role::Admin, Role::User];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Superadmin => "superadmin",
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VALID_ROLES
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
    Other,
}

pub const VALID_GENDERS: [Gender; 3] =
    [Gender::Male, Gender::Female, Gender::Other];

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VALID_GENDERS
            .into_iter()
            .find(|gender| gender.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Every message produced while validating one or more fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, error: String) {
        self.errors.push(error);
    }

    /// Merge several results, keeping the order of their messages.
    pub fn combine(
        results: impl IntoIterator<Item = ValidationResult>,
    ) -> ValidationResult {
        ValidationResult {
            errors: results.into_iter().flat_map(|r| r.errors).collect(),
        }
    }
}

pub fn validate_password(password: &str) -> ValidationResult {
    let rules = PASSWORD_RULES;
    let mut result = ValidationResult::default();
    let length = password.chars().count();

    if length < rules.min_length {
        result.push(format!(
            "Password must be at least {} characters",
            rules.min_length
        ));
    }
    if length > rules.max_length {
        result.push(format!(
            "Password must not exceed {} characters",
            rules.max_length
        ));
    }
    if rules.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase())
    {
        result.push(
            "Password must contain at least one uppercase letter".to_string(),
        );
    }
    if rules.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase())
    {
        result.push(
            "Password must contain at least one lowercase letter".to_string(),
        );
    }
    if rules.require_number && !password.chars().any(|c| c.is_ascii_digit()) {
        result.push("Password must contain at least one number".to_string());
    }
    if rules.require_special
        && !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c))
    {
        result.push(
            "Password must contain at least one special character".to_string(),
        );
    }
    result
}

pub fn validate_username(username: &str) -> ValidationResult {
    USERNAME_RULES.check(username)
}

pub fn validate_email(email: &str) -> ValidationResult {
    EMAIL_RULES.check(email)
}

pub fn validate_name(name: &str) -> ValidationResult {
    NAME_RULES.check(name)
}

pub fn validate_roles<S: AsRef<str>>(roles: &[S]) -> ValidationResult {
    let invalid: Vec<&str> = roles
        .iter()
        .map(AsRef::as_ref)
        .filter(|role| role.parse::<Role>().is_err())
        .collect();
    let mut result = ValidationResult::default();
    if !invalid.is_empty() {
        result.push(format!("Invalid roles: {}", invalid.join(", ")));
    }
    result
}

pub fn validate_gender(gender: &str) -> ValidationResult {
    let mut result = ValidationResult::default();
    if gender.parse::<Gender>().is_err() {
        let valid: Vec<&str> =
            VALID_GENDERS.iter().map(Gender::as_str).collect();
        result.push(format!(
            "Invalid gender. Must be one of: {}",
            valid.join(", ")
        ));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_reports_every_missing_class() {
        let result = validate_password("short");
        assert!(!result.is_valid());
        assert_eq!(
            result.errors,
            vec![
                "Password must be at least 8 characters",
                "Password must contain at least one uppercase letter",
                "Password must contain at least one number",
            ]
        );
        assert!(validate_password("Str0ngEnough").is_valid());
    }

    #[test]
    fn password_length_cap() {
        let long = format!("Aa1{}", "x".repeat(200));
        assert_eq!(
            validate_password(&long).errors,
            vec!["Password must not exceed 128 characters"]
        );
    }

    #[test]
    fn username_rules() {
        assert_eq!(
            validate_username("").errors,
            vec!["Username is required"]
        );
        assert_eq!(
            validate_username("ab").errors,
            vec!["Username must be at least 3 characters"]
        );
        assert_eq!(
            validate_username("bad name").errors,
            vec![
                "Username can only contain letters, numbers, underscores, and hyphens"
            ]
        );
        assert!(validate_username("court_king-7").is_valid());
        assert!(!validate_username(&"a".repeat(51)).is_valid());
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("player@example.com").is_valid());
        assert_eq!(validate_email("").errors, vec!["Email is required"]);
        for bad in ["not-an-email", "a@b", "a b@c.de", "@x.io", "a@.", "a@b@c.de"]
        {
            assert_eq!(
                validate_email(bad).errors,
                vec!["Invalid email format"],
                "{bad}"
            );
        }
    }

    #[test]
    fn email_domain_needs_one_inner_dot() {
        for good in ["user@example.com.", "a@b..", "a@.b.c", "x@mail.co.uk"] {
            assert!(Pattern::Email.matches(good), "{good}");
        }
        for bad in ["a@b.", "a@.b", "a@..", "a@example"] {
            assert!(!Pattern::Email.matches(bad), "{bad}");
        }
    }

    #[test]
    fn name_is_optional_but_capped() {
        assert!(validate_name("").is_valid());
        assert_eq!(
            validate_name(&"n".repeat(51)).errors,
            vec!["Name must not exceed 50 characters"]
        );
    }

    #[test]
    fn roles_and_genders() {
        assert!(validate_roles(&["admin", "user"]).is_valid());
        assert_eq!(
            validate_roles(&["admin", "root", "guest"]).errors,
            vec!["Invalid roles: root, guest"]
        );
        assert_eq!("superadmin".parse::<Role>(), Ok(Role::Superadmin));
        assert!(validate_gender("other").is_valid());
        assert_eq!(
            validate_gender("unknown").errors,
            vec!["Invalid gender. Must be one of: male, female, other"]
        );
    }

    #[test]
    fn combine_keeps_order() {
        let combined = ValidationResult::combine([
            validate_username("ab"),
            validate_email("nope"),
        ]);
        assert_eq!(
            combined.errors,
            vec!["Username must be at least 3 characters", "Invalid email format"]
        );
    }
}
