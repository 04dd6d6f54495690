//! Checks applied to incoming requests before they reach a handler.
//!
//! Each check returns the first problem it finds as an [`APIError`], which
//! renders as a 400 response.

use jiff::{Timestamp, civil};
use payloads::validation::{Pattern, ValidationResult};
use serde_json::{Map, Value};

use crate::routes::APIError;

/// Requests that may ask for larger pages.
pub const ELEVATED_PAGE_LIMIT: u32 = 1000;
pub const PAGE_LIMIT: u32 = 100;

const DANGEROUS_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Whether `value` is a 24 character hex object id.
pub fn is_object_id(value: &str) -> bool {
    value.len() == 24 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Check named path ids. Empty ids are skipped.
pub fn validate_object_ids(ids: &[(&str, &str)]) -> Result<(), APIError> {
    for (name, value) in ids.iter().filter(|(_, value)| !value.is_empty()) {
        if *value == "undefined" {
            return Err(APIError::BadRequest(format!("{name} is required")));
        }
        if !is_object_id(value) {
            return Err(APIError::BadRequest(format!("Invalid {name} format")));
        }
    }
    Ok(())
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Every field in `fields` must be present, non-null and, for strings, not
/// blank.
pub fn validate_required(body: &Value, fields: &[&str]) -> Result<(), APIError> {
    let missing: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|field| is_blank(body.get(field)))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(APIError::BadRequest(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// Empty values count as "not provided" for the optional field checks.
fn provided<'a>(body: &'a Value, field: &str) -> Option<&'a Value> {
    body.get(field).filter(|value| match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    })
}

/// Check `email` when the body has one.
pub fn validate_email_field(body: &Value) -> Result<(), APIError> {
    match provided(body, "email") {
        Some(Value::String(email)) if Pattern::Email.matches(email) => Ok(()),
        Some(_) => Err(APIError::BadRequest("Invalid email format".into())),
        None => Ok(()),
    }
}

fn parses_as_date(value: &Value) -> bool {
    match value {
        Value::String(s) => {
            let s = s.trim();
            s.parse::<Timestamp>().is_ok()
                || s.parse::<civil::DateTime>().is_ok()
                || s.parse::<civil::Date>().is_ok()
        }
        Value::Number(n) => n
            .as_i64()
            .is_some_and(|ms| Timestamp::from_millisecond(ms).is_ok()),
        _ => false,
    }
}

/// Check that `field`, when provided, holds a date, a date and time, or a
/// millisecond timestamp.
pub fn validate_date(body: &Value, field: &str) -> Result<(), APIError> {
    match provided(body, field) {
        Some(value) if !parses_as_date(value) => Err(APIError::BadRequest(
            format!("Invalid date format for {field}"),
        )),
        _ => Ok(()),
    }
}

/// Numeric reading of a loosely typed value: numbers, numeric strings
/// (blank counts as zero) and booleans.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

/// Check that `field`, when present, is a number within the bounds.
pub fn validate_range(
    body: &Value,
    field: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<(), APIError> {
    let Some(value) = body.get(field).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    let Some(number) = as_number(value) else {
        return Err(APIError::BadRequest(format!("{field} must be a number")));
    };
    if let Some(min) = min
        && number < min
    {
        return Err(APIError::BadRequest(format!(
            "{field} must be at least {min}"
        )));
    }
    if let Some(max) = max
        && number > max
    {
        return Err(APIError::BadRequest(format!(
            "{field} must be at most {max}"
        )));
    }
    Ok(())
}

/// Check `page` and `limit` query parameters. `elevated` requests (admin
/// routes or authenticated callers) may ask for up to
/// [`ELEVATED_PAGE_LIMIT`] items.
pub fn validate_pagination(
    page: Option<&str>,
    limit: Option<&str>,
    elevated: bool,
) -> Result<(), APIError> {
    if let Some(page) = page.filter(|p| !p.is_empty()) {
        let number = as_number(&Value::String(page.to_string()));
        if !number.is_some_and(|n| n >= 1.0) {
            return Err(APIError::BadRequest(
                "Page must be a positive integer".into(),
            ));
        }
    }
    if let Some(limit) = limit.filter(|l| !l.is_empty()) {
        let max = if elevated { ELEVATED_PAGE_LIMIT } else { PAGE_LIMIT };
        let number = as_number(&Value::String(limit.to_string()));
        if !number.is_some_and(|n| (1.0..=f64::from(max)).contains(&n)) {
            return Err(APIError::BadRequest(format!(
                "Limit must be between 1 and {max}"
            )));
        }
    }
    Ok(())
}

/// Remove `__proto__`, `constructor` and `prototype` keys at every depth.
pub fn sanitize_input(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !DANGEROUS_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key, sanitize_input(value)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(sanitize_input).collect())
        }
        other => other,
    }
}

/// Turn the messages of a declarative field check into an error.
pub fn ensure_valid(result: ValidationResult) -> Result<(), APIError> {
    if result.is_valid() {
        Ok(())
    } else {
        Err(APIError::Validation(result.errors))
    }
}
