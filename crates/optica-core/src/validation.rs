//! # Validation Module
//!
//! Input validation for registration, examination and sale forms.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Front end forms     required fields, basic formats            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE         names, phone, email, optical ranges       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite              NOT NULL, UNIQUE, FOREIGN KEY, CHECK      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Optical Ranges
//! | Measurement | Range | Unit |
//! |-------------|-------|------|
//! | sphere | -30.00 to +30.00 | dioptres |
//! | cylinder | -10.00 to +10.00 | dioptres |
//! | axis | 0 to 180 | degrees |
//! | addition | 0.00 to +4.00 | dioptres |
//! | pupillary distance | 40 to 80 | mm |

use crate::error::ValidationError;
use crate::types::EyeMeasurement;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_TEXT_LEN: usize = 2000;
pub const MAX_SALE_QUANTITY: i64 = 999;
pub const MAX_LIST_LIMIT: u32 = 500;

pub const SPHERE_RANGE: (f64, f64) = (-30.0, 30.0);
pub const CYLINDER_RANGE: (f64, f64) = (-10.0, 10.0);
pub const AXIS_RANGE: (i64, i64) = (0, 180);
pub const ADDITION_RANGE: (f64, f64) = (0.0, 4.0);
pub const PD_RANGE: (f64, f64) = (40.0, 80.0);

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required short text field such as a name or brand.
///
/// Returns the trimmed value.
pub fn validate_required(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Validates an optional text field; blank input becomes `None`.
pub fn validate_optional(field: &str, value: Option<&str>, max: usize) -> ValidationResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        Some(v) => Ok(Some(v.to_string())),
    }
}

/// Validates a phone number.
///
/// ## Rules
/// - Digits, spaces, `-`, `(`, `)` and a leading `+`
/// - 7 to 15 digits
pub fn validate_phone(phone: &str) -> ValidationResult<String> {
    let phone = validate_required("phone", phone, 20)?;

    let mut digits = 0;
    for (i, c) in phone.chars().enumerate() {
        match c {
            '0'..='9' => digits += 1,
            '+' if i == 0 => {}
            ' ' | '-' | '(' | ')' => {}
            _ => {
                return Err(ValidationError::InvalidFormat {
                    field: "phone".to_string(),
                    reason: format!("unexpected character '{}'", c),
                })
            }
        }
    }

    if !(7..=15).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain 7 to 15 digits".to_string(),
        });
    }

    Ok(phone)
}

/// Validates an optional email address.
pub fn validate_email(email: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(email) = validate_optional("email", email, 254)? else {
        return Ok(None);
    };

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "expected name@domain".to_string(),
        });
    }

    Ok(Some(email))
}

/// Validates a list limit, clamping absent values to a default.
pub fn validate_limit(limit: Option<u32>, default: u32) -> ValidationResult<u32> {
    match limit {
        None => Ok(default),
        Some(0) => Err(ValidationError::MustBePositive {
            field: "limit".to_string(),
        }),
        Some(n) if n > MAX_LIST_LIMIT => Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: "1".to_string(),
            max: MAX_LIST_LIMIT.to_string(),
        }),
        Some(n) => Ok(n),
    }
}

// =============================================================================
// Optical Validators
// =============================================================================

fn check_range(field: String, value: Option<f64>, (min, max): (f64, f64)) -> ValidationResult<()> {
    match value {
        Some(v) if !v.is_finite() || v < min || v > max => Err(ValidationError::OutOfRange {
            field,
            min: format!("{:.2}", min),
            max: format!("{:.2}", max),
        }),
        _ => Ok(()),
    }
}

/// Validates one eye's measurements. `side` is `right` or `left`.
pub fn validate_eye(side: &str, eye: &EyeMeasurement) -> ValidationResult<()> {
    check_range(format!("{side}.sphere"), eye.sphere, SPHERE_RANGE)?;
    check_range(format!("{side}.cylinder"), eye.cylinder, CYLINDER_RANGE)?;
    check_range(format!("{side}.addition"), eye.addition, ADDITION_RANGE)?;

    if let Some(axis) = eye.axis {
        if axis < AXIS_RANGE.0 || axis > AXIS_RANGE.1 {
            return Err(ValidationError::OutOfRange {
                field: format!("{side}.axis"),
                min: AXIS_RANGE.0.to_string(),
                max: AXIS_RANGE.1.to_string(),
            });
        }
    }

    // An axis without cylinder has no meaning.
    if eye.axis.is_some() && eye.cylinder.map_or(true, |c| c == 0.0) {
        return Err(ValidationError::Inconsistent(format!(
            "{side}.axis requires a non-zero cylinder"
        )));
    }

    validate_optional(&format!("{side}.visual_acuity"), eye.visual_acuity.as_deref(), 20)?;
    Ok(())
}

pub fn validate_pupillary_distance(pd: Option<f64>) -> ValidationResult<()> {
    check_range("pupillary_distance".to_string(), pd, PD_RANGE)
}

// =============================================================================
// Unit Tests
// =============================================================================
