//! # Domain Types
//!
//! Records of the optical shop and the inputs that create or change them.
//!
//! ## Entity Relationships
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Client (M/2025/03/1)                                                 │
//! │     │                                                                   │
//! │     ├──< Prescription (uuid)   one per examination, newest is active   │
//! │     │         ▲                                                         │
//! │     │         │ referenced by                                           │
//! │     └──< Sale (SALE/2025/03/001)                                       │
//! │                                                                         │
//! │   Notification   side log of events, not owned by any record           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Input structs (`New*`, `*Update`) carry a `validate` method that trims and
//! checks every field and returns the normalized value.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::event::EventKind;
use crate::money::Money;
use crate::sale::SaleAmounts;
use crate::status::RecordStatus;
use crate::validation::{
    validate_email, validate_eye, validate_optional, validate_phone, validate_pupillary_distance,
    validate_required, ValidationResult, MAX_NAME_LEN, MAX_TEXT_LEN,
};

const MAX_KEY_LEN: usize = 128;

// =============================================================================
// Client
// =============================================================================

/// A registered customer, keyed by registration number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Client {
    /// `M/<year>/<month>/<seq>`; immutable once assigned.
    pub registration_number: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub gender: Option<String>,
    #[ts(as = "Option<String>")]
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub status: RecordStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Registration form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewClient {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    /// Replaying a request with the same key returns the first result.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl NewClient {
    /// Trims and validates every field.
    ///
    /// `today` bounds the date of birth.
    pub fn validate(self, today: NaiveDate) -> ValidationResult<NewClient> {
        if let Some(dob) = self.date_of_birth {
            if dob > today {
                return Err(ValidationError::Inconsistent(
                    "date_of_birth is in the future".to_string(),
                ));
            }
        }

        Ok(NewClient {
            first_name: validate_required("first_name", &self.first_name, MAX_NAME_LEN)?,
            last_name: validate_required("last_name", &self.last_name, MAX_NAME_LEN)?,
            phone: validate_phone(&self.phone)?,
            email: validate_email(self.email.as_deref())?,
            gender: validate_optional("gender", self.gender.as_deref(), 20)?,
            date_of_birth: self.date_of_birth,
            address: validate_optional("address", self.address.as_deref(), MAX_TEXT_LEN)?,
            occupation: validate_optional("occupation", self.occupation.as_deref(), MAX_NAME_LEN)?,
            idempotency_key: validate_optional("idempotency_key", self.idempotency_key.as_deref(), MAX_KEY_LEN)?,
        })
    }
}

/// Contact detail changes; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClientUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
}

impl ClientUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.address.is_none()
            && self.occupation.is_none()
    }

    /// Applies the update to `client`, validating each provided field.
    pub fn apply(self, client: &Client) -> ValidationResult<Client> {
        let mut updated = client.clone();
        if let Some(v) = self.first_name {
            updated.first_name = validate_required("first_name", &v, MAX_NAME_LEN)?;
        }
        if let Some(v) = self.last_name {
            updated.last_name = validate_required("last_name", &v, MAX_NAME_LEN)?;
        }
        if let Some(v) = self.phone {
            updated.phone = validate_phone(&v)?;
        }
        if let Some(v) = self.email {
            updated.email = validate_email(Some(&v))?;
        }
        if let Some(v) = self.address {
            updated.address = validate_optional("address", Some(&v), MAX_TEXT_LEN)?;
        }
        if let Some(v) = self.occupation {
            updated.occupation = validate_optional("occupation", Some(&v), MAX_NAME_LEN)?;
        }
        Ok(updated)
    }
}

/// Client with the records an optometrist or front desk needs at a glance.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClientDetail {
    pub client: Client,
    pub latest_prescription: Option<Prescription>,
    pub sales: Vec<Sale>,
}

// =============================================================================
// Prescription
// =============================================================================

/// Measurements for one eye. Absent values were not measured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EyeMeasurement {
    #[serde(default)]
    pub sphere: Option<f64>,
    #[serde(default)]
    pub cylinder: Option<f64>,
    #[serde(default)]
    pub axis: Option<i64>,
    #[serde(default)]
    pub addition: Option<f64>,
    #[serde(default)]
    pub visual_acuity: Option<String>,
}

/// One examination of a client. Stored flat, one column per measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Prescription {
    pub id: String,
    pub client_id: String,
    pub right_sphere: Option<f64>,
    pub right_cylinder: Option<f64>,
    pub right_axis: Option<i64>,
    pub right_addition: Option<f64>,
    pub right_visual_acuity: Option<String>,
    pub left_sphere: Option<f64>,
    pub left_cylinder: Option<f64>,
    pub left_axis: Option<i64>,
    pub left_addition: Option<f64>,
    pub left_visual_acuity: Option<String>,
    pub pupillary_distance: Option<f64>,
    pub clinical_history: Option<String>,
    pub examined_by: String,
    #[ts(as = "String")]
    pub exam_date: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Prescription {
    pub fn right_eye(&self) -> EyeMeasurement {
        EyeMeasurement {
            sphere: self.right_sphere,
            cylinder: self.right_cylinder,
            axis: self.right_axis,
            addition: self.right_addition,
            visual_acuity: self.right_visual_acuity.clone(),
        }
    }

    pub fn left_eye(&self) -> EyeMeasurement {
        EyeMeasurement {
            sphere: self.left_sphere,
            cylinder: self.left_cylinder,
            axis: self.left_axis,
            addition: self.left_addition,
            visual_acuity: self.left_visual_acuity.clone(),
        }
    }
}

/// Examination form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPrescription {
    pub client_id: String,
    #[serde(default)]
    pub right: EyeMeasurement,
    #[serde(default)]
    pub left: EyeMeasurement,
    #[serde(default)]
    pub pupillary_distance: Option<f64>,
    #[serde(default)]
    pub clinical_history: Option<String>,
    pub examined_by: String,
    /// Defaults to the day the examination is recorded.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub exam_date: Option<NaiveDate>,
}

impl NewPrescription {
    pub fn validate(self, today: NaiveDate) -> ValidationResult<NewPrescription> {
        let client_id = validate_required("client_id", &self.client_id, MAX_NAME_LEN)?;
        validate_eye("right", &self.right)?;
        validate_eye("left", &self.left)?;
        validate_pupillary_distance(self.pupillary_distance)?;

        if self.exam_date.is_some_and(|d| d > today) {
            return Err(ValidationError::Inconsistent(
                "exam_date is in the future".to_string(),
            ));
        }

        Ok(NewPrescription {
            client_id,
            right: self.right,
            left: self.left,
            pupillary_distance: self.pupillary_distance,
            clinical_history: validate_optional(
                "clinical_history",
                self.clinical_history.as_deref(),
                MAX_TEXT_LEN,
            )?,
            examined_by: validate_required("examined_by", &self.examined_by, MAX_NAME_LEN)?,
            exam_date: Some(self.exam_date.unwrap_or(today)),
        })
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sales order, keyed by a UUID and carrying a human reference number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// `SALE/<year>/<month>/<seq:3>`; immutable once assigned.
    pub reference_number: String,
    pub client_id: String,
    pub prescription_id: String,
    pub brand: String,
    pub model: String,
    pub color: Option<String>,
    pub lens_type: Option<String>,
    pub amount_cents: i64,
    pub quantity: i64,
    pub total_cents: i64,
    pub advance_cents: i64,
    pub balance_cents: i64,
    pub requires_job: bool,
    #[ts(as = "Option<String>")]
    pub delivery_date: Option<NaiveDate>,
    pub status: RecordStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    pub fn amounts(&self) -> SaleAmounts {
        SaleAmounts {
            amount_cents: self.amount_cents,
            quantity: self.quantity,
            advance_cents: self.advance_cents,
            total_cents: self.total_cents,
            balance_cents: self.balance_cents,
        }
    }

    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

/// Sale order form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    pub client_id: String,
    /// The client's latest prescription is used when omitted.
    #[serde(default)]
    pub prescription_id: Option<String>,
    pub brand: String,
    pub model: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub lens_type: Option<String>,
    pub amount_cents: i64,
    pub quantity: i64,
    #[serde(default)]
    pub advance_cents: i64,
    /// Lenses must be made by the lab before collection.
    #[serde(default)]
    pub requires_job: bool,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl NewSale {
    /// Validates the form and computes its amounts.
    pub fn validate(self, today: NaiveDate) -> ValidationResult<(NewSale, SaleAmounts)> {
        let amounts = SaleAmounts::compute(self.amount_cents, self.quantity, self.advance_cents)?;

        if self.delivery_date.is_some_and(|d| d < today) {
            return Err(ValidationError::Inconsistent(
                "delivery_date is in the past".to_string(),
            ));
        }

        let sale = NewSale {
            client_id: validate_required("client_id", &self.client_id, MAX_NAME_LEN)?,
            prescription_id: validate_optional("prescription_id", self.prescription_id.as_deref(), MAX_NAME_LEN)?,
            brand: validate_required("brand", &self.brand, MAX_NAME_LEN)?,
            model: validate_required("model", &self.model, MAX_NAME_LEN)?,
            color: validate_optional("color", self.color.as_deref(), MAX_NAME_LEN)?,
            lens_type: validate_optional("lens_type", self.lens_type.as_deref(), MAX_NAME_LEN)?,
            amount_cents: amounts.amount_cents,
            quantity: amounts.quantity,
            advance_cents: amounts.advance_cents,
            requires_job: self.requires_job,
            delivery_date: self.delivery_date,
            idempotency_key: validate_optional("idempotency_key", self.idempotency_key.as_deref(), MAX_KEY_LEN)?,
        };

        Ok((sale, amounts))
    }
}

/// Amount changes; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleAmountsUpdate {
    #[serde(default)]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub advance_cents: Option<i64>,
}

// =============================================================================
// Notification
// =============================================================================

/// Entry in the notification log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Notification {
    pub id: String,
    pub kind: EventKind,
    pub message: String,
    pub related_id: Option<String>,
    pub is_read: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StatusCount {
    pub status: RecordStatus,
    pub count: i64,
}

/// Figures for the admin reporting dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardSummary {
    pub total_clients: i64,
    pub clients_by_status: Vec<StatusCount>,
    pub total_sales: i64,
    pub sales_by_status: Vec<StatusCount>,
    /// Sum of sale totals.
    pub revenue_cents: i64,
    pub advances_cents: i64,
    pub outstanding_cents: i64,
    pub unread_notifications: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
