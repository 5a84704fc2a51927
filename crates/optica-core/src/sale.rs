//! # Sale Amounts
//!
//! Derived money fields of a sale order.
//!
//! ```text
//! amount_cents × quantity = total_cents
//! total_cents − advance_cents = balance_cents
//! ```
//!
//! Both equations hold after creation and after every amount update. The
//! database re-checks them with `CHECK` constraints.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::MAX_SALE_QUANTITY;

/// Amount, quantity and advance of a sale with their derived totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleAmounts {
    pub amount_cents: i64,
    pub quantity: i64,
    pub advance_cents: i64,
    pub total_cents: i64,
    pub balance_cents: i64,
}

impl SaleAmounts {
    /// Computes total and balance.
    ///
    /// ## Errors
    /// - negative amount or advance
    /// - quantity outside `1..=MAX_SALE_QUANTITY`
    /// - total overflowing i64
    /// - advance larger than total
    pub fn compute(amount_cents: i64, quantity: i64, advance_cents: i64) -> Result<Self, ValidationError> {
        if amount_cents < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "amount".to_string(),
            });
        }
        if quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            });
        }
        if quantity > MAX_SALE_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: "1".to_string(),
                max: MAX_SALE_QUANTITY.to_string(),
            });
        }
        if advance_cents < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "advance".to_string(),
            });
        }

        let total = Money::from_cents(amount_cents)
            .checked_mul(quantity)
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "total".to_string(),
                min: "0".to_string(),
                max: i64::MAX.to_string(),
            })?;
        let advance = Money::from_cents(advance_cents);
        if advance > total {
            return Err(ValidationError::Inconsistent(format!(
                "advance {} exceeds total {}",
                advance, total
            )));
        }

        Ok(SaleAmounts {
            amount_cents,
            quantity,
            advance_cents,
            total_cents: total.cents(),
            balance_cents: (total - advance).cents(),
        })
    }

    /// Applies a partial update and recomputes both derived fields.
    pub fn update(
        &self,
        amount_cents: Option<i64>,
        quantity: Option<i64>,
        advance_cents: Option<i64>,
    ) -> Result<Self, ValidationError> {
        SaleAmounts::compute(
            amount_cents.unwrap_or(self.amount_cents),
            quantity.unwrap_or(self.quantity),
            advance_cents.unwrap_or(self.advance_cents),
        )
    }

    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }

    /// Whether the customer has paid in full.
    pub fn is_settled(&self) -> bool {
        self.balance_cents == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
