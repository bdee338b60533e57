//! # Stock Ledger Rules
//!
//! Pure arithmetic behind every recorded movement. The storage layer applies
//! the same rules with a guarded SQL update; these functions are the
//! reference the precheck and the tests use.
//!
//! ```text
//!   check-in  n :  quantity' = quantity + n          (overflow rejected)
//!   check-out n :  quantity' = max(quantity - n, 0)  (after ensure_available)
//! ```

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{Asset, MovementType};
use crate::validation::{validate_movement_quantity, ValidationResult};

/// Computes the stock level after a movement.
///
/// Check-out saturates at zero; callers run [`ensure_available`] first so the
/// saturation never hides an over-subscription.
pub fn apply_movement(
    current: i64,
    movement_type: MovementType,
    quantity: i64,
) -> ValidationResult<i64> {
    validate_movement_quantity(quantity)?;

    match movement_type {
        MovementType::CheckIn => {
            current
                .checked_add(quantity)
                .ok_or_else(|| ValidationError::OutOfRange {
                    field: "quantity".to_string(),
                    min: 0,
                    max: i64::MAX,
                })
        }
        MovementType::CheckOut => Ok(current.saturating_sub(quantity).max(0)),
    }
}

/// Fails with [`CoreError::InsufficientStock`] when a check-out asks for more
/// than the asset holds. Check-ins always pass.
pub fn ensure_available(
    asset: &Asset,
    movement_type: MovementType,
    quantity: i64,
) -> CoreResult<()> {
    if movement_type == MovementType::CheckOut && !asset.can_check_out(quantity) {
        return Err(CoreError::InsufficientStock {
            sku: asset.sku.clone(),
            available: asset.quantity,
            requested: quantity,
        });
    }

    Ok(())
}

/// Builds a SKU from the category prefix and the clock: `ELE-482913`.
///
/// The prefix is the first three alphanumeric characters of the category,
/// upper-cased (`ITM` when there are none); the number is the last six
/// digits of the Unix time in milliseconds.
pub fn generate_sku(category: &str, now: DateTime<Utc>) -> String {
    let prefix: String = category
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let prefix = if prefix.is_empty() {
        "ITM".to_string()
    } else {
        prefix
    };

    let number = now.timestamp_millis().rem_euclid(1_000_000);
    format!("{prefix}-{number:06}")
}

// =============================================================================
// Unit Tests
// =============================================================================
