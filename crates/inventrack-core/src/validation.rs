//! # Validation Module
//!
//! Input validation for InvenTrack.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Browser form                                                 │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (runs before any mutation)                       │
//! │  ├── Required fields, lengths                                          │
//! │  └── Quantity rules                                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database                                                     │
//! │  ├── UNIQUE (sku, username)                                            │
//! │  └── FOREIGN KEY (transactions.asset_id)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use inventrack_core::validation::{validate_movement_quantity, validate_sku};
//!
//! assert!(validate_sku("ELE-000123").is_ok());
//! assert!(validate_movement_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::{AssetUpdate, NewAsset, NewUser, UserUpdate};
use crate::MIN_PASSWORD_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Rejects empty or whitespace-only values.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 100 characters
/// - Letters, digits, hyphens, underscores only
///
/// ## Example
/// ```rust
/// use inventrack_core::validation::validate_sku;
///
/// assert!(validate_sku("ELE-000123").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    validate_required("sku", sku)?;

    if sku.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 100,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates an asset or user display name (1..=255 characters).
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    validate_required("name", name)?;

    if name.chars().count() > 255 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 255,
        });
    }

    Ok(())
}

pub fn validate_username(username: &str) -> ValidationResult<()> {
    let username = username.trim();

    validate_required("username", username)?;

    if username.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: 100,
        });
    }

    Ok(())
}

/// Passwords need at least [`MIN_PASSWORD_LEN`] characters.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the quantity of a check-in or check-out.
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_movement_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a stored stock level (manual edit or initial quantity).
///
/// Zero is allowed; negative stock never is.
pub fn validate_stock_level(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Payload Validators
// =============================================================================

pub fn validate_new_asset(asset: &NewAsset) -> ValidationResult<()> {
    validate_name(&asset.name)?;
    validate_required("category", &asset.category)?;
    validate_required("location", &asset.location)?;
    if let Some(sku) = asset.sku.as_deref().filter(|s| !s.trim().is_empty()) {
        validate_sku(sku)?;
    }
    validate_stock_level(asset.quantity)
}

pub fn validate_asset_update(update: &AssetUpdate) -> ValidationResult<()> {
    if let Some(name) = &update.name {
        validate_name(name)?;
    }
    if let Some(sku) = &update.sku {
        validate_sku(sku)?;
    }
    if let Some(quantity) = update.quantity {
        validate_stock_level(quantity)?;
    }
    Ok(())
}

pub fn validate_new_user(user: &NewUser) -> ValidationResult<()> {
    validate_username(&user.username)?;
    validate_password(&user.password)?;
    validate_name(&user.name)
}

pub fn validate_user_update(update: &UserUpdate) -> ValidationResult<()> {
    if let Some(username) = &update.username {
        validate_username(username)?;
    }
    if let Some(password) = &update.password {
        validate_password(password)?;
    }
    if let Some(name) = &update.name {
        validate_name(name)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("ELE-000123").is_ok());
        assert!(validate_sku("ABC123").is_ok());
        assert!(validate_sku("item_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_movement_quantity() {
        assert!(validate_movement_quantity(1).is_ok());
        assert!(validate_movement_quantity(10_000).is_ok());

        assert!(validate_movement_quantity(0).is_err());
        assert!(validate_movement_quantity(-3).is_err());
    }

    #[test]
    fn test_validate_stock_level() {
        assert!(validate_stock_level(0).is_ok());
        assert!(validate_stock_level(12).is_ok());
        assert!(validate_stock_level(-1).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("rahasia").is_ok());
        assert!(matches!(
            validate_password("12345"),
            Err(ValidationError::TooShort { min: 6, .. })
        ));
        assert!(matches!(
            validate_password(""),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_new_asset_requires_location() {
        let asset = NewAsset {
            name: "Proyektor".to_string(),
            category: "Elektronik".to_string(),
            location: " ".to_string(),
            ..Default::default()
        };

        let err = validate_new_asset(&asset).unwrap_err();
        assert_eq!(err.to_string(), "location is required");
    }

    #[test]
    fn test_validate_new_asset_ignores_blank_sku() {
        let asset = NewAsset {
            name: "Proyektor".to_string(),
            category: "Elektronik".to_string(),
            sku: Some(String::new()),
            location: "Ruang Rapat".to_string(),
            ..Default::default()
        };

        assert!(validate_new_asset(&asset).is_ok());
    }

    #[test]
    fn test_validate_user_update_checks_password_only_when_present() {
        assert!(validate_user_update(&UserUpdate::default()).is_ok());

        let update = UserUpdate {
            password: Some("abc".to_string()),
            ..Default::default()
        };
        assert!(validate_user_update(&update).is_err());
    }
}
