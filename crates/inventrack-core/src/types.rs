//! # Domain Types
//!
//! Core domain types used throughout InvenTrack.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Asset       │   │    Movement     │   │      User       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  asset_id (FK)  │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  asset_name     │   │  username       │       │
//! │  │  quantity >= 0  │   │  movement_type  │   │  password_hash  │       │
//! │  │  condition      │   │  quantity > 0   │   │  role           │       │
//! │  └─────────────────┘   │  user_id/name ──┼──►└─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │  MovementType   │   │      Role       │                             │
//! │  │  CheckIn        │   │  Admin          │                             │
//! │  │  CheckOut       │   │  Staff          │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! A movement freezes the asset name and actor name at the time it is
//! recorded. Renaming an asset or deleting a user never rewrites history;
//! deleting an asset removes its movements (cascade).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Movement Type
// =============================================================================

/// Direction of a stock movement.
///
/// Stored as `"check-in"` / `"check-out"` in both engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum MovementType {
    /// Stock arrives: quantity increases.
    CheckIn,
    /// Stock leaves: quantity decreases, never below zero.
    CheckOut,
}

impl MovementType {
    /// Wire/storage representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementType::CheckIn => "check-in",
            MovementType::CheckOut => "check-out",
        }
    }

    fn allowed() -> Vec<String> {
        vec!["check-in".to_string(), "check-out".to_string()]
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check-in" => Ok(MovementType::CheckIn),
            "check-out" => Ok(MovementType::CheckOut),
            _ => Err(ValidationError::NotAllowed {
                field: "type".to_string(),
                allowed: MovementType::allowed(),
            }),
        }
    }
}

impl TryFrom<String> for MovementType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// =============================================================================
// Role
// =============================================================================

/// Access level of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access, including user management and restore.
    Admin,
    /// Day-to-day stock movements.
    #[default]
    Staff,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }

    /// Lenient parse used on account creation: anything but `admin` is staff.
    pub fn from_input(value: Option<&str>) -> Self {
        match value {
            Some("admin") => Role::Admin,
            _ => Role::Staff,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec!["admin".to_string(), "staff".to_string()],
            }),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// =============================================================================
// Asset
// =============================================================================

/// A tracked inventory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Asset {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    pub category: String,

    /// Stock Keeping Unit - globally unique business identifier.
    pub sku: String,

    /// Units on hand. Never negative.
    pub quantity: i64,

    /// Free-form condition label ("Baru", "Bekas", ...).
    #[cfg_attr(feature = "sqlx", sqlx(rename = "asset_condition"))]
    pub condition: String,

    pub location: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    /// Whether `quantity` units can be checked out right now.
    #[inline]
    pub fn can_check_out(&self, quantity: i64) -> bool {
        self.quantity >= quantity
    }

    /// Whether the asset counts towards the low-stock dashboard figure.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= crate::LOW_STOCK_THRESHOLD
    }
}

// =============================================================================
// Movement
// =============================================================================

/// An immutable check-in/check-out record (table `transactions`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Movement {
    pub id: String,
    pub asset_id: String,
    /// Asset name at time of movement (frozen).
    pub asset_name: String,
    #[serde(rename = "type")]
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "String"))]
    pub movement_type: MovementType,
    pub quantity: i64,
    pub user_id: String,
    /// Actor name at time of movement (frozen).
    pub user_name: String,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// User
// =============================================================================

/// A login account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Argon2 PHC string. Never leaves the server.
    #[serde(skip)]
    pub password_hash: String,
    pub name: String,
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "String"))]
    pub role: Role,
}

impl User {
    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Payload for creating an asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewAsset {
    pub name: String,
    pub category: String,
    /// Generated as `CAT-NNNNNN` when absent.
    pub sku: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    /// Defaults to [`crate::DEFAULT_CONDITION`].
    pub condition: Option<String>,
    pub location: String,
}

/// Partial update of an asset. `None` keeps the stored value.
///
/// Setting `quantity` here is a manual stock correction; it does not create
/// a movement record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AssetUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub quantity: Option<i64>,
    pub condition: Option<String>,
    pub location: Option<String>,
}

/// Asset list filter. Empty fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AssetFilter {
    /// Substring match on name, SKU or category.
    pub search: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
}

/// Movement history filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MovementFilter {
    pub movement_type: Option<MovementType>,
    /// Substring match on asset name, user name or note.
    pub search: Option<String>,
}

/// A request to record a movement, as received from the route layer.
///
/// `movement_type` is the raw string so an unknown value surfaces as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MovementRequest {
    pub asset_id: String,
    pub movement_type: String,
    pub quantity: i64,
    pub note: Option<String>,
}

/// Payload for creating a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub name: String,
    /// Anything but `"admin"` creates a staff account.
    pub role: Option<String>,
}

/// Partial update of a user. `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserUpdate {
    pub username: Option<String>,
    /// New plain-text password, hashed before storage.
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<Role>,
}

// =============================================================================
// Aggregates
// =============================================================================

/// Dashboard figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventorySummary {
    /// Number of assets.
    pub total: i64,
    /// Sum of all asset quantities.
    pub total_quantity: i64,
    /// Assets at or below the low-stock threshold.
    pub low_stock: i64,
    pub check_in_this_month: i64,
    pub check_out_this_month: i64,
}

/// Check-in/check-out totals for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MonthlyMovement {
    /// `YYYY-MM`
    pub label: String,
    pub check_in: i64,
    pub check_out: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_asset(quantity: i64) -> Asset {
        let now = Utc::now();
        Asset {
            id: "a1".to_string(),
            name: "Laptop".to_string(),
            category: "Elektronik".to_string(),
            sku: "ELE-000001".to_string(),
            quantity,
            condition: "Baru".to_string(),
            location: "Gudang A".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_movement_type_round_trips_wire_form() {
        assert_eq!("check-in".parse::<MovementType>().unwrap(), MovementType::CheckIn);
        assert_eq!("check-out".parse::<MovementType>().unwrap(), MovementType::CheckOut);
        assert_eq!(MovementType::CheckOut.to_string(), "check-out");
        assert!("transfer".parse::<MovementType>().is_err());

        let json = serde_json::to_string(&MovementType::CheckIn).unwrap();
        assert_eq!(json, "\"check-in\"");
    }

    #[test]
    fn test_role_from_input_defaults_to_staff() {
        assert_eq!(Role::from_input(Some("admin")), Role::Admin);
        assert_eq!(Role::from_input(Some("manager")), Role::Staff);
        assert_eq!(Role::from_input(None), Role::Staff);
        assert!("manager".parse::<Role>().is_err());
    }

    #[test]
    fn test_asset_can_check_out() {
        let asset = sample_asset(6);
        assert!(asset.can_check_out(6));
        assert!(!asset.can_check_out(7));
        assert!(!asset.is_low_stock());
        assert!(sample_asset(5).is_low_stock());
    }

    #[test]
    fn test_user_serialization_hides_password_hash() {
        let user = User {
            id: "u1".to_string(),
            username: "admin".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            name: "Administrator".to_string(),
            role: Role::Admin,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "admin");
        assert!(user.is_admin());
    }

    #[test]
    fn test_movement_serializes_type_field() {
        let movement = Movement {
            id: "t1".to_string(),
            asset_id: "a1".to_string(),
            asset_name: "Laptop".to_string(),
            movement_type: MovementType::CheckOut,
            quantity: 2,
            user_id: "u1".to_string(),
            user_name: "Administrator".to_string(),
            note: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&movement).unwrap();
        assert_eq!(json["type"], "check-out");
    }
}
