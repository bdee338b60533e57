//! # Ledger Service
//!
//! Records check-ins and check-outs so that a movement row and its stock
//! delta are always observed together, and stock never goes negative.
//!
//! ## Flow
//! ```text
//! record_movement(asset, "check-out", 4, actor, note)
//!      │
//!      ├── quantity > 0, type known?           no → ValidationError
//!      ├── asset exists?                       no → AssetNotFound
//!      ├── asset.quantity >= 4 (check-out)?    no → InsufficientStock { available }
//!      ├── new quantity fits in i64 (check-in)? no → ValidationError
//!      │
//!      ▼  run_transaction
//!   ┌─────────────────────────────────────────────────────────────┐
//!   │ INSERT INTO transactions (...)                              │
//!   │ UPDATE assets SET quantity = quantity - 4                   │
//!   │   WHERE id = ? AND quantity >= 4                            │
//!   │ 0 rows? → re-read quantity → InsufficientStock / overflow   │
//!   │           → ROLLBACK                                        │
//!   └─────────────────────────────────────────────────────────────┘
//!      │
//!      ▼
//!   Movement (201)
//! ```
//!
//! The precheck gives a fast, precise error; the guarded update is what
//! makes two concurrent over-subscribing check-outs resolve to exactly one
//! success.

use chrono::Utc;
use tracing::{debug, info};

use inventrack_core::ledger::{apply_movement, ensure_available};
use inventrack_core::validation::validate_movement_quantity;
use inventrack_core::{CoreError, Movement, MovementRequest, MovementType, User};

use crate::engine::Database;
use crate::error::{DbError, ServiceError, ServiceResult};
use crate::repository::asset::AssetRepository;
use crate::repository::movement::MovementRepository;
use crate::repository::{generate_id, non_blank};

/// Who performed a movement. Stored as id plus name snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor::new(user.id.clone(), user.name.clone())
    }
}

#[derive(Debug, Clone)]
pub struct LedgerService {
    db: Database,
}

impl LedgerService {
    pub fn new(db: Database) -> Self {
        LedgerService { db }
    }

    /// Convenience wrapper taking the route payload.
    pub async fn record(&self, request: MovementRequest, actor: &Actor) -> ServiceResult<Movement> {
        self.record_movement(
            &request.asset_id,
            &request.movement_type,
            request.quantity,
            actor,
            request.note,
        )
        .await
    }

    /// Records one movement and applies its stock delta atomically.
    ///
    /// ## Errors
    /// - `CoreError::Validation`: quantity ≤ 0 or unknown type
    /// - `CoreError::AssetNotFound`
    /// - `CoreError::InsufficientStock`: check-out larger than stock; carries
    ///   the available quantity
    /// - `ValidationError::OutOfRange`: check-in would overflow the stock level
    /// - `ServiceError::Db`: storage failure (nothing was written)
    pub async fn record_movement(
        &self,
        asset_id: &str,
        movement_type: &str,
        quantity: i64,
        actor: &Actor,
        note: Option<String>,
    ) -> ServiceResult<Movement> {
        validate_movement_quantity(quantity)?;
        let kind: MovementType = movement_type.parse()?;

        let asset = self
            .db
            .assets()
            .get_by_id(asset_id)
            .await?
            .ok_or_else(|| CoreError::AssetNotFound(asset_id.to_string()))?;

        ensure_available(&asset, kind, quantity)?;
        apply_movement(asset.quantity, kind, quantity)?;

        let now = Utc::now();
        let movement = Movement {
            id: generate_id(),
            asset_id: asset.id.clone(),
            asset_name: asset.name.clone(),
            movement_type: kind,
            quantity,
            user_id: actor.id.clone(),
            user_name: actor.name.clone(),
            note: non_blank(note.as_deref()),
            created_at: now,
        };
        let sku = asset.sku;

        debug!(asset_id = %movement.asset_id, movement_type = %kind, quantity, "Recording movement");

        let recorded = self
            .db
            .run_transaction(move |tx| {
                Box::pin(async move {
                    MovementRepository::insert(tx, &movement)
                        .await
                        .map_err(|e| match e {
                            DbError::ForeignKeyViolation { .. } => {
                                ServiceError::from(CoreError::AssetNotFound(movement.asset_id.clone()))
                            }
                            other => ServiceError::from(other),
                        })?;

                    let affected = AssetRepository::apply_delta(
                        tx,
                        &movement.asset_id,
                        kind,
                        quantity,
                        now,
                    )
                    .await?;

                    if affected == 0 {
                        let current = AssetRepository::quantity_in(tx, &movement.asset_id).await?;
                        let err = match (kind, current) {
                            (_, None) => {
                                ServiceError::from(CoreError::AssetNotFound(movement.asset_id.clone()))
                            }
                            (MovementType::CheckOut, Some(available)) => {
                                ServiceError::from(CoreError::InsufficientStock {
                                    sku,
                                    available,
                                    requested: quantity,
                                })
                            }
                            (MovementType::CheckIn, Some(available)) => {
                                match apply_movement(available, kind, quantity) {
                                    Err(e) => ServiceError::from(e),
                                    Ok(_) => ServiceError::from(DbError::Internal(format!(
                                        "stock update for {} matched no row",
                                        movement.asset_id
                                    ))),
                                }
                            }
                        };
                        return Err(err);
                    }

                    Ok::<_, ServiceError>(movement)
                })
            })
            .await?;

        info!(
            id = %recorded.id,
            asset_id = %recorded.asset_id,
            movement_type = %recorded.movement_type,
            quantity = recorded.quantity,
            "Movement recorded"
        );
        Ok(recorded)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
