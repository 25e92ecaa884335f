//! Note business logic - free-text notes attached to a vehicle.

use crate::{
    entities::{Note, Vehicle, note},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*};

/// Attaches a note to a vehicle.
pub async fn add_note(db: &DatabaseConnection, vehicle_id: i64, text: String) -> Result<note::Model> {
    if text.trim().is_empty() {
        return Err(Error::Validation {
            message: "Note text cannot be empty".to_string(),
        });
    }

    Vehicle::find_by_id(vehicle_id)
        .one(db)
        .await?
        .ok_or(Error::VehicleNotFound { id: vehicle_id })?;

    let model = note::ActiveModel {
        vehicle_id: Set(vehicle_id),
        text: Set(text.trim().to_string()),
        created_at: Set(Utc::now().date_naive()),
        is_pinned: Set(false),
        ..Default::default()
    };
    model.insert(db).await.map_err(Into::into)
}

/// One page of a vehicle's notes: pinned first, then newest first. Pages are
/// 1-based.
pub async fn get_notes_for_vehicle(
    db: &DatabaseConnection,
    vehicle_id: i64,
    page: u64,
    page_size: u64,
) -> Result<Vec<note::Model>> {
    Note::find()
        .filter(note::Column::VehicleId.eq(vehicle_id))
        .order_by_desc(note::Column::IsPinned)
        .order_by_desc(note::Column::CreatedAt)
        .order_by_desc(note::Column::Id)
        .paginate(db, page_size)
        .fetch_page(page.saturating_sub(1))
        .await
        .map_err(Into::into)
}

/// Total number of notes on a vehicle.
pub async fn notes_count(db: &DatabaseConnection, vehicle_id: i64) -> Result<u64> {
    Note::find()
        .filter(note::Column::VehicleId.eq(vehicle_id))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Deletes a note.
pub async fn delete_note(db: &DatabaseConnection, id: i64) -> Result<()> {
    let model = Note::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::Validation {
            message: format!("Note {id} not found"),
        })?;
    model.delete(db).await?;
    Ok(())
}

/// Flips a note's pinned flag; returns the new state.
pub async fn toggle_pin_note(db: &DatabaseConnection, id: i64) -> Result<bool> {
    let model = Note::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::Validation {
            message: format!("Note {id} not found"),
        })?;

    let new_state = !model.is_pinned;
    let mut active: note::ActiveModel = model.into();
    active.is_pinned = Set(new_state);
    active.update(db).await?;
    Ok(new_state)
}
