//! Commodity business logic - the farmer's catalog.
//!
//! Commodities are never updated in place. `update_commodity` retires the current
//! row and creates a new version pointing back at it, then re-points the live
//! proposals at the new version, all in one database transaction. Deleting a
//! commodity soft-deletes it together with its proposals.

use crate::{
    core::proposal,
    entities::{Commodity, commodity},
    errors::{Error, Result, conflict_on_unique},
    services::Clock,
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Farmer-supplied commodity fields, used for both create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommodityInput {
    pub name: String,
    pub description: String,
    pub seed: String,
    /// Days from planting until harvest
    pub planting_period: i64,
    pub price_per_kg: f64,
}

impl CommodityInput {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::bad_request("Commodity name cannot be empty"));
        }
        if self.planting_period <= 0 {
            return Err(Error::bad_request("Planting period must be at least one day"));
        }
        if !self.price_per_kg.is_finite() || self.price_per_kg < 0.0 {
            return Err(Error::bad_request(format!(
                "Invalid price per kg: {}",
                self.price_per_kg
            )));
        }
        Ok(())
    }

    fn differs_from(&self, existing: &commodity::Model) -> bool {
        self.name.trim() != existing.name
            || self.description != existing.description
            || self.seed != existing.seed
            || self.planting_period != existing.planting_period
            || self.price_per_kg.to_bits() != existing.price_per_kg.to_bits()
    }
}

/// Finds a live commodity by ID.
pub async fn get_commodity_by_id<C>(db: &C, commodity_id: Uuid) -> Result<Option<commodity::Model>>
where
    C: ConnectionTrait,
{
    Commodity::find_by_id(commodity_id)
        .filter(commodity::Column::DeletedAt.is_null())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a live commodity by ID that belongs to `farmer_id`.
pub async fn get_commodity_for_farmer<C>(
    db: &C,
    commodity_id: Uuid,
    farmer_id: Uuid,
) -> Result<Option<commodity::Model>>
where
    C: ConnectionTrait,
{
    Commodity::find_by_id(commodity_id)
        .filter(commodity::Column::FarmerId.eq(farmer_id))
        .filter(commodity::Column::DeletedAt.is_null())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a commodity by ID including retired versions. Used to resolve the
/// owner of historical records.
pub async fn get_commodity_any_version<C>(
    db: &C,
    commodity_id: Uuid,
) -> Result<Option<commodity::Model>>
where
    C: ConnectionTrait,
{
    Commodity::find_by_id(commodity_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists a farmer's live commodities, alphabetically.
pub async fn list_commodities_by_farmer(
    db: &DatabaseConnection,
    farmer_id: Uuid,
) -> Result<Vec<commodity::Model>> {
    Commodity::find()
        .filter(commodity::Column::FarmerId.eq(farmer_id))
        .filter(commodity::Column::DeletedAt.is_null())
        .order_by_asc(commodity::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn name_taken<C>(db: &C, farmer_id: Uuid, name: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let existing = Commodity::find()
        .filter(commodity::Column::FarmerId.eq(farmer_id))
        .filter(commodity::Column::Name.eq(name))
        .filter(commodity::Column::DeletedAt.is_null())
        .one(db)
        .await?;
    Ok(existing.is_some())
}

/// Registers a new commodity for `farmer_id`.
///
/// The image list starts empty and the commodity starts available.
///
/// # Errors
/// - `BadRequest` for an empty name, non-positive planting period or invalid price
/// - `Conflict` if the farmer already has a live commodity with this name
#[instrument(skip(db, clock, input), fields(name = %input.name))]
pub async fn create_commodity(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    farmer_id: Uuid,
    input: CommodityInput,
) -> Result<commodity::Model> {
    input.validate()?;
    let name = input.name.trim().to_string();

    if name_taken(db, farmer_id, &name).await? {
        return Err(Error::conflict(format!(
            "Commodity '{name}' is already registered"
        )));
    }

    let now = clock.now();
    let commodity = commodity::ActiveModel {
        id: Set(Uuid::new_v4()),
        previous_version_id: Set(None),
        farmer_id: Set(farmer_id),
        name: Set(name.clone()),
        description: Set(input.description),
        seed: Set(input.seed),
        planting_period: Set(input.planting_period),
        image_urls: Set(commodity::ImageUrls::default()),
        price_per_kg: Set(input.price_per_kg),
        is_available: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
    };

    let created = commodity
        .insert(db)
        .await
        .map_err(|e| conflict_on_unique(e, format!("Commodity '{name}' is already registered")))?;
    info!(commodity_id = %created.id, "commodity created");
    Ok(created)
}

/// Replaces a commodity with a new version.
///
/// The current row is soft-deleted, a new row is created with
/// `previous_version_id` pointing at it, and the live proposals of the old
/// version are moved to the new one. Returns the new version.
///
/// # Errors
/// - `NotFound` if the farmer has no live commodity with this ID
/// - `Conflict` if nothing changed, or the new name is already taken
#[instrument(skip(db, clock, input))]
pub async fn update_commodity(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    commodity_id: Uuid,
    farmer_id: Uuid,
    input: CommodityInput,
) -> Result<commodity::Model> {
    input.validate()?;

    let existing = get_commodity_for_farmer(db, commodity_id, farmer_id)
        .await?
        .ok_or_else(|| Error::not_found("Commodity", commodity_id))?;

    if !input.differs_from(&existing) {
        return Err(Error::conflict("No commodity field was changed"));
    }

    let name = input.name.trim().to_string();
    if name != existing.name && name_taken(db, farmer_id, &name).await? {
        return Err(Error::conflict(format!(
            "Commodity '{name}' is already registered"
        )));
    }

    let now = clock.now();
    let txn = db.begin().await?;

    let mut retired: commodity::ActiveModel = existing.clone().into();
    retired.deleted_at = Set(Some(now));
    retired.updated_at = Set(now);
    retired.update(&txn).await?;

    let replacement = commodity::ActiveModel {
        id: Set(Uuid::new_v4()),
        previous_version_id: Set(Some(existing.id)),
        farmer_id: Set(existing.farmer_id),
        name: Set(name.clone()),
        description: Set(input.description),
        seed: Set(input.seed),
        planting_period: Set(input.planting_period),
        image_urls: Set(existing.image_urls.clone()),
        price_per_kg: Set(input.price_per_kg),
        is_available: Set(existing.is_available),
        created_at: Set(existing.created_at),
        updated_at: Set(now),
        deleted_at: Set(None),
    }
    .insert(&txn)
    .await
    .map_err(|e| conflict_on_unique(e, format!("Commodity '{name}' is already registered")))?;

    let moved = proposal::update_commodity_id(&txn, existing.id, replacement.id, now).await?;

    txn.commit().await?;
    info!(
        old_id = %existing.id,
        new_id = %replacement.id,
        proposals_moved = moved,
        "commodity replaced by new version"
    );
    Ok(replacement)
}

/// Replaces the image list of a live commodity in place.
pub async fn set_commodity_images(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    commodity_id: Uuid,
    farmer_id: Uuid,
    image_urls: Vec<String>,
) -> Result<commodity::Model> {
    let mut commodity: commodity::ActiveModel =
        get_commodity_for_farmer(db, commodity_id, farmer_id)
            .await?
            .ok_or_else(|| Error::not_found("Commodity", commodity_id))?
            .into();

    commodity.image_urls = Set(commodity::ImageUrls(image_urls));
    commodity.updated_at = Set(clock.now());
    commodity.update(db).await.map_err(Into::into)
}

/// Soft-deletes a commodity and every live proposal under it.
///
/// # Errors
/// - `NotFound` if the farmer has no live commodity with this ID
#[instrument(skip(db, clock))]
pub async fn delete_commodity(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    commodity_id: Uuid,
    farmer_id: Uuid,
) -> Result<commodity::Model> {
    let existing = get_commodity_for_farmer(db, commodity_id, farmer_id)
        .await?
        .ok_or_else(|| Error::not_found("Commodity", commodity_id))?;

    let now = clock.now();
    let txn = db.begin().await?;

    let mut commodity: commodity::ActiveModel = existing.into();
    commodity.deleted_at = Set(Some(now));
    commodity.is_available = Set(false);
    commodity.updated_at = Set(now);
    let deleted = commodity.update(&txn).await?;

    let cascaded = proposal::delete_by_commodity_id(&txn, commodity_id, now).await?;

    txn.commit().await?;
    info!(%commodity_id, proposals_deleted = cascaded, "commodity deleted");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::errors::ErrorKind;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_commodity_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let clock = test_clock();

        let mut input = commodity_input("Corn");
        input.name = "  ".to_string();
        let result = create_commodity(&db, &clock, Uuid::new_v4(), input).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::BadRequest);

        let mut input = commodity_input("Corn");
        input.planting_period = 0;
        let result = create_commodity(&db, &clock, Uuid::new_v4(), input).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::BadRequest);

        let mut input = commodity_input("Corn");
        input.price_per_kg = f64::NAN;
        let result = create_commodity(&db, &clock, Uuid::new_v4(), input).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::BadRequest);

        Ok(())
    }

    #[tokio::test]
    async fn test_create_commodity_integration() -> Result<()> {
        let (db, clock) = setup().await?;
        let farmer = Uuid::new_v4();

        let commodity = create_commodity(&db, &clock, farmer, commodity_input(" Corn ")).await?;

        assert_eq!(commodity.name, "Corn");
        assert_eq!(commodity.farmer_id, farmer);
        assert!(commodity.image_urls.0.is_empty());
        assert!(commodity.is_available);
        assert!(commodity.deleted_at.is_none());
        assert_eq!(commodity.created_at, clock.now());

        Ok(())
    }

    #[tokio::test]
    async fn test_create_commodity_duplicate_name_conflicts() -> Result<()> {
        let (db, clock) = setup().await?;
        let farmer = Uuid::new_v4();

        create_commodity(&db, &clock, farmer, commodity_input("Corn")).await?;
        let result = create_commodity(&db, &clock, farmer, commodity_input("Corn")).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Conflict);

        // another farmer may use the same name
        create_commodity(&db, &clock, Uuid::new_v4(), commodity_input("Corn")).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_update_commodity_creates_new_version() -> Result<()> {
        let (db, clock) = setup().await?;
        let farmer = Uuid::new_v4();
        let original = create_commodity(&db, &clock, farmer, commodity_input("Corn")).await?;
        let proposal = create_test_proposal(&db, &clock, farmer, original.id, "Corn A").await?;

        clock.advance(chrono::Duration::hours(1));
        let mut input = commodity_input("Corn");
        input.price_per_kg = 2500.0;
        let updated = update_commodity(&db, &clock, original.id, farmer, input).await?;

        assert_ne!(updated.id, original.id);
        assert_eq!(updated.previous_version_id, Some(original.id));
        assert_eq!(updated.price_per_kg, 2500.0);
        assert_eq!(updated.created_at, original.created_at);

        // the old version is retired but kept
        assert!(get_commodity_by_id(&db, original.id).await?.is_none());
        let retired = get_commodity_any_version(&db, original.id).await?.unwrap();
        assert!(retired.deleted_at.is_some());

        // proposals follow the new version
        let moved = proposal::get_proposal_by_id(&db, proposal.id).await?.unwrap();
        assert_eq!(moved.commodity_id, updated.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_commodity_without_changes_conflicts() -> Result<()> {
        let (db, clock) = setup().await?;
        let farmer = Uuid::new_v4();
        let original = create_commodity(&db, &clock, farmer, commodity_input("Corn")).await?;

        let result =
            update_commodity(&db, &clock, original.id, farmer, commodity_input("Corn")).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Conflict);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_commodity_rename_collision_conflicts() -> Result<()> {
        let (db, clock) = setup().await?;
        let farmer = Uuid::new_v4();
        create_commodity(&db, &clock, farmer, commodity_input("Corn")).await?;
        let rice = create_commodity(&db, &clock, farmer, commodity_input("Rice")).await?;

        let result = update_commodity(&db, &clock, rice.id, farmer, commodity_input("Corn")).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Conflict);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_commodity_of_other_farmer_not_found() -> Result<()> {
        let (db, clock) = setup().await?;
        let original =
            create_commodity(&db, &clock, Uuid::new_v4(), commodity_input("Corn")).await?;

        let result = update_commodity(
            &db,
            &clock,
            original.id,
            Uuid::new_v4(),
            commodity_input("Maize"),
        )
        .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_commodity_cascades_to_proposals() -> Result<()> {
        let (db, clock) = setup().await?;
        let farmer = Uuid::new_v4();
        let commodity = create_commodity(&db, &clock, farmer, commodity_input("Corn")).await?;
        let first = create_test_proposal(&db, &clock, farmer, commodity.id, "Corn A").await?;
        let second = create_test_proposal(&db, &clock, farmer, commodity.id, "Corn B").await?;

        let deleted = delete_commodity(&db, &clock, commodity.id, farmer).await?;
        assert!(deleted.deleted_at.is_some());

        assert!(proposal::get_proposal_by_id(&db, first.id).await?.is_none());
        assert!(proposal::get_proposal_by_id(&db, second.id).await?.is_none());
        assert!(list_commodities_by_farmer(&db, farmer).await?.is_empty());

        // name becomes reusable after deletion
        create_commodity(&db, &clock, farmer, commodity_input("Corn")).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_commodity_not_owned() -> Result<()> {
        let (db, clock) = setup().await?;
        let commodity =
            create_commodity(&db, &clock, Uuid::new_v4(), commodity_input("Corn")).await?;

        let result = delete_commodity(&db, &clock, commodity.id, Uuid::new_v4()).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);

        Ok(())
    }

    #[tokio::test]
    async fn test_set_commodity_images() -> Result<()> {
        let (db, clock) = setup().await?;
        let farmer = Uuid::new_v4();
        let commodity = create_commodity(&db, &clock, farmer, commodity_input("Corn")).await?;

        let updated = set_commodity_images(
            &db,
            &clock,
            commodity.id,
            farmer,
            vec!["https://cdn/a.jpg".to_string()],
        )
        .await?;
        assert_eq!(updated.id, commodity.id);
        assert_eq!(updated.image_urls.0, vec!["https://cdn/a.jpg".to_string()]);

        Ok(())
    }
}
