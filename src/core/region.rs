//! Region business logic - delivery regions buyers pick when ordering.

use crate::{
    entities::{Region, region},
    errors::{Error, Result},
    services::Clock,
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

/// Creates a region. All three name parts are required.
pub async fn create_region(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    province: &str,
    city: &str,
    district: &str,
) -> Result<region::Model> {
    for (field, value) in [("province", province), ("city", city), ("district", district)] {
        if value.trim().is_empty() {
            return Err(Error::bad_request(format!("Region {field} cannot be empty")));
        }
    }

    let created = region::ActiveModel {
        id: Set(Uuid::new_v4()),
        province: Set(province.trim().to_string()),
        city: Set(city.trim().to_string()),
        district: Set(district.trim().to_string()),
        created_at: Set(clock.now()),
    }
    .insert(db)
    .await?;

    info!(region_id = %created.id, "region created");
    Ok(created)
}

pub async fn get_region_by_id<C>(db: &C, region_id: Uuid) -> Result<Option<region::Model>>
where
    C: ConnectionTrait,
{
    Region::find_by_id(region_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists all regions ordered by province, city, district.
pub async fn list_regions(db: &DatabaseConnection) -> Result<Vec<region::Model>> {
    Region::find()
        .order_by_asc(region::Column::Province)
        .order_by_asc(region::Column::City)
        .order_by_asc(region::Column::District)
        .all(db)
        .await
        .map_err(Into::into)
}
