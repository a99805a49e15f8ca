//! Shared test utilities for the marketplace core.
//!
//! This module provides common helper functions for setting up test databases
//! and walking entities through their workflows with sensible defaults.

use crate::{
    core::{commodity, proposal, region, transaction, treatment_record},
    entities::{ProposalStatus, TransactionStatus, treatment_record::TreatmentEntry},
    errors::{Error, Result},
    services::Clock,
};
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

pub use crate::entities::{
    BatchModel, CommodityModel, ProposalModel, RegionModel, TransactionModel,
    TreatmentRecordModel,
};
pub use crate::services::FixedClock;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// 1 March 2024, 08:00 UTC
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0)
        .single()
        .unwrap_or_default()
}

pub fn test_clock() -> FixedClock {
    FixedClock::new(test_now())
}

/// Database plus a clock frozen at [`test_now`].
pub async fn setup() -> Result<(DatabaseConnection, FixedClock)> {
    Ok((setup_test_db().await?, test_clock()))
}

/// # Defaults
/// * `planting_period`: 90 days
/// * `price_per_kg`: 1000.0
pub fn commodity_input(name: &str) -> commodity::CommodityInput {
    commodity::CommodityInput {
        name: name.to_string(),
        description: format!("{name} from the test farm"),
        seed: "Hybrid".to_string(),
        planting_period: 90,
        price_per_kg: 1000.0,
    }
}

/// # Defaults
/// * `estimated_total_harvest`: 50.5 kg
/// * `planting_area`: 1200.0 m²
pub fn proposal_input(name: &str) -> proposal::ProposalInput {
    proposal::ProposalInput {
        name: name.to_string(),
        description: format!("Planting plan {name}"),
        estimated_total_harvest: 50.5,
        planting_area: 1200.0,
        address: "Desa Sukamaju, Lembang".to_string(),
    }
}

pub fn treatment_report() -> treatment_record::TreatmentReport {
    treatment_record::TreatmentReport {
        description: "Fertilized rows 1-20".to_string(),
        treatments: vec![TreatmentEntry {
            name: "NPK 16-16-16".to_string(),
            dose: 2.5,
            unit: "kg".to_string(),
        }],
    }
}

pub async fn create_test_commodity(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    farmer_id: Uuid,
    name: &str,
) -> Result<CommodityModel> {
    commodity::create_commodity(db, clock, farmer_id, commodity_input(name)).await
}

/// Creates a pending proposal.
pub async fn create_test_proposal(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    farmer_id: Uuid,
    commodity_id: Uuid,
    name: &str,
) -> Result<ProposalModel> {
    proposal::create_proposal(db, clock, farmer_id, commodity_id, proposal_input(name)).await
}

/// Creates a proposal and approves it with a random validator.
pub async fn create_approved_proposal(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    farmer_id: Uuid,
    commodity_id: Uuid,
    name: &str,
) -> Result<ProposalModel> {
    let created = create_test_proposal(db, clock, farmer_id, commodity_id, name).await?;
    proposal::validate_proposal(
        db,
        clock,
        created.id,
        Uuid::new_v4(),
        ProposalStatus::Approved,
        None,
    )
    .await
}

pub async fn create_test_region(db: &DatabaseConnection, clock: &dyn Clock) -> Result<RegionModel> {
    region::create_region(db, clock, "Jawa Barat", "Bandung Barat", "Lembang").await
}

/// Places a pending transaction in a fresh region.
pub async fn create_pending_transaction(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    buyer_id: Uuid,
    proposal_id: Uuid,
) -> Result<TransactionModel> {
    let region = create_test_region(db, clock).await?;
    transaction::create_transaction(
        db,
        clock,
        buyer_id,
        transaction::TransactionInput {
            proposal_id,
            region_id: region.id,
            address: "Jl. Pasar Induk 5".to_string(),
        },
    )
    .await
}

/// Everything created on the way to a planting batch.
#[derive(Debug, Clone)]
pub struct TestBatch {
    pub farmer: Uuid,
    pub commodity: CommodityModel,
    pub proposal: ProposalModel,
    pub transaction: TransactionModel,
    pub batch: BatchModel,
}

/// Runs commodity → approved proposal → accepted transaction for a new farmer
/// and returns the resulting planting batch.
pub async fn create_planting_batch(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    commodity_name: &str,
    proposal_name: &str,
) -> Result<TestBatch> {
    let farmer = Uuid::new_v4();
    let commodity = create_test_commodity(db, clock, farmer, commodity_name).await?;
    let proposal = create_approved_proposal(db, clock, farmer, commodity.id, proposal_name).await?;
    let pending = create_pending_transaction(db, clock, Uuid::new_v4(), proposal.id).await?;

    let outcome =
        transaction::make_decision(db, clock, pending.id, farmer, TransactionStatus::Accepted)
            .await?;
    let batch = outcome.batch.ok_or_else(|| Error::Internal {
        message: "accepted transaction produced no batch".to_string(),
    })?;

    Ok(TestBatch {
        farmer,
        commodity,
        proposal,
        transaction: outcome.transaction,
        batch,
    })
}

/// Requests, fills and approves the next treatment record of `planted`.
pub async fn approve_treatment(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    planted: &TestBatch,
    date: DateTime<Utc>,
) -> Result<TreatmentRecordModel> {
    let validator = Uuid::new_v4();
    let requested = treatment_record::request_to_farmer(
        db,
        clock,
        validator,
        treatment_record::TreatmentRequest {
            batch_id: planted.batch.id,
            date,
        },
    )
    .await?;
    treatment_record::fill_treatment_record(
        db,
        clock,
        requested.id,
        planted.farmer,
        treatment_report(),
    )
    .await?;
    treatment_record::validate_treatment_record(
        db,
        clock,
        requested.id,
        validator,
        treatment_record::TreatmentDecision::Approve { warning_note: None },
    )
    .await
}
