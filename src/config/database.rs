//! Database configuration module.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`; the partial unique indexes that carry the
//! marketplace invariants are created afterwards with plain SQL, since they need
//! `WHERE` clauses.

use crate::config::DatabaseConfig;
use crate::entities::{
    Batch, Commodity, Harvest, PasswordResetToken, Proposal, Region, SequenceCounter, Transaction,
    TreatmentRecord,
};
use crate::errors::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info, instrument};

/// Unique indexes backing the uniqueness and one-at-a-time rules of the workflows.
const INVARIANT_INDEXES: [&str; 7] = [
    // Commodity name per farmer, live rows only
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_commodities_farmer_name
        ON commodities (farmer_id, name) WHERE deleted_at IS NULL",
    // Proposal name per commodity, live rows only
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_proposals_commodity_name
        ON proposals (commodity_id, name) WHERE deleted_at IS NULL",
    // A proposal drives at most one accepted transaction
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_accepted_proposal
        ON transactions (proposal_id) WHERE status = 'accepted'",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_batches_transaction
        ON batches (transaction_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_treatment_records_batch_number
        ON treatment_records (batch_id, number)",
    // One treatment record in flight per batch
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_treatment_records_in_flight
        ON treatment_records (batch_id) WHERE status <> 'approved'",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_harvests_batch
        ON harvests (batch_id)",
];

/// Establishes a connection using the configured URL and deadlines.
///
/// In-memory `SQLite` databases are pinned to a single connection, since every
/// pooled connection would otherwise see its own empty database.
#[instrument(skip(config), fields(url = %config.url))]
pub async fn create_connection(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(config.url.clone());
    let max_connections = if config.url.contains(":memory:") {
        1
    } else {
        config.max_connections
    };
    options
        .max_connections(max_connections)
        .connect_timeout(config.connect_timeout())
        .acquire_timeout(config.connect_timeout())
        .sqlx_logging(false);

    debug!("Opening database connection");
    let db = Database::connect(options).await?;
    info!("Database connection established");
    Ok(db)
}

/// Creates all tables and invariant indexes.
///
/// Order follows the foreign keys: parents before children.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut tables = vec![
        schema.create_table_from_entity(Commodity),
        schema.create_table_from_entity(Region),
        schema.create_table_from_entity(Proposal),
        schema.create_table_from_entity(Transaction),
        schema.create_table_from_entity(Batch),
        schema.create_table_from_entity(TreatmentRecord),
        schema.create_table_from_entity(Harvest),
        schema.create_table_from_entity(SequenceCounter),
        schema.create_table_from_entity(PasswordResetToken),
    ];

    for table in &mut tables {
        table.if_not_exists();
        db.execute(builder.build(&*table)).await?;
    }

    for index in INVARIANT_INDEXES {
        db.execute_unprepared(index).await?;
    }

    info!("Database tables and invariant indexes ensured");
    Ok(())
}
