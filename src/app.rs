//! Application context - the state an outer layer (HTTP, CLI, jobs) hands to
//! the workflows.
//!
//! Most workflows only need the database and the clock and are called from
//! [`crate::core`] through [`AppContext::bounded`], which applies the
//! configured database deadline. The two that also talk to collaborators are
//! wrapped here so the configured folder, token lifetime and deadlines are
//! applied in one place.
//!
//! A workflow cut off by its deadline drops its open database transaction,
//! which rolls it back.

use crate::{
    config::{
        AppConfig,
        database::{create_connection, create_tables},
    },
    core::{harvest, password_reset},
    entities::{HarvestModel, PasswordResetTokenModel},
    errors::Result,
    services::{
        Clock, FileStore, LocalFileStore, LogNotifier, Notifier, SystemClock, with_deadline,
    },
};
use chrono::Duration;
use sea_orm::DatabaseConnection;
use std::{future::Future, sync::Arc};
use tracing::info;
use uuid::Uuid;

/// Shared state available to every request. Hand it out behind an `Arc`.
pub struct AppContext {
    /// Database connection for all database operations
    pub database: DatabaseConnection,
    pub clock: Arc<dyn Clock>,
    pub file_store: Arc<dyn FileStore>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<AppConfig>,
}

impl AppContext {
    #[must_use]
    pub fn new(
        database: DatabaseConnection,
        clock: Arc<dyn Clock>,
        file_store: Arc<dyn FileStore>,
        notifier: Arc<dyn Notifier>,
        config: AppConfig,
    ) -> Self {
        Self {
            database,
            clock,
            file_store,
            notifier,
            config: Arc::new(config),
        }
    }

    /// Connects to the configured database, ensures the schema and builds the
    /// default collaborators: wall clock, local file store, logging notifier.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let database = create_connection(&config.database).await?;
        create_tables(&database).await?;

        let file_store = Arc::new(LocalFileStore::new(&config.storage));
        let notifier = Arc::new(LogNotifier::new(config.workflow.notify_timeout()));
        info!(root = %config.storage.root_dir.display(), "application context ready");

        Ok(Self::new(
            database,
            Arc::new(SystemClock),
            file_store,
            notifier,
            config,
        ))
    }

    /// Runs database-only workflow work, such as
    /// `core::proposal::validate_proposal(&ctx.database, ..)`, under the
    /// configured query deadline.
    ///
    /// # Errors
    /// Returns `Error::Timeout` when the deadline passes, otherwise whatever
    /// `work` returns.
    pub async fn bounded<T, F>(&self, operation: &str, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_deadline(operation, self.config.database.query_timeout(), work).await
    }

    /// [`harvest::submit_harvest`] with evidence stored in the configured
    /// harvest folder. The deadline covers the database work plus the upload.
    pub async fn submit_harvest(
        &self,
        farmer_id: Uuid,
        submission: harvest::HarvestSubmission,
    ) -> Result<HarvestModel> {
        let limit = self.config.database.query_timeout() + self.config.storage.upload_timeout();
        let work = harvest::submit_harvest(
            &self.database,
            self.clock.as_ref(),
            self.file_store.as_ref(),
            &self.config.storage.harvest_folder,
            farmer_id,
            submission,
        );
        with_deadline("submit_harvest", limit, work).await
    }

    /// [`password_reset::request_password_reset`] with the configured token
    /// lifetime. The deadline covers the database work plus the notification.
    pub async fn request_password_reset(&self, email: &str) -> Result<PasswordResetTokenModel> {
        let ttl = Duration::minutes(self.config.workflow.password_reset_ttl_minutes);
        let limit = self.config.database.query_timeout() + self.config.workflow.notify_timeout();
        let work = password_reset::request_password_reset(
            &self.database,
            self.clock.as_ref(),
            self.notifier.as_ref(),
            ttl,
            email,
        );
        with_deadline("request_password_reset", limit, work).await
    }
}
