//! Table setup and ETL stages over the star-schema catalog

use crate::error::RunError;
use crate::runner::{BatchRunner, RunSummary};
use dwhpipe_core::Config;
use dwhpipe_sql::StatementCatalog;
use dwhpipe_warehouse::SqlSession;

/// Drop every table, then create them again
pub async fn recreate_tables(session: &mut dyn SqlSession) -> Result<Vec<RunSummary>, RunError> {
    let dropped = BatchRunner::new("drop")
        .run(&StatementCatalog::drop_tables(), session)
        .await?;
    let created = BatchRunner::new("create")
        .run(&StatementCatalog::create_tables(), session)
        .await?;
    Ok(vec![dropped, created])
}

/// Load staging tables from S3, then populate the star schema
pub struct EtlPipeline {
    catalog: StatementCatalog,
}

impl EtlPipeline {
    /// Build the COPY statements for the configured buckets and role
    pub fn new(config: &Config, role_arn: &str) -> Result<Self, RunError> {
        let catalog = StatementCatalog::new(&config.s3, role_arn, &config.aws.region)?;
        Ok(Self { catalog })
    }

    pub fn catalog(&self) -> &StatementCatalog {
        &self.catalog
    }

    /// `COPY` into the staging tables
    pub async fn load(&self, session: &mut dyn SqlSession) -> Result<RunSummary, RunError> {
        BatchRunner::new("load")
            .run(&self.catalog.copy_tables(), session)
            .await
    }

    /// `INSERT ... SELECT` from staging into the star schema
    pub async fn transform(&self, session: &mut dyn SqlSession) -> Result<RunSummary, RunError> {
        BatchRunner::new("transform")
            .run(&StatementCatalog::insert_tables(), session)
            .await
    }

    /// Load, then transform; a load failure skips the transform
    pub async fn run(&self, session: &mut dyn SqlSession) -> Result<Vec<RunSummary>, RunError> {
        let loaded = self.load(session).await?;
        let transformed = self.transform(session).await?;
        Ok(vec![loaded, transformed])
    }
}
