use crate::core::Pipeline;
use crate::domain::model::RunSummary;
use crate::utils::error::Result;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();

        tracing::debug!("Extracting data...");
        let table = self.pipeline.extract().await?;
        tracing::info!("{} items found.", table.len());

        tracing::debug!("Transforming data...");
        let table = self.pipeline.transform(table).await?;
        tracing::debug!("{} items after transform", table.len());

        tracing::debug!("Loading data...");
        let summary = self.pipeline.load(table).await?;

        tracing::info!(
            "Processed {} items ({} skipped, {} errors) in {:?}",
            summary.processed,
            summary.skipped,
            summary.errors,
            started.elapsed()
        );
        if summary.errors > 0 {
            tracing::warn!(
                "Completed with {} errors. Re-run to retry failed items",
                summary.errors
            );
        } else {
            tracing::info!("Finished with no errors");
        }

        Ok(summary)
    }
}
