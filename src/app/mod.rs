pub mod image_meta;
pub mod pipelines;

use crate::core::RunSummary;
use crate::utils::error::EtlError;

/// Logs a failed run the way every binary reports it and returns the exit
/// code for the error's severity.
pub fn report_failure(error: &EtlError) -> i32 {
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        error,
        error.category(),
        error.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", error.recovery_suggestion());
    eprintln!("❌ {}", error.user_friendly_message());
    error.severity().exit_code()
}

/// Logs a finished run. Item failures do not fail the run; re-running
/// retries them because finished outputs are skipped.
pub fn report_success(summary: &RunSummary) {
    tracing::info!(
        "✅ Done: {} processed, {} skipped, {} errors",
        summary.processed,
        summary.skipped,
        summary.errors
    );
    if !summary.output.is_empty() {
        tracing::info!("📁 Output: {}", summary.output);
    }
}

/// Reports the outcome of a run and returns the process exit code.
pub fn finish(result: crate::utils::error::Result<RunSummary>) -> i32 {
    match result {
        Ok(summary) => {
            report_success(&summary);
            0
        }
        Err(e) => report_failure(&e),
    }
}
