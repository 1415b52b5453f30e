// ============================================
// Batch Jobs
// ============================================
//
// The comparison job runs once per invocation and exits; schedule it
// externally (cron, CI) after each click export refresh.

pub mod comparison_batch;

pub use comparison_batch::{ComparisonBatchJob, JobOutcome};
