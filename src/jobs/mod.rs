/*!
 * Job management.
 *
 * - `state`: job ids, the status state machine and status reports
 * - `registry`: shared job table fed by status events
 * - `orchestrator`: worker pool running the pipeline per job
 * - `cancellation`: cooperative cancellation flag
 */

pub mod cancellation;
pub mod orchestrator;
pub mod registry;
pub mod state;

pub use cancellation::CancellationToken;
pub use orchestrator::{JobOrchestrator, JobRequest};
pub use registry::{JobRegistry, StatusEvent};
pub use state::{JobFailure, JobId, JobStatus, JobStatusReport, JobWarning};
