pub mod context;
pub mod error;
pub mod progress;
pub mod runner;
pub mod settings;

pub use context::PipelineContext;
pub use error::{PipelineError, PipelineWarning};
pub use progress::{
    BroadcastProgress, NoopProgress, ProgressReporter, Stage, StageEvent, StageStatus,
};
pub use runner::{combine_text, CompletedRun, Pipeline, RunOutcome};
pub use settings::PipelineSettings;
