//! Tours, the registry that names them, and the runner that executes them

mod registry;
mod runner;
mod step;

pub use registry::{TourFile, TourRegistry};
pub use runner::{FailurePayload, Run, RunError, RunHandle, RunOptions, RunStatus, TourRunner};
pub use step::{Step, StepDef, StepKind, Tour, TourDef};
