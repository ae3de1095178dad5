pub mod scheduler;
pub mod server;
pub mod wire;

pub use scheduler::{ScheduleState, Submission, TurnScheduler};
pub use server::{run_batch, run_stdio, OutputFormat, ServerContext, ServerError};
