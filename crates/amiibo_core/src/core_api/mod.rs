mod engine;
mod error;
mod types;

pub use engine::{Engine, RepairOutcome, Session};
pub use error::{CoreError, CoreErrorCode};
pub use types::{Format, Mode};
