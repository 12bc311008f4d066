mod config;
mod error;
mod types;

pub use config::*;
pub use error::{AbortReason, CrabError, Result};
pub use types::*;
