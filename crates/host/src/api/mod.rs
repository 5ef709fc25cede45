//! Types downstream clients interact with.
mod errors;
mod handle;

pub use errors::{HostError, Result};
pub use handle::HostHandle;
