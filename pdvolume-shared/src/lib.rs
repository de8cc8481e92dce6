//! pdvolume shared - errors and constants
//!
//! Common to the volume library, its command-line driver and the test fakes.

pub mod constants;
pub mod errors;

pub use errors::{PdError, PdResult};
