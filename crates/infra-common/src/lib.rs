/*!
# infra-common

The ambient layer shared by every crate in the conference relay workspace:

- Logging and metrics standardization
- Common error types and context

This crate is a horizontal layer the other components leverage to ensure
consistency and reduce duplication.
*/

pub mod logging;
pub mod errors;

pub use logging::setup::setup_logging;
pub use errors::types::Error;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
