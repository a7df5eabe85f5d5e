//! Logging and metrics standardization: structured setup on top of
//! `tracing`/`tracing-subscriber`, plus lightweight context and counters
//! for the relay's drop/error bookkeeping (§7).

pub mod context;
pub mod metrics;
pub mod setup;
