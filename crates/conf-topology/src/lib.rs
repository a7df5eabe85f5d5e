//! Topology Controller: recomputes each conference's media topology
//! after every membership change and issues the resulting directives.

pub mod controller;
pub mod lifecycle;

pub use controller::TopologyController;
pub use lifecycle::{NoRelayLifecycle, RelayLifecycle};
