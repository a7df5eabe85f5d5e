//! Media-plane ingress/egress and per-conference fan-out (§4.6).
//!
//! Owns the shared ingress UDP socket, one egress socket per recipient,
//! and the passthrough/composite dispatch between them. Sits above
//! `conf-reassembly`, `conf-registry` and `conf-topology` in the
//! dependency order; `conf-compositor` sits above this crate and plugs
//! in through [`relay::CompositingLifecycle`].

pub mod egress;
pub mod fragment;
pub mod relay;

pub use egress::{EgressMetrics, EgressPool};
pub use fragment::fragment;
pub use relay::{egress_peer_addr, remove_participant, CompositingLifecycle, MediaRelay, RelayMetrics};
