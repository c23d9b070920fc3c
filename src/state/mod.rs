//! Per-host politeness state
//!
//! # Components
//!
//! - `HostState`: robots decision, pause window and counters for one host
//! - `HostPolicyStore`: the map of host states plus the throttling rules that update them

mod host_state;
mod policy;

pub use host_state::HostState;
pub use policy::HostPolicyStore;
