//! Authority policies and agent selection.
//!
//! - [`PolicySource`]: read-only policy lookup ([`StaticPolicyStore`] in memory)
//! - [`PolicyEnforcer`]: authority and forbidden-action checks, fail-closed
//! - [`AgentSelector`]: deterministic, preference-ordered selection

pub mod enforcer;
pub mod policy;
pub mod selector;

pub use enforcer::{Denial, PolicyEnforcer};
pub use policy::{
    AgentPolicy, GovernanceConfig, PolicySource, SelectionPreferences, StaticPolicyStore,
};
pub use selector::AgentSelector;
