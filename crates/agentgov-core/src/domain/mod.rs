//! Domain models for agent delegation.
//!
//! - `AuthorityLevel`: ordered permission tier
//! - `Task`: a unit of work loaded from an external definition
//! - `AgentConfig` / `AgentDirectory`: provider and model binding per agent
//! - `ConfigError`: fatal configuration failures

pub mod agent_config;
pub mod authority;
pub mod error;
pub mod task;

pub use agent_config::{AgentConfig, AgentDirectory, ApiType};
pub use authority::AuthorityLevel;
pub use error::{ConfigError, ConfigResult};
pub use task::{ChatTurn, ModelParams, Task};
