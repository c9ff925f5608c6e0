//! Bot Process
//!
//! A long-running control loop driven by the latest configuration it could
//! fetch from the config provider.

pub mod budget;
pub mod cache;
pub mod process;
pub mod state;
pub mod status;
pub mod work;

pub use budget::WorkBudget;
pub use cache::{CachedSnapshot, ConfigCache};
pub use process::{Bot, BotOptions, BotStatus, RefreshOutcome, MAX_INTERVAL};
pub use state::BotState;
pub use work::{Heartbeat, WorkUnit};
