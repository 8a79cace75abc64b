pub mod add;
pub mod config;
pub mod context;
pub mod remove;
pub mod upgrade;

pub use add::{add, AddArgs};
pub use config::{handle_config_command, ConfigCommand};
pub use context::Context;
pub use remove::{remove, RemoveArgs};
pub use upgrade::{upgrade, UpgradeArgs};
