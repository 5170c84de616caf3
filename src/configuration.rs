pub mod config;
pub mod types;

pub use config::{Cli, Command, Config};
pub use types::{Credentials, LoginOutcome};
