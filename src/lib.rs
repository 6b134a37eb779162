pub mod adapters;
pub mod config;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliConfig, Command};

pub use config::Stage;
pub use domain::{model::FailureAlert, model::HandlerResponse, ports::FailureNotifier};
pub use utils::error::{ConnectorError, Result};
