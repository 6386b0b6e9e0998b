pub mod artifact;
pub mod cli;
pub mod config;
pub mod error;
pub mod navigator;
pub mod relay;
pub mod report;
pub mod runner;
pub mod session;
pub mod ui;
pub mod utils;

pub use artifact::Artifact;
pub use cli::Cli;
pub use config::ExportConfig;
pub use error::ExportError;
pub use report::{RunOutcome, RunReport, Step};
pub use runner::ExportRunner;
pub use session::{Connector, Session, ShellTransport, SshConnector};
