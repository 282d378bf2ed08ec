pub mod config;
pub mod protocol;
pub mod session;

pub use config::{default_store_path, CliConfig};
pub use protocol::CliCommand;
pub use session::Session;
