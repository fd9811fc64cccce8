pub mod config;
pub mod error;
pub mod traits;

pub use config::BizFlowConfig;
pub use error::{BizFlowError, Result};
pub use traits::{Command, CommandExecutor, CommandHandler, Query, QueryExecutor, QueryHandler};
