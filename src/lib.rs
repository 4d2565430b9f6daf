pub mod actions;
pub mod config;
pub mod decision;
pub mod enrich;
pub mod errors;
pub mod hints;
pub mod host;
pub mod orchestrator;
pub mod page;
pub mod store;
pub mod testing;
pub mod types;

pub use config::AgentConfig;
pub use errors::AgentError;
pub use hints::CaptureSession;
pub use orchestrator::Orchestrator;
pub use page::PageModel;
pub use types::*;
