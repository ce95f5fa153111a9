//! Built-in analysis tools.

mod call_path;
mod config_impact;
mod cross_repo;
mod error_chain;

pub use call_path::CallPathTool;
pub use config_impact::ConfigImpactTool;
pub use cross_repo::CrossRepoTool;
pub use error_chain::ErrorChainTool;
