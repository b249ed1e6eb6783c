#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod interchange;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod text_metrics;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{LayoutConfig, LayoutOptions};
pub use error::{ContractError, LayoutError, SolverError};
pub use layout::{compute_layout, compute_layout_with, LayoutContext, PositionedGraph};
