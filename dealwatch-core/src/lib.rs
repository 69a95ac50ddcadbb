pub mod classify;
pub mod config;
pub mod error;
pub mod error_utils;
pub mod filter;
pub mod source;
pub mod types;

pub use classify::*;
pub use config::*;
pub use error::*;
pub use error_utils::*;
pub use filter::*;
pub use source::*;
pub use types::*;
