pub mod calls;
pub mod config;
pub mod dashboard;

pub use calls::*;
pub use config::*;
pub use dashboard::*;
