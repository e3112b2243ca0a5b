pub mod config;
pub mod error;
pub mod layout;
pub mod phase;
pub mod report;
pub mod secrets;
pub mod session;

pub use error::AppError;
pub use layout::Layout;
