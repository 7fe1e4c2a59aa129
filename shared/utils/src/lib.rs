pub mod config;
pub mod error;
pub mod logging;
pub mod records;

pub use self::config::*;
pub use error::*;
pub use logging::*;
pub use records::*;
