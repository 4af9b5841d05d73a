pub mod config;
pub mod dispatcher;
pub mod error;
pub mod payload;
pub mod report;
pub mod transport;

pub use config::*;
pub use dispatcher::*;
pub use error::*;
pub use payload::*;
pub use report::*;
pub use transport::*;
