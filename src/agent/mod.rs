pub mod error;
pub mod extractor;
pub mod poller;
pub mod service;
pub mod session;
pub mod types;

pub use error::*;
pub use extractor::*;
pub use poller::*;
pub use service::*;
pub use session::*;
pub use types::*;
