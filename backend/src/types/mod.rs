pub mod environment;
pub mod error;
pub mod extractors;

pub use environment::Environment;
pub use error::{ErrorResponse, UploadError};
pub use extractors::ImageUrl;
