//! Common types shared across crates

pub mod errors;
pub mod status;

pub use errors::ErrorKind;
pub use status::Status;
