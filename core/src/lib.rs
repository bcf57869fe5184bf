pub mod error;
pub mod sanitize;
pub mod types;
pub mod validate;
