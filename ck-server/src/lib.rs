pub mod errors;
pub mod sessions;
