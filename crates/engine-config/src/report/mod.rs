pub mod rejected;
pub mod summary;
