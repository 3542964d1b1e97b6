pub mod errors;
pub mod failed_row;
