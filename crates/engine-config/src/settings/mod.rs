pub mod load;
pub mod validated;
