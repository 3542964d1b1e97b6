pub mod column;
pub mod descriptor;
