pub mod column_type;
pub mod value;
