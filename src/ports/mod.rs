pub mod catalog;
pub mod checkpoint;
