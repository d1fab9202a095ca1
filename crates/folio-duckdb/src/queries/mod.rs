pub mod summary;
pub mod views;
