pub mod summary;
pub mod threshold;
