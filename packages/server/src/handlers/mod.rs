pub mod level;
pub mod upload;
