pub mod level;
pub mod shared;
