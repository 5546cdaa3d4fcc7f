mod common;
mod level;
mod upload;
