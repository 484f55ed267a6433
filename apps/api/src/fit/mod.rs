pub mod cache;
pub mod computer;
pub mod handlers;
