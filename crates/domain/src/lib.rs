pub mod category;
pub mod config;
pub mod error;
pub mod response;
pub mod stream;
pub mod trace;
