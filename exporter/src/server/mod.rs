pub mod http;

pub use http::{handle, serve};
