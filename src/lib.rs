pub mod ai;
pub mod console;
pub mod decode;
pub mod server;
pub mod transcript;
pub mod types;
