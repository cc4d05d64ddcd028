pub mod args;
pub mod bootstrap;
pub mod bundle;
pub mod config;
pub mod logging;
pub mod replica;
pub mod secrets;
pub mod utils;
pub mod vault;

pub use args::Args;
