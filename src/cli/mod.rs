pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod info;
pub mod output;
pub mod replay;
pub mod resolve;
pub mod runtime;
pub mod session;
pub mod simulate;

pub use app::run;
pub use output::{LogFormat, OutputFormat};
