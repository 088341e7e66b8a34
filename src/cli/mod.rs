pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod fingerprint;
pub mod output;
pub mod runtime;
pub mod ticks;

pub use config::{cmd_config, ConfigArgs};
pub use fingerprint::{cmd_fingerprint, FingerprintArgs, Manifest};
pub use ticks::{cmd_ticks, TicksArgs};
