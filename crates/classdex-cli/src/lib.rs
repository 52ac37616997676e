//! Library interface for the classdex command-line tool

pub mod config;
pub mod generate;
pub mod inspect;
pub mod output;
pub mod sources;

pub use config::{ConfigOverrides, GenerateConfig};
pub use generate::{run, GenerateReport};
