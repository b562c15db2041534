mod config;
mod error;
mod key;
mod loader;
mod registry;
mod view;

pub use anyhow::{anyhow, Result};
pub use async_trait::async_trait;
pub use config::*;
pub use error::*;
pub use key::*;
pub use loader::*;
pub use registry::*;
pub use view::*;

pub type LoaderContext = std::sync::Arc<Registry>;
