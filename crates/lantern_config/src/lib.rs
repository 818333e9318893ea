//! Configuration loading and the registry of named inference servers.
//!
//! Configuration is layered with the `config` crate:
//! 1. Bundled defaults (`lantern.toml` shipped with the library)
//! 2. `~/.config/lantern/lantern.toml`
//! 3. `./lantern.toml`
//! 4. `LANTERN__*` environment variables

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod registry;

pub use config::{LanternConfig, ModelSpec, SelectorConfig};
pub use registry::{ConfigRegistry, SharedConfiguration};
