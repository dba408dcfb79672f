//! Configuration for docmap.
//!
//! Two kinds of configuration live here: the engine's textual `key=value`
//! grammar that every create call speaks, and the mapper's own settings.

mod grammar;
mod mapper;

pub use grammar::{parse_config, ConfigObject, ConfigValue};
pub use mapper::{IndexIdScope, MapperConfig, MapperConfigBuilder, TableOptions};
