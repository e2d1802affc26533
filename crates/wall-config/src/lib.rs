//! wall-config: video wall configuration
//!
//! Loads the YAML description of a wall (connection templates, devices and
//! their channels, acquisition tuning), expands it into one source
//! identifier per tile, and computes the tile grid.

mod error;
pub use error::{ConfigError, Result};

mod template;
pub use template::{build_identifier, ChannelFormat, TemplateFields};

mod config;
pub use config::{load_config, ConnectionSettings, SourceEntry, StreamSettings, WallConfig};

pub mod layout;
pub use layout::{cell_size, grid_for, position, Grid};
