pub mod federation_config;
pub mod options;

pub use federation_config::{BotTraceConfig, FederationConfig, HostConfig, MemberConfig};
pub use options::{parse_config_value, parse_options};
