/// TOML configuration file (`docqa.toml`) with environment overrides.
pub mod toml_config;
