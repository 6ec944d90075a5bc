/// Deadline wrapper for external calls.
pub mod timeout;
/// TOML configuration file model, loading and validation.
pub mod toml_config;
