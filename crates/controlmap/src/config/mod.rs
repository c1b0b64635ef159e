pub mod loader;
pub mod schema;

pub use loader::{load_settings, load_settings_from_env, load_settings_from_str, CONFIG_ENV};
pub use schema::{
    AgentSettings, ExecutionSettings, LimitSettings, ProgressSettings, ServerSettings, Settings,
    StorageSettings,
};
