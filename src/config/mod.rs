pub mod loader;
pub mod schema;

pub use loader::{get_config_path, load_config, save_config};
pub use schema::{
    AddressBookConfig, Config, ContentConfig, DispatchConfig, MAX_DELAY_SECS, MIN_DELAY_SECS,
    OperatorConfig, WhatsAppConfig,
};
