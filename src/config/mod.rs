pub mod identity;
pub mod setting;
pub mod utils;

pub use identity::DeviceIdentity;
pub use setting::Setting;
pub use utils::{get_config_dir, get_data_dir, get_setting_path};
