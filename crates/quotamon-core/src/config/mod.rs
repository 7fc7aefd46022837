mod settings;
mod store;
mod watcher;

pub use settings::{
    DemoSettings, GreetingSettings, LowValueSettings, Overrides, Settings, TimeOfDay,
    WorkHoursSettings,
};
pub use store::{ConfigReceiver, ConfigStore};
pub use watcher::spawn_config_watcher;
