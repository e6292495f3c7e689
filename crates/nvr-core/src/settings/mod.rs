mod config_store;
mod recording_settings;

pub use {config_store::ConfigStore, recording_settings::RecordingSettings};
