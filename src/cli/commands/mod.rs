pub mod config;
pub mod locale;
pub mod localizations;
pub mod play;
pub mod settings;
pub mod state;
