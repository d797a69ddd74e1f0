pub mod autopilot;
pub mod config;
pub mod exchange;
pub mod intent;
pub mod messages;
pub mod navigation;
pub mod overlay;
pub mod runtime;
pub mod vehicle;
