// Library surface for headless/integration tests and reuse.
// The terminal UI and the App type stay in the binary.
pub mod app_dirs;
pub mod audio;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod draw;
pub mod history;
pub mod logging;
pub mod runtime;
pub mod session;
pub mod timer;
