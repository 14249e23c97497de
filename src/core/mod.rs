pub mod config;
pub mod error;
pub mod io;
pub mod prefs;
pub mod state;
