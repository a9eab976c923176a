//! Backend of a collaborative PDF viewer: PDF storage, highlights, access
//! history, and realtime relay of highlight events between viewers of the
//! same document.

pub mod config;
pub mod db;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::Config;
pub use state::AppState;
