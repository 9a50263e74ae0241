pub mod config;
pub mod editor;
pub mod error;
pub mod filler;
pub mod gateway;
pub mod handlers;
pub mod media;
pub mod models;
pub mod routes;
pub mod state;
pub mod submission;

use axum::Router;

pub fn build_state(config: &config::AppConfig) -> state::AppState {
    state::AppState::new(config)
}

pub fn build_app(config: &config::AppConfig) -> Router {
    routes::build_router(build_state(config), &config.allowed_origins)
}
