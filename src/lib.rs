//! Social feed backend: accounts, posts, likes, comments and follows over a
//! key-value document store.
//!
//! The same handlers serve two hosts: a Spin HTTP component (wasm32, backed by
//! the Spin key-value store) and a native actix-web server (see [`server`]).

pub mod auth;
pub mod config;
pub mod core;
pub mod follow;
pub mod handlers;
pub mod interactions;
pub mod models;
pub mod posts;
pub mod state;
pub mod users;

#[cfg(not(target_arch = "wasm32"))]
pub mod server;

// === Component entrypoint ===
#[cfg(target_arch = "wasm32")]
#[spin_sdk::http_component]
fn handle(req: spin_sdk::http::Request) -> anyhow::Result<spin_sdk::http::Response> {
    let config = config::Config::from_env();
    let app = state::AppState::for_component(config)?;
    if app.config.seed_demo_data {
        crate::core::db::seed_demo_data(app.store())?;
    }
    Ok(handlers::handle_request(&app, req))
}
