#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::net::TcpListener;

    use tracing::{info, warn};
    use tracing_subscriber::EnvFilter;

    use plaza::config::Config;
    use plaza::core::db::seed_demo_data;
    use plaza::state::AppState;

    pub async fn run() -> std::io::Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "plaza=info,actix_web=info".into()),
            )
            .init();

        let config = Config::from_env();
        info!(?config, "starting");

        let app = AppState::in_memory(config.clone());
        if config.seed_demo_data {
            if let Err(e) = seed_demo_data(app.store()) {
                warn!(error = %e, "demo seed failed");
            }
        }

        let listener = TcpListener::bind(&config.bind_addr)?;
        info!("Server listening on http://{}", listener.local_addr()?);

        plaza::server::run(listener, app)?.await
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    native::run().await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
