use polldance::config::Config;
use polldance::router::build_router;
use polldance::startup::AppState;

#[macro_use]
extern crate tracing;

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "INFO");
        }
    }
    // initialize tracing
    tracing_subscriber::fmt::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let app_state = match AppState::connect(&config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Error connecting to database: {}", e);
            std::process::exit(1);
        }
    };

    let app = build_router(app_state, config.cors_origin.as_deref());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Unable to spawn tcp listener");
    info!("Server is running on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
