use access_control_demo::{build_app, permissions};
use gatehouse::AccessControlConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env does not overwrite variables already set
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gatehouse=debug,access_control_demo=debug")),
        )
        .init();

    let config = AccessControlConfig::load("application.yaml")?;
    let app = build_app(&config, permissions::seed())?;

    let addr = std::env::var("DEMO_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "access-control-demo listening");

    println!("=== access-control-demo ready on http://{addr} ===");
    println!("Try:");
    println!("  curl -i localhost:3000/Home/Index");
    println!("  curl -i localhost:3000/Orders");
    println!("  curl -i localhost:3000/Orders -H 'X-User: bob'");
    println!("  curl -i -X POST localhost:3000/Orders/Delete -H 'X-User: bob'");
    println!("  curl -i -X POST localhost:3000/Orders/Delete -H 'X-User: alice'");
    println!("  curl -i localhost:3000/Orders -H 'X-Access-Key: demo-key'");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
