use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use std::sync::Arc;

/// Main-method of the application.
/// Parses command-line arguments, binds the listener and runs the accept loop until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();

    // Failing to bind is the only fatal error
    let server = match Server::bind(&config).await {
        Ok(server) => Arc::new(server),
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    let server_handle = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run().await })
    };

    tokio::select! {
        result = server_handle => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Network task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            server.stop();
        }
    }

    Ok(())
}
