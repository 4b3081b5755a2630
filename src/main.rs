use std::sync::Arc;

use connectotron::config::{load_config, print_schema};
use connectotron::startup::run;
use connectotron::utils::logger::init_logging;
use tracing::error;

#[tokio::main]
async fn main() {
    if std::env::args().any(|arg| arg == "--schema") {
        print_schema();
        return;
    }

    let config = Arc::new(load_config());
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialise logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!(
            event_name = "server.failed",
            event_domain = "startup",
            "Server error: {}",
            e
        );
        std::process::exit(1);
    }
}
