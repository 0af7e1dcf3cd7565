//! Ember node binary
//!
//! An auto-bootstrapping network formation node.

use ember_bootstrap::{EmberNode, NodeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ember_node=info,ember=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Ember node");

    let config = NodeConfig::from_env();

    let node = EmberNode::new(config);
    node.run().await?;

    Ok(())
}
