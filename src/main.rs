//! Live order-tracking dashboard core.
//!
//! Connects the push stream and the summary poller, then logs snapshot
//! changes until interrupted. Rendering layers consume the same
//! `Dashboard` handle in-process.

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ordertrack_dashboard::dashboard::Dashboard;
use ordertrack_dashboard::models::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env();
    info!(base_url = %config.base_url, "starting order-tracking dashboard core");

    let dashboard = Dashboard::spawn(config)?;
    let mut changes = dashboard.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.recv() => {
                if changed.is_ok() {
                    let snapshot = dashboard.snapshot();
                    debug!(
                        orders = snapshot.orders.len(),
                        activity = snapshot.activity.len(),
                        riders = snapshot.riders.len(),
                        connectivity = ?snapshot.connectivity,
                        banner = %snapshot.banner,
                        "dashboard state changed"
                    );
                }
            }
        }
    }

    info!("shutting down");
    dashboard.shutdown();
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ordertrack_dashboard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
