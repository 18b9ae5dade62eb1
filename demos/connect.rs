//! Connects to a push server, subscribes to one task and prints its updates.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info cargo run --example connect -- ws://localhost:10001 42
//! ```

use std::time::Duration;

use futures::StreamExt as _;
use tokio::time::timeout;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let address = args
        .next()
        .unwrap_or_else(|| "ws://localhost:10001".to_owned());
    let task_id = args.next().unwrap_or_else(|| "1".to_owned());

    let socket = match push_socket::connect(&address) {
        Ok(socket) => socket,
        Err(e) => {
            warn!(error = %e, "Live updates unavailable");
            return Ok(());
        }
    };

    let updates = socket.on_message(&format!("task_update:{task_id}"));
    let mut updates = Box::pin(updates);
    socket.emit("subscribe", serde_json::json!({ "task_id": task_id }))?;

    while let Ok(Some(update)) = timeout(Duration::from_secs(30), updates.next()).await {
        let update = match update {
            Ok(update) => update,
            Err(e) => {
                warn!(error = %e, "Missed some task updates");
                continue;
            }
        };
        info!(event = %update.event, data = %update.data, "Task update");

        if update.data["status"] == "completed" {
            break;
        }
    }

    socket.disconnect();
    info!(state = ?socket.state(), "Done");

    Ok(())
}
