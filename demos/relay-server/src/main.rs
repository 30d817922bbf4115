use std::sync::Arc;

use parlor::prelude::*;
use parlor_store::SqliteMessageLog;

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

fn rooms() -> Vec<(RoomCode, String)> {
    vec![
        (RoomCode::new("LOUNGE"), "The Lounge".to_string()),
        (RoomCode::new("TECH"), "Tech Talk".to_string()),
    ]
}

fn roster() -> Vec<Identity> {
    vec![
        Identity::new(
            "admin",
            "changeme-please",
            "Admin",
            vec![
                RoomCode::new("LOUNGE"),
                RoomCode::new("TECH"),
                RoomCode::admin(),
            ],
        ),
        Identity::new(
            "frodo",
            "second-breakfast",
            "Frodo",
            vec![RoomCode::new("LOUNGE"), RoomCode::new("TECH")],
        ),
        Identity::new(
            "samwise",
            "rosie-cotton",
            "Sam",
            vec![RoomCode::new("LOUNGE")],
        ),
    ]
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

/// Picks the message log backend: sqlite when `DATABASE_URL` is set
/// (e.g. `sqlite:parlor.db?mode=rwc`), in-memory otherwise.
async fn message_log() -> Result<Arc<dyn MessageLog>, ParlorError> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            tracing::info!(%url, "using sqlite message log");
            Ok(Arc::new(SqliteMessageLog::connect(&url).await?))
        }
        Err(_) => {
            tracing::info!(
                "DATABASE_URL not set, using in-memory message log"
            );
            Ok(Arc::new(MemoryMessageLog::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let addr = std::env::var("PARLOR_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let credentials = Arc::new(MemoryCredentialStore::new(roster()));
    let log = message_log().await?;

    tracing::info!(%addr, "starting relay server");
    let server = ParlorServer::builder()
        .bind(&addr)
        .rooms(rooms())
        .build(credentials, log)
        .await?;

    server.run().await?;
    Ok(())
}
