//! Spider Host - native messaging host for the Spider browser extension.
//!
//! Keeps the extension signed in against the backend, answers its commands
//! and pushes session updates back to it. Commands arrive as JSON lines on
//! stdin; replies and events leave as JSON lines on stdout.

mod logging;
mod protocol;
mod surface;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use spider_core::{
    ApiClient, Capabilities, Config, EventRegistry, FileStorage, JobGateway, LifecycleEvent,
    Router, SessionManager, Storage, SurfaceUrls, SystemClock, TokioAlarms,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use protocol::Outbound;
use surface::EventSurface;

/// How long in-flight replies get to drain once stdin closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--whoami") {
        return whoami(&config).await;
    }
    let first_run = args.iter().any(|a| a == "--install");

    let _log_guard = logging::init_tracing(&config.log_dir()?)?;
    info!(base_url = %config.base_url, "Spider host starting");

    run(config, first_run).await
}

async fn run(config: Config, first_run: bool) -> Result<()> {
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Outbound>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        if let Err(e) = protocol::write_loop(&mut stdout, out_rx).await {
            warn!(error = %e, "Writing to extension failed");
        }
    });

    let api = ApiClient::new(&config)?;
    let files = FileStorage::new(config.data_dir()?)?;
    info!(dir = %files.dir().display(), "Using data directory");
    let storage: Arc<dyn Storage> = Arc::new(files);
    let clock = Arc::new(SystemClock);
    let (alarms, mut fired) = TokioAlarms::new(clock.clone());
    let caps = Capabilities {
        storage: storage.clone(),
        alarms: Arc::new(alarms),
        surface: Arc::new(EventSurface::new(out_tx.clone())),
        clock: clock.clone(),
    };

    let session = SessionManager::new(
        Arc::new(api.clone()),
        caps,
        SurfaceUrls::from_config(&config),
    );
    let gateway = Arc::new(JobGateway::new(api, storage, clock));
    let router = Router::new(session.clone(), gateway);

    // Subscribe before anything can change the session.
    let mut updates = session.broadcaster().subscribe();
    let forward_updates = {
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(state) => {
                        if out_tx.send(Outbound::StateUpdated { state }).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Dropped session updates");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };

    session.initialize().await;

    let mut registry = EventRegistry::new();
    session.register(&mut registry);

    let forward_alarms = {
        let registry = registry.clone();
        tokio::spawn(async move {
            while let Some(name) = fired.recv().await {
                registry.dispatch(LifecycleEvent::Alarm(name)).await;
            }
        })
    };

    let lifecycle = if first_run {
        LifecycleEvent::Installed
    } else {
        LifecycleEvent::Startup
    };
    tokio::spawn(async move {
        registry.dispatch(lifecycle).await;
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        debug!(bytes = line.len(), "Command received");
        let router = router.clone();
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            let reply = protocol::handle_line(&router, &line).await;
            let _ = out_tx.send(reply);
        });
    }

    info!("Extension disconnected, shutting down");
    forward_updates.abort();
    forward_alarms.abort();
    // The writer stops once the last sender, including the surface's, is gone.
    drop(router);
    drop(session);
    drop(out_tx);
    if tokio::time::timeout(SHUTDOWN_GRACE, writer).await.is_err() {
        warn!("Pending replies were not delivered before shutdown");
    }
    Ok(())
}

/// Print the account behind the stored token (diagnostic).
async fn whoami(config: &Config) -> Result<()> {
    let storage = FileStorage::new(config.data_dir()?)?;
    let token = storage
        .get("token")
        .await?
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| {
            anyhow::anyhow!("No saved session. Start the extension and sign in first.")
        })?;

    eprintln!("Fetching account from {}...", config.base_url);
    let api = ApiClient::new(config)?;
    let me = api.me_with_bearer(&token).await?;
    println!("{}", serde_json::to_string_pretty(&me)?);
    Ok(())
}
