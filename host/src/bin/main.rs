use std::{path::PathBuf, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{Builder, Rotation},
};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};
use url::Url;

use zkpool_coordinator::{ConnRegistry, Coordinator, MessageHub, RpcVerifier, Verifier};
use zkpool_host::{
    interfaces::{HostError, HostResult},
    parse_opts,
    server::{serve, HostState},
};
use zkpool_taskdb::{InMemoryTaskStore, SqliteTaskStore, TaskStore};

/// Inbound frames buffered across all prover connections.
const INBOUND_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> HostResult<()> {
    dotenv::dotenv().ok();
    let opts = parse_opts()?;
    let _guard = subscribe_log(&opts.log_path, &opts.log_level, opts.max_log);
    debug!("Args:\n{:#?}", opts);

    let store: Arc<dyn TaskStore> = match &opts.sqlite_path {
        Some(path) => Arc::new(SqliteTaskStore::open(path)?),
        None => Arc::new(InMemoryTaskStore::new()),
    };
    let verifier: Option<Arc<dyn Verifier>> = match &opts.verifier_endpoint {
        Some(endpoint) if !endpoint.is_empty() => {
            let url = Url::parse(endpoint)
                .map_err(|err| HostError::InvalidOption(format!("verifier endpoint: {err}")))?;
            Some(Arc::new(RpcVerifier::new(url)))
        }
        _ => {
            info!("no verifier endpoint configured; proofs are accepted unverified");
            None
        }
    };

    let registry = Arc::new(ConnRegistry::new());
    let (hub, inbound) = MessageHub::new(INBOUND_CAPACITY);
    let coordinator = Arc::new(Coordinator::new(
        opts.coordinator_config()?,
        store,
        verifier,
        registry.clone(),
    ));

    let cancel = CancellationToken::new();
    let coordinator_task = tokio::spawn(coordinator.clone().run(inbound, cancel.clone()));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            shutdown.cancel();
        });
    }

    let state = HostState {
        coordinator,
        registry,
        hub,
        shutdown,
    };
    serve(state, &opts.endpoint).await?;

    // Transport is down; stop the coordinator and let outstanding session
    // collectors reconcile the task store.
    cancel.cancel();
    coordinator_task.await??;
    Ok(())
}

pub fn subscribe_log(
    log_path: &Option<PathBuf>,
    log_level: &str,
    max_log: usize,
) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_filter(env_filter);

    if let Some(dir) = log_path {
        let appender = Builder::new()
            .rotation(Rotation::DAILY)
            .filename_prefix("zkpool.log")
            .max_log_files(max_log)
            .build(dir)
            .expect("failed to initialize rolling file appender");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let file_layer = fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_filter(EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(stdout_layer)
            .with(file_layer)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry().with(stdout_layer).init();
        None
    }
}
