//! drp-node — the DRP core service binary.
//!
//! Startup sequence:
//!   1. Load the typed config from flags/environment; refuse bad quorum
//!      arithmetic before touching any key material
//!   2. Open the keystore and load (or create) the elder committee and the
//!      ledger operator key
//!   3. Open the ledger database (schema trees are created idempotently)
//!   4. Start the JSON-RPC 2.0 server
//!   5. Run the oversight-event logger and the periodic committee
//!      reconciliation task until shutdown

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{info, warn};

use drp_keystore::Keystore;
use drp_ledger::{ArtifactPipeline, DecisionLedger, LedgerDb, MemoryArtifactStore, OversightManager};
use drp_policy::PolicyEngine;
use drp_quorum::QuorumService;
use drp_rpc::{RpcServer, RpcServerState, RpcStoreContact};

use crate::config::{Args, NodeConfig};

/// Reconciliation cadence for the elder status map.
const RECONCILE_INTERVAL_SECS: u64 = 60;
/// Max in-flight artifact pins before the decide path skips pinning.
const ARTIFACT_PIN_PERMITS: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,drp=debug".parse().unwrap()),
        )
        .init();

    let config = NodeConfig::from_args(Args::parse());
    info!(n = config.quorum.n, m = config.quorum.m, "DRP node starting");

    // Refuse to run on broken quorum arithmetic before anything else.
    config.quorum.validate().context("validating quorum config")?;

    // ── Keystore & committee ──────────────────────────────────────────────────
    let keystore = Arc::new(
        Keystore::open(&config.keystore_dir, config.dev_seed.clone())
            .context("opening keystore")?,
    );
    let quorum = Arc::new(
        QuorumService::init(config.quorum, Arc::clone(&keystore))
            .context("initializing elder committee")?,
    );

    // ── Ledger ────────────────────────────────────────────────────────────────
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
    let db = Arc::new(LedgerDb::open(&config.data_dir).context("opening ledger database")?);

    let operator = keystore
        .load_or_create_operator()
        .context("loading operator key")?;

    // Per-object artifact keys derive from this master secret: the dev
    // seed in development, process-local randomness otherwise.
    let artifact_master = match keystore.derive_seed("artifact-master", 0) {
        Ok(seed) => seed,
        Err(_) => {
            let mut key = [0u8; 32];
            OsRng.fill_bytes(&mut key);
            key
        }
    };
    let artifacts = ArtifactPipeline::new(
        Arc::new(MemoryArtifactStore::new()),
        artifact_master,
        ARTIFACT_PIN_PERMITS,
    );
    let ledger = Arc::new(DecisionLedger::new(Arc::clone(&db), operator, artifacts));

    let (oversight, mut oversight_events) = OversightManager::new(Arc::clone(&db));
    let oversight = Arc::new(oversight);

    // Resolution side-effects are emitted, never executed here.
    tokio::spawn(async move {
        while let Some(event) = oversight_events.recv().await {
            info!(?event, "oversight event");
        }
    });

    // ── RPC server ────────────────────────────────────────────────────────────
    let rpc_state = Arc::new(RpcServerState {
        quorum: Arc::clone(&quorum),
        ledger,
        oversight,
        policy: PolicyEngine::new(),
        store_contact: RpcStoreContact {
            host: config.store.host.clone(),
            port: config.store.port,
        },
    });
    let rpc_handle = RpcServer::new(rpc_state)
        .start(config.rpc_addr)
        .await
        .context("starting RPC server")?;

    // ── Background reconciliation ─────────────────────────────────────────────
    let reconciler = Arc::clone(&quorum);
    let required_m = config.quorum.m;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(RECONCILE_INTERVAL_SECS));
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            let active = reconciler.reconcile().await;
            if active < required_m {
                warn!(active, required_m, "active elders below quorum threshold");
            }
        }
    });

    info!("node ready");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutting down");
    let _ = rpc_handle.stop();
    Ok(())
}
