// crates/transfer-mesh-agent/tests/common/mod.rs
// ============================================================================
// Module: Common Agent Fixtures
// Description: Spawns real agents on ephemeral loopback ports.
// Purpose: Share agent startup, shutdown, and job polling across tests.
// Dependencies: transfer-mesh-agent, transfer-mesh-config, tempfile, tokio
// ============================================================================

//! ## Overview
//! [`spawn_agent`] binds `127.0.0.1:0`, builds a config whose public URL
//! points at the bound port, and serves the agent on a background task. Each
//! agent gets its own temporary storage root and in-memory catalog.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use transfer_mesh_agent::AgentError;
use transfer_mesh_agent::AgentRuntime;
use transfer_mesh_agent::HttpAgentClient;
use transfer_mesh_config::TransferMeshConfig;
use transfer_mesh_core::CatalogEntry;
use transfer_mesh_core::DispatcherSnapshot;
use transfer_mesh_core::JobId;
use transfer_mesh_core::JobRecord;
use transfer_mesh_core::Mesh;
use transfer_mesh_core::SharedCatalog;
use transfer_mesh_core::hash_bytes;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Dataset used by transfer fixtures.
pub const DATASET: &str = "/prim/proc/tier";
/// Block used by transfer fixtures.
pub const BLOCK: &str = "/prim/proc/tier#0001";

/// Options for one spawned agent.
pub struct AgentOptions {
    /// Route prefix appended to the public URL.
    pub base_path: String,
    /// Dispatcher workers.
    pub workers: usize,
    /// Dispatcher queue capacity.
    pub queue_size: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            workers: 2,
            queue_size: 16,
        }
    }
}

/// Running agent bound to a loopback port.
pub struct TestAgent {
    /// Alias of the agent.
    pub alias: String,
    /// Public URL including the base path.
    pub url: String,
    /// Membership table.
    pub mesh: Arc<Mesh>,
    /// Local catalog.
    pub catalog: SharedCatalog,
    /// Storage root.
    pub storage: PathBuf,
    /// Shutdown trigger.
    shutdown: Option<oneshot::Sender<()>>,
    /// Serving task.
    handle: JoinHandle<Result<DispatcherSnapshot, AgentError>>,
    /// Temporary directory backing storage.
    _dir: TempDir,
}

impl TestAgent {
    /// Stops the agent and returns the final dispatcher snapshot.
    pub async fn stop(mut self) -> DispatcherSnapshot {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        (&mut self.handle).await.unwrap().unwrap()
    }

    /// Writes `content` under the storage root and catalogs it.
    pub fn seed_file(&self, lfn: &str, content: &[u8]) -> CatalogEntry {
        let name = lfn.trim_start_matches('/').replace('/', "_");
        let path = self.storage.join("seed").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        let entry = CatalogEntry {
            lfn: lfn.to_string(),
            pfn: path.to_string_lossy().into_owned(),
            dataset: DATASET.to_string(),
            block: BLOCK.to_string(),
            bytes: i64::try_from(content.len()).unwrap(),
            hash: hash_bytes(content),
        };
        self.catalog.add(&entry).unwrap();
        entry
    }
}

/// Spawns an agent with default options.
pub async fn spawn_agent(alias: &str) -> TestAgent {
    spawn_agent_with(alias, AgentOptions::default()).await
}

/// Spawns an agent with custom options.
pub async fn spawn_agent_with(alias: &str, options: AgentOptions) -> TestAgent {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = format!("http://{addr}{}", options.base_path);
    let config = agent_config(alias, &url, dir.path(), &options);
    let runtime = AgentRuntime::start(config).await.unwrap();
    let mesh = Arc::clone(runtime.mesh());
    let catalog = Arc::clone(runtime.catalog());
    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        runtime
            .serve(listener, async move {
                let _ = rx.await;
            })
            .await
    });
    TestAgent {
        alias: alias.to_string(),
        url,
        mesh,
        catalog,
        storage: dir.path().join("storage"),
        shutdown: Some(tx),
        handle,
        _dir: dir,
    }
}

/// Builds a validated config for a loopback agent.
pub fn agent_config(
    alias: &str,
    url: &str,
    root: &Path,
    options: &AgentOptions,
) -> TransferMeshConfig {
    let storage = root.join("storage");
    let text = format!(
        r"
[agent]
alias = '{alias}'
url = '{url}'
storage_dir = '{storage}'

[dispatcher]
workers = {workers}
queue_size = {queue_size}
metrics_interval_secs = 3600

[transfer]
max_attempts = 2
backoff_base_ms = 10
backoff_max_ms = 20
request_timeout_ms = 5000
connect_timeout_ms = 1000
",
        storage = storage.display(),
        workers = options.workers,
        queue_size = options.queue_size,
    );
    TransferMeshConfig::from_toml(&text).unwrap()
}

/// Builds a client with short timeouts.
pub fn client() -> HttpAgentClient {
    HttpAgentClient::new(Duration::from_secs(5), Duration::from_secs(1)).unwrap()
}

/// Polls a job until it reaches a terminal state.
pub async fn wait_for_job(client: &HttpAgentClient, url: &str, id: JobId) -> JobRecord {
    for _ in 0 .. 200 {
        let record = client.job(url, id).await.unwrap();
        if record.state.is_terminal() {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {id} did not finish");
}
