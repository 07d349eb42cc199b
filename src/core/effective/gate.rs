// ─── Effective POM Gate ───
// Globally rate-limited access to the external flattener.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::store::CapacityStore;
use super::tool::EffectivePomTool;
use crate::core::error::{ResolverError, ResolverResult};
use crate::core::maven::Gav;

/// Store key shared by every process that talks to the same store.
pub const CAPACITY_KEY: &str = "coordinate-resolver:effective-pom:in-flight";

const INPUT_FILE: &str = "pom.xml";
const OUTPUT_FILE: &str = "effective-pom.xml";

#[derive(Debug, Clone)]
pub struct GateSettings {
    pub enabled: bool,
    pub max_concurrent: u32,
    pub max_wait: Duration,
    pub poll_interval: Duration,
    /// Counter expiry; reclaims slots of holders that died mid-run.
    pub ticket_ttl: Duration,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_concurrent: 2,
            max_wait: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            ticket_ttl: Duration::from_secs(180),
        }
    }
}

/// One held slot.
#[derive(Debug)]
pub struct Ticket {
    pub id: Uuid,
    acquired_at: Instant,
}

/// Flattens raw POMs through an external tool, never running more than
/// `max_concurrent` tools at once across everything sharing the store.
#[derive(Clone)]
pub struct EffectivePomGate {
    store: Arc<dyn CapacityStore>,
    tool: Arc<dyn EffectivePomTool>,
    settings: GateSettings,
}

impl EffectivePomGate {
    pub fn new(
        store: Arc<dyn CapacityStore>,
        tool: Arc<dyn EffectivePomTool>,
        settings: GateSettings,
    ) -> Self {
        Self {
            store,
            tool,
            settings,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Poll the store until a slot frees up. Fails with
    /// [`ResolverError::CapacityTimeout`] once `max_wait` has elapsed.
    pub async fn acquire(&self) -> ResolverResult<Ticket> {
        let started = Instant::now();
        loop {
            match self
                .store
                .try_acquire(
                    CAPACITY_KEY,
                    self.settings.max_concurrent,
                    self.settings.ticket_ttl,
                )
                .await
            {
                Ok(true) => {
                    let ticket = Ticket {
                        id: Uuid::new_v4(),
                        acquired_at: Instant::now(),
                    };
                    debug!(
                        "Ticket {} acquired after {:?}",
                        ticket.id,
                        started.elapsed()
                    );
                    return Ok(ticket);
                }
                Ok(false) => {}
                Err(e) => warn!("Capacity store unavailable, retrying: {}", e),
            }

            let waited = started.elapsed();
            if waited >= self.settings.max_wait {
                return Err(ResolverError::CapacityTimeout {
                    waited,
                    ceiling: self.settings.max_concurrent,
                });
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    /// Effective POM bytes for `raw`, or `raw` itself when the gate is off or
    /// the tool fails in any way. Only capacity exhaustion is an error.
    pub async fn effective(&self, gav: &Gav, raw: &[u8]) -> ResolverResult<Vec<u8>> {
        if !self.settings.enabled {
            return Ok(raw.to_vec());
        }

        let slot = HeldSlot {
            store: Arc::clone(&self.store),
            ticket: Some(self.acquire().await?),
        };

        // The run owns its slot: if the caller goes away the tool still
        // finishes (or times out) and the slot is still handed back.
        let tool = Arc::clone(&self.tool);
        let input = raw.to_vec();
        let run = tokio::spawn(async move {
            let outcome = run_tool(tool.as_ref(), &input).await;
            slot.release().await;
            outcome
        });

        match run.await {
            Ok(Ok(flattened)) => {
                info!("Effective POM computed for {}", gav);
                Ok(flattened)
            }
            Ok(Err(e)) => {
                warn!("Effective POM failed for {}, using raw POM: {}", gav, e);
                Ok(raw.to_vec())
            }
            Err(e) => {
                warn!("Effective POM task for {} aborted: {}", gav, e);
                Ok(raw.to_vec())
            }
        }
    }
}

/// A ticket bound to the store it came from. Dropped without
/// [`HeldSlot::release`], e.g. by a panicking tool, it still gives the slot back.
struct HeldSlot {
    store: Arc<dyn CapacityStore>,
    ticket: Option<Ticket>,
}

impl HeldSlot {
    async fn release(mut self) {
        if let Some(ticket) = self.ticket.take() {
            release_ticket(self.store.as_ref(), ticket).await;
        }
    }
}

impl Drop for HeldSlot {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = Arc::clone(&self.store);
                handle.spawn(async move { release_ticket(store.as_ref(), ticket).await });
            }
            Err(_) => warn!("Ticket {} dropped outside a runtime, left to TTL", ticket.id),
        }
    }
}

async fn release_ticket(store: &dyn CapacityStore, ticket: Ticket) {
    match store.release(CAPACITY_KEY).await {
        Ok(()) => debug!(
            "Ticket {} released after {:?}",
            ticket.id,
            ticket.acquired_at.elapsed()
        ),
        // TTL on the counter reclaims it.
        Err(e) => warn!("Ticket {} release failed: {}", ticket.id, e),
    }
}

async fn run_tool(tool: &dyn EffectivePomTool, raw: &[u8]) -> ResolverResult<Vec<u8>> {
    let workdir = tempfile::tempdir()?;
    let input = workdir.path().join(INPUT_FILE);
    let output = workdir.path().join(OUTPUT_FILE);

    tokio::fs::write(&input, raw)
        .await
        .map_err(|e| ResolverError::Io {
            path: input.clone(),
            source: e,
        })?;

    tool.flatten(&input, &output).await?;

    let flattened = tokio::fs::read(&output)
        .await
        .map_err(|e| ResolverError::Io {
            path: output.clone(),
            source: e,
        })?;
    if flattened.is_empty() {
        return Err(ResolverError::Tool("tool produced an empty document".into()));
    }
    Ok(flattened)
}
