//! Collection run: prefetch the policy name cache, then fan out one task per
//! container.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::container::{process_container, ChildEnumeration, Container, CONTAINER_ATTRIBUTES};
use crate::directory::{Directory, DirectoryError, QueryScope};
use crate::gpo::PolicyNameCache;

/// Domain roots and OUs anywhere under the naming context.
pub const CONTAINER_FILTER: &str = "(|(objectClass=domain)(objectClass=organizationalUnit))";

/// Counters for a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    /// Domain collected.
    pub domain: String,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub finished_at: DateTime<Utc>,
    /// Policies loaded into the cache before fan-out.
    pub policies_cached: usize,
    /// Domain roots processed.
    pub domain_roots: usize,
    /// OUs processed.
    pub organizational_units: usize,
    /// Enabled links across all containers.
    pub policy_links: usize,
    /// OUs whose child query failed.
    pub failed_enumerations: usize,
    /// Whether dispatch stopped early.
    pub cancelled: bool,
}

/// Everything a run produces.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionOutput {
    /// Run counters.
    pub summary: CollectionSummary,
    /// Processed containers, sorted by distinguished name.
    pub containers: Vec<Container>,
}

/// Drives one collection run against a directory.
pub struct Collector {
    directory: Arc<dyn Directory>,
    cache: Arc<PolicyNameCache>,
    domain: String,
    max_concurrency: usize,
    cancelled: Arc<AtomicBool>,
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("domain", &self.domain)
            .field("max_concurrency", &self.max_concurrency)
            .field("cached_policies", &self.cache.len())
            .finish()
    }
}

impl Collector {
    /// Create a collector with a fresh cache.
    ///
    /// `max_concurrency` of zero is treated as one.
    pub fn new(
        directory: Arc<dyn Directory>,
        domain: impl Into<String>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            directory,
            cache: Arc::new(PolicyNameCache::new()),
            domain: domain.into().to_uppercase(),
            max_concurrency: max_concurrency.max(1),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The run's policy name cache.
    pub fn cache(&self) -> &Arc<PolicyNameCache> {
        &self.cache
    }

    /// Flag that stops dispatching new containers once set.
    ///
    /// Containers already dispatched run to completion.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Build the cache, enumerate containers and process them all.
    ///
    /// # Errors
    ///
    /// Fails only if the cache build or the container enumeration query
    /// fails. Per-container failures are recorded on the containers.
    pub async fn run(&self) -> Result<CollectionOutput, DirectoryError> {
        let started_at = Utc::now();
        info!(domain = %self.domain, "starting collection run");

        let policies_cached = self
            .cache
            .build(self.directory.as_ref(), &self.domain)
            .await?;

        let entries = self
            .directory
            .query(
                CONTAINER_FILTER,
                &CONTAINER_ATTRIBUTES,
                QueryScope::Subtree,
                None,
            )
            .await?;

        let containers: Vec<Container> = entries
            .into_iter()
            .filter_map(|entry| Container::from_entry(entry, &self.domain))
            .collect();
        info!(count = containers.len(), "containers enumerated");

        let containers = self.process_all(containers).await;

        let mut summary = CollectionSummary {
            domain: self.domain.clone(),
            started_at,
            finished_at: Utc::now(),
            policies_cached,
            domain_roots: 0,
            organizational_units: 0,
            policy_links: 0,
            failed_enumerations: 0,
            cancelled: self.cancelled.load(Ordering::SeqCst),
        };
        for container in &containers {
            summary.policy_links = summary
                .policy_links
                .saturating_add(container.policy_links().len());
            match container {
                Container::DomainRoot(_) => {
                    summary.domain_roots = summary.domain_roots.saturating_add(1);
                }
                Container::OrganizationalUnit(ou) => {
                    summary.organizational_units = summary.organizational_units.saturating_add(1);
                    if matches!(ou.children, ChildEnumeration::Failed { .. }) {
                        summary.failed_enumerations =
                            summary.failed_enumerations.saturating_add(1);
                    }
                }
            }
        }

        info!(
            domain_roots = summary.domain_roots,
            ous = summary.organizational_units,
            links = summary.policy_links,
            failed = summary.failed_enumerations,
            "collection run finished"
        );

        Ok(CollectionOutput {
            summary,
            containers,
        })
    }

    /// Process `containers` concurrently, at most `max_concurrency` at a time.
    ///
    /// The cache must already be built. Output is sorted by distinguished
    /// name; a task that panics is logged and dropped.
    pub async fn process_all(&self, containers: Vec<Container>) -> Vec<Container> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = JoinSet::new();

        for container in containers {
            if self.cancelled.load(Ordering::SeqCst) {
                warn!("collection cancelled, no further containers dispatched");
                break;
            }

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            // Cancellation may arrive while waiting for a permit.
            if self.cancelled.load(Ordering::SeqCst) {
                warn!("collection cancelled, no further containers dispatched");
                break;
            }
            let cache = Arc::clone(&self.cache);
            let directory = Arc::clone(&self.directory);

            join_set.spawn(async move {
                let _permit = permit;
                process_container(container, &cache, directory.as_ref()).await
            });
        }

        let mut processed = Vec::with_capacity(join_set.len());
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(container) => processed.push(container),
                Err(e) => error!(error = %e, "container task failed"),
            }
        }

        processed.sort_by(|a, b| a.distinguished_name().cmp(b.distinguished_name()));
        processed
    }
}
