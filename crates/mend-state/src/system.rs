//! SystemState is the shared handle owned by the loop controller.
//!
//! Cloning is cheap (`Arc` inside). Agents receive a clone at
//! construction; the controller keeps its own for the guard and the
//! summary counters.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use mend_core::{Endpoint, FixReport};

use crate::error::StateResult;
use crate::store::ReportStore;

/// Point-in-time copy of the aggregate counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub total_checks: u64,
    pub successful_fixes: u64,
    pub failed_fixes: u64,
    pub total_reports: u64,
}

struct Inner {
    iteration_running: AtomicBool,
    total_checks: AtomicU64,
    successful_fixes: AtomicU64,
    failed_fixes: AtomicU64,
    /// Latest snapshot published by each endpoint's agent.
    endpoints: RwLock<BTreeMap<String, Endpoint>>,
    reports: ReportStore,
}

#[derive(Clone)]
pub struct SystemState {
    inner: Arc<Inner>,
}

impl SystemState {
    /// Wrap a report store. Fix counters are re-derived from the stored log.
    pub fn new(reports: ReportStore) -> StateResult<Self> {
        let existing = reports.list()?;
        let successful = existing.iter().filter(|r| r.overall_success).count() as u64;
        let failed = existing.len() as u64 - successful;
        if !existing.is_empty() {
            info!(
                reports = existing.len(),
                successful, failed, "restored fix counters from report log"
            );
        }

        Ok(Self {
            inner: Arc::new(Inner {
                iteration_running: AtomicBool::new(false),
                total_checks: AtomicU64::new(0),
                successful_fixes: AtomicU64::new(successful),
                failed_fixes: AtomicU64::new(failed),
                endpoints: RwLock::new(BTreeMap::new()),
                reports,
            }),
        })
    }

    /// State with an ephemeral report log.
    pub fn in_memory() -> StateResult<Self> {
        Self::new(ReportStore::open_in_memory()?)
    }

    // ── Single-flight guard ────────────────────────────────────────

    /// Claim the iteration slot. Returns `None` if an iteration is already
    /// running; the slot is released when the guard drops.
    pub fn try_begin_iteration(&self) -> Option<IterationGuard> {
        self.inner
            .iteration_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| IterationGuard {
                inner: Arc::clone(&self.inner),
            })
    }

    pub fn is_iteration_running(&self) -> bool {
        self.inner.iteration_running.load(Ordering::Acquire)
    }

    // ── Counters ───────────────────────────────────────────────────

    /// Count one main iteration. Returns the new total.
    pub fn record_iteration(&self) -> u64 {
        self.inner.total_checks.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Append a completed cycle's report and bump the matching counter.
    pub fn record_report(&self, report: &FixReport) -> StateResult<()> {
        self.inner.reports.append(report)?;
        if report.overall_success {
            self.inner.successful_fixes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.failed_fixes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn counters(&self) -> Counters {
        Counters {
            total_checks: self.inner.total_checks.load(Ordering::Relaxed),
            successful_fixes: self.inner.successful_fixes.load(Ordering::Relaxed),
            failed_fixes: self.inner.failed_fixes.load(Ordering::Relaxed),
            total_reports: self.inner.reports.len(),
        }
    }

    pub fn reports(&self) -> StateResult<Vec<FixReport>> {
        self.inner.reports.list()
    }

    pub fn report_store(&self) -> &ReportStore {
        &self.inner.reports
    }

    // ── Endpoint snapshots ─────────────────────────────────────────

    /// Replace the stored snapshot for an endpoint.
    pub async fn publish_endpoint(&self, endpoint: &Endpoint) {
        let mut endpoints = self.inner.endpoints.write().await;
        endpoints.insert(endpoint.id.clone(), endpoint.clone());
        debug!(endpoint = %endpoint.id, healthy = endpoint.healthy, "endpoint snapshot published");
    }

    pub async fn endpoint(&self, id: &str) -> Option<Endpoint> {
        self.inner.endpoints.read().await.get(id).cloned()
    }

    pub async fn endpoints(&self) -> Vec<Endpoint> {
        self.inner.endpoints.read().await.values().cloned().collect()
    }
}

/// Held while a main iteration runs. Dropping it releases the slot.
pub struct IterationGuard {
    inner: Arc<Inner>,
}

impl Drop for IterationGuard {
    fn drop(&mut self) {
        self.inner.iteration_running.store(false, Ordering::Release);
    }
}
