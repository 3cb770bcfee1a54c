use std::collections::HashSet;

use tracing::{info, instrument, warn};

use crate::catalog::query::QueryOptions;
use crate::catalog::traits::CatalogService;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::sync::extractor::PagedExtractor;
use crate::sync::items::ItemReconciler;
use crate::sync::nexus::NexusReconciler;
use crate::sync::report::SyncReport;

/// Runs one reconciliation from the source environment into the target.
///
/// Phases run strictly in order: nexus extraction and reconciliation, then
/// item extraction and reconciliation. An extraction failure aborts the run;
/// per-record failures are collected in the report.
pub struct ReconciliationDriver<'a> {
    config: &'a SyncConfig,
    source: &'a dyn CatalogService,
    target: &'a dyn CatalogService,
}

impl<'a> ReconciliationDriver<'a> {
    pub fn new(
        config: &'a SyncConfig,
        source: &'a dyn CatalogService,
        target: &'a dyn CatalogService,
    ) -> Self {
        Self {
            config,
            source,
            target,
        }
    }

    #[instrument(skip(self), fields(
        source_company = self.config.source.company_id,
        target_company = self.config.target.company_id,
        dry_run = self.config.dry_run
    ))]
    pub async fn run(&self) -> SyncResult<SyncReport> {
        let mut report = SyncReport::start(self.config.dry_run);
        let extractor = PagedExtractor::new(self.config.page_size);
        info!("Starting catalog sync run {}", report.run_id);

        if self.config.sync_nexus {
            let nexus = extractor
                .extract_nexus(
                    self.source,
                    self.config.source.company_id,
                    &self.config.nexus_filter(),
                )
                .await?;

            let outcome = NexusReconciler::new(
                self.target,
                self.config.target.company_id,
                self.config.nexus_filter(),
                extractor,
            )
            .dry_run(self.config.dry_run)
            .reconcile(&nexus)
            .await?;
            report.nexus = Some(outcome);
        }

        if self.config.sync_items {
            let systems = self.load_classification_systems().await;
            report.classification_systems = systems.as_ref().map_or(0, HashSet::len);

            let items = extractor
                .extract_items(self.source, self.config.source.company_id)
                .await?;

            let mut reconciler = ItemReconciler::new(self.target, self.config.target.company_id)
                .dry_run(self.config.dry_run);
            if let Some(systems) = systems.as_ref() {
                reconciler = reconciler.with_known_systems(systems);
            }
            report.items = Some(reconciler.reconcile(&items).await);
        }

        let report = report.finish();
        info!(
            "Catalog sync run {} finished: {} write(s), {} failure(s)",
            report.run_id,
            report.writes(),
            report.failures().count()
        );
        Ok(report)
    }

    /// Reference data only; a failure here disables the lookup, not the run
    async fn load_classification_systems(&self) -> Option<HashSet<String>> {
        match self
            .source
            .list_classification_systems(&QueryOptions::default())
            .await
        {
            Ok(result) => {
                info!("Loaded {} classification systems", result.value.len());
                Some(result.value.into_iter().map(|s| s.system_code).collect())
            }
            Err(e) => {
                warn!("Could not load classification systems: {}", e);
                None
            }
        }
    }
}
