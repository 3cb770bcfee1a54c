use std::collections::HashSet;

use tracing::{debug, info, instrument};

use crate::catalog::models::NexusModel;
use crate::catalog::traits::CatalogService;
use crate::error::{SyncError, SyncResult};
use crate::sync::extractor::PagedExtractor;
use crate::sync::report::{FailedRecord, NexusOutcome, RecordKind};

/// Creates source nexus missing from the target company.
///
/// A nexus counts as present when any target nexus in the same tax-type
/// group has the same country. Existing target nexus are never modified.
pub struct NexusReconciler<'a> {
    target: &'a dyn CatalogService,
    target_company_id: i64,
    filter: String,
    extractor: PagedExtractor,
    dry_run: bool,
}

impl<'a> NexusReconciler<'a> {
    pub fn new(
        target: &'a dyn CatalogService,
        target_company_id: i64,
        filter: impl Into<String>,
        extractor: PagedExtractor,
    ) -> Self {
        Self {
            target,
            target_company_id,
            filter: filter.into(),
            extractor,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Fails only when the current target set cannot be read; per-record
    /// create failures are collected in the outcome.
    #[instrument(skip(self, source_nexus), fields(count = source_nexus.len()))]
    pub async fn reconcile(&self, source_nexus: &[NexusModel]) -> SyncResult<NexusOutcome> {
        let mut outcome = NexusOutcome::default();
        if source_nexus.is_empty() {
            info!("No source nexus to reconcile");
            return Ok(outcome);
        }

        let existing = self
            .extractor
            .extract_nexus(self.target, self.target_company_id, &self.filter)
            .await?;
        let mut countries: HashSet<String> = existing.into_iter().map(|n| n.country).collect();

        for nexus in source_nexus {
            if countries.contains(&nexus.country) {
                debug!("Nexus {} already present in target", nexus.country);
                outcome.skipped += 1;
                continue;
            }

            let candidate = nexus.for_company(self.target_company_id);
            if self.dry_run {
                info!("[dry run] would create nexus {}", nexus.country);
            } else if let Err(e) = self
                .target
                .create_nexus(self.target_company_id, vec![candidate])
                .await
            {
                let err = SyncError::from(e);
                let failure = FailedRecord::new(RecordKind::Nexus, &nexus.country, nexus.id, &err);
                failure.log();
                outcome.failed.push(failure);
                continue;
            } else {
                info!("Created nexus {}", nexus.country);
            }

            countries.insert(nexus.country.clone());
            outcome.created += 1;
        }

        info!(
            "Nexus reconciled: {} created, {} skipped, {} failed",
            outcome.created,
            outcome.skipped,
            outcome.failed.len()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::{CatalogCall, InMemoryCatalog};

    const FILTER: &str = "nexusTaxTypeGroup EQ LandedCost";

    fn nexus(id: i64, company_id: i64, country: &str) -> NexusModel {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "companyId": company_id,
            "country": country,
            "nexusTaxTypeGroup": "LandedCost",
            "jurisTypeId": "CNT"
        }))
        .unwrap()
    }

    async fn target_with(countries: &[&str]) -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new("target");
        for (i, country) in countries.iter().enumerate() {
            catalog.insert_nexus(nexus(500 + i as i64, 222, country)).await;
        }
        catalog
    }

    fn created(calls: &[CatalogCall]) -> Vec<NexusModel> {
        calls
            .iter()
            .filter_map(|call| match call {
                CatalogCall::CreateNexus { nexus, .. } => Some(nexus.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[tokio::test]
    async fn test_existing_country_is_skipped() {
        let target = target_with(&["CA"]).await;
        let reconciler = NexusReconciler::new(&target, 222, FILTER, PagedExtractor::new(100));

        let outcome = reconciler.reconcile(&[nexus(1, 111, "CA")]).await.unwrap();

        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.skipped, 1);
        assert!(target.write_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_country_is_created_for_target_company() {
        let target = target_with(&["US"]).await;
        let reconciler = NexusReconciler::new(&target, 222, FILTER, PagedExtractor::new(100));

        let outcome = reconciler.reconcile(&[nexus(1, 111, "CA")]).await.unwrap();

        assert_eq!(outcome.created, 1);
        let writes = target.write_calls().await;
        assert_eq!(writes.len(), 1);
        let sent = created(&writes);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].country, "CA");
        assert_eq!(sent[0].company_id, 222);
        assert_eq!(sent[0].extra.get("jurisTypeId"), Some(&serde_json::json!("CNT")));
    }

    #[tokio::test]
    async fn test_only_absent_countries_are_created() {
        let target = target_with(&["US", "GB"]).await;
        let reconciler = NexusReconciler::new(&target, 222, FILTER, PagedExtractor::new(1));
        let source = vec![
            nexus(1, 111, "US"),
            nexus(2, 111, "CA"),
            nexus(3, 111, "GB"),
            nexus(4, 111, "MX"),
        ];

        let outcome = reconciler.reconcile(&source).await.unwrap();

        assert_eq!(outcome.created, 2);
        assert_eq!(outcome.skipped, 2);
        let countries: Vec<_> = created(&target.write_calls().await)
            .into_iter()
            .map(|n| n.country)
            .collect();
        assert_eq!(countries, vec!["CA", "MX"]);
    }

    #[tokio::test]
    async fn test_empty_source_is_noop() {
        let target = target_with(&["US"]).await;
        let reconciler = NexusReconciler::new(&target, 222, FILTER, PagedExtractor::new(100));

        let outcome = reconciler.reconcile(&[]).await.unwrap();

        assert_eq!(outcome.created + outcome.skipped, 0);
        assert!(target.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_nexus_does_not_stop_batch() {
        let target = target_with(&[]).await;
        target.reject_country("CA").await;
        let reconciler = NexusReconciler::new(&target, 222, FILTER, PagedExtractor::new(100));

        let outcome = reconciler
            .reconcile(&[nexus(1, 111, "CA"), nexus(2, 111, "MX")])
            .await
            .unwrap();

        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].key, "CA");
        assert_eq!(outcome.failed[0].source_id, 1);
        assert!(outcome.failed[0].domain);
        let countries: Vec<_> = target.nexus().await.into_iter().map(|n| n.country).collect();
        assert_eq!(countries, vec!["MX"]);
    }

    #[tokio::test]
    async fn test_repeated_source_country_is_created_once() {
        let target = target_with(&[]).await;
        let reconciler = NexusReconciler::new(&target, 222, FILTER, PagedExtractor::new(100));

        let outcome = reconciler
            .reconcile(&[nexus(1, 111, "CA"), nexus(2, 111, "CA")])
            .await
            .unwrap();

        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn test_dry_run_issues_no_creates() {
        let target = target_with(&["US"]).await;
        let reconciler =
            NexusReconciler::new(&target, 222, FILTER, PagedExtractor::new(100)).dry_run(true);

        let outcome = reconciler.reconcile(&[nexus(1, 111, "CA")]).await.unwrap();

        assert_eq!(outcome.created, 1);
        assert!(target.write_calls().await.is_empty());
    }
}
