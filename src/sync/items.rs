use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};

use crate::catalog::models::ItemModel;
use crate::catalog::query::{Filter, QueryOptions};
use crate::catalog::traits::CatalogService;
use crate::error::SyncResult;
use crate::sync::classification::{first_per_system, ClassificationMerger, MergeAction};
use crate::sync::report::{FailedRecord, ItemOutcome, RecordKind};

/// Brings target items and their classifications in line with the source.
///
/// Items are matched on `(itemCode, companyId)`. Missing items are created
/// with their classifications embedded; existing items only have their
/// classifications merged. Each item is isolated: any failure is recorded
/// against it and the next item is processed.
pub struct ItemReconciler<'a> {
    target: &'a dyn CatalogService,
    target_company_id: i64,
    known_systems: Option<&'a HashSet<String>>,
    dry_run: bool,
}

impl<'a> ItemReconciler<'a> {
    pub fn new(target: &'a dyn CatalogService, target_company_id: i64) -> Self {
        Self {
            target,
            target_company_id,
            known_systems: None,
            dry_run: false,
        }
    }

    /// System codes loaded from the source, used to flag unknown systems
    pub fn with_known_systems(mut self, systems: &'a HashSet<String>) -> Self {
        self.known_systems = Some(systems);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[instrument(skip(self, source_items), fields(count = source_items.len()))]
    pub async fn reconcile(&self, source_items: &[ItemModel]) -> ItemOutcome {
        let mut outcome = ItemOutcome::default();
        let mut warned_systems = HashSet::new();

        for item in source_items {
            self.flag_unknown_systems(item, &mut warned_systems);

            if let Err(e) = self.reconcile_one(item, &mut outcome).await {
                let failure = FailedRecord::new(RecordKind::Item, &item.item_code, item.id, &e);
                failure.log();
                outcome.failed.push(failure);
            }
        }

        info!(
            "Items reconciled: {} created, {} matched, {} classifications applied, {} failed",
            outcome.created,
            outcome.matched,
            outcome.classifications_applied(),
            outcome.failed.len()
        );
        outcome
    }

    async fn reconcile_one(&self, item: &ItemModel, outcome: &mut ItemOutcome) -> SyncResult<()> {
        let existing = match self.find_existing(&item.item_code).await? {
            Some(existing) => existing,
            None => {
                self.create(item).await?;
                outcome.created += 1;
                return Ok(());
            }
        };

        outcome.matched += 1;
        let classifications = match item.classifications.as_deref() {
            Some(classifications) if !classifications.is_empty() => classifications,
            _ => return Ok(()),
        };

        let current = self
            .target
            .list_item_classifications(self.target_company_id, existing.id, &QueryOptions::default())
            .await?
            .value;

        let merger = ClassificationMerger::new(self.target, self.target_company_id, self.dry_run);
        for classification in first_per_system(classifications) {
            match merger.merge_one(existing.id, &current, classification).await? {
                MergeAction::Created => outcome.classifications_created += 1,
                MergeAction::Updated => outcome.classifications_updated += 1,
                MergeAction::NoOp => outcome.classifications_unchanged += 1,
            }
        }
        Ok(())
    }

    /// First target item with this code in the target company
    async fn find_existing(&self, item_code: &str) -> SyncResult<Option<ItemModel>> {
        let filter = Filter::new()
            .eq_str("itemCode", item_code)
            .eq_raw("companyId", self.target_company_id);
        let result = self
            .target
            .query_items(&QueryOptions::filtered(filter.to_string()))
            .await?;
        Ok(result.value.into_iter().next())
    }

    async fn create(&self, item: &ItemModel) -> SyncResult<()> {
        let candidate = item.for_company(self.target_company_id);
        let classification_count = candidate.classifications.as_ref().map_or(0, Vec::len);

        if self.dry_run {
            info!(
                "[dry run] would create item {} with {} classification(s)",
                item.item_code, classification_count
            );
            return Ok(());
        }

        self.target
            .create_items(self.target_company_id, vec![candidate])
            .await?;
        info!(
            "Created item {} with {} classification(s)",
            item.item_code, classification_count
        );
        Ok(())
    }

    fn flag_unknown_systems(&self, item: &ItemModel, warned: &mut HashSet<String>) {
        let known = match self.known_systems {
            Some(known) => known,
            None => return,
        };
        for classification in item.classifications.iter().flatten() {
            if known.contains(&classification.system_code) {
                continue;
            }
            if warned.insert(classification.system_code.clone()) {
                warn!(
                    "Classification system {} on item {} is not known to the source",
                    classification.system_code, item.item_code
                );
            } else {
                debug!(
                    "Unknown classification system {} on item {}",
                    classification.system_code, item.item_code
                );
            }
        }
    }
}
