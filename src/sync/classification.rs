use std::collections::HashSet;

use tracing::{debug, info};

use crate::catalog::models::{ItemClassificationInput, ItemClassificationModel};
use crate::catalog::traits::CatalogService;
use crate::error::{SyncError, SyncResult};

/// What the merger decided for one source classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision<'a> {
    /// No classification under this system yet
    Create,
    /// The system is classified with another code; overwrite that record
    Update(&'a ItemClassificationModel),
    /// Same system and code already present
    NoOp,
}

/// What was done for one source classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    Created,
    Updated,
    NoOp,
}

/// Compare one source classification against the target item's set.
///
/// Only the first target classification under a system code is a candidate
/// for update; later duplicates under the same system are never inspected.
pub fn decide<'a>(
    existing: &'a [ItemClassificationModel],
    source: &ItemClassificationModel,
) -> MergeDecision<'a> {
    let same_system = existing
        .iter()
        .find(|c| c.system_code == source.system_code);
    let exact = existing
        .iter()
        .any(|c| c.system_code == source.system_code && c.product_code == source.product_code);

    match (same_system, exact) {
        (None, _) => MergeDecision::Create,
        (Some(_), true) => MergeDecision::NoOp,
        (Some(current), false) => MergeDecision::Update(current),
    }
}

/// First classification per system code, in source order
pub fn first_per_system(classifications: &[ItemClassificationModel]) -> Vec<&ItemClassificationModel> {
    let mut seen = HashSet::new();
    classifications
        .iter()
        .filter(|c| {
            let first = seen.insert(c.system_code.as_str());
            if !first {
                debug!(
                    "Ignoring additional {} classification {}",
                    c.system_code, c.product_code
                );
            }
            first
        })
        .collect()
}

/// Applies merge decisions to one target company
pub struct ClassificationMerger<'a> {
    target: &'a dyn CatalogService,
    company_id: i64,
    dry_run: bool,
}

impl<'a> ClassificationMerger<'a> {
    pub fn new(target: &'a dyn CatalogService, company_id: i64, dry_run: bool) -> Self {
        Self {
            target,
            company_id,
            dry_run,
        }
    }

    /// Create, update or leave one classification of a target item.
    /// Create and update each issue exactly one call; errors propagate.
    pub async fn merge_one(
        &self,
        target_item_id: i64,
        existing: &[ItemClassificationModel],
        source: &ItemClassificationModel,
    ) -> SyncResult<MergeAction> {
        let input = ItemClassificationInput::from(source);

        match decide(existing, source) {
            MergeDecision::NoOp => {
                debug!(
                    "Item {} already has {} {}",
                    target_item_id, source.system_code, source.product_code
                );
                Ok(MergeAction::NoOp)
            }
            MergeDecision::Create => {
                if self.dry_run {
                    info!(
                        "[dry run] would add {} {} to item {}",
                        source.system_code, source.product_code, target_item_id
                    );
                } else {
                    self.target
                        .create_item_classifications(self.company_id, target_item_id, vec![input])
                        .await?;
                    info!(
                        "Added {} {} to item {}",
                        source.system_code, source.product_code, target_item_id
                    );
                }
                Ok(MergeAction::Created)
            }
            MergeDecision::Update(current) => {
                let classification_id = current.id.ok_or_else(|| {
                    SyncError::MissingIdentifier(format!(
                        "{} classification of item {}",
                        current.system_code, target_item_id
                    ))
                })?;

                if self.dry_run {
                    info!(
                        "[dry run] would change {} on item {} from {} to {}",
                        source.system_code, target_item_id, current.product_code, source.product_code
                    );
                } else {
                    self.target
                        .update_item_classification(
                            self.company_id,
                            target_item_id,
                            classification_id,
                            &input,
                        )
                        .await?;
                    info!(
                        "Changed {} on item {} from {} to {}",
                        source.system_code, target_item_id, current.product_code, source.product_code
                    );
                }
                Ok(MergeAction::Updated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::{CatalogCall, InMemoryCatalog};
    use crate::catalog::models::ItemModel;

    fn classification(id: i64, system: &str, product: &str) -> ItemClassificationModel {
        ItemClassificationModel {
            id: Some(id),
            item_id: Some(1),
            system_code: system.to_string(),
            product_code: product.to_string(),
        }
    }

    #[test]
    fn test_decide_create_when_system_missing() {
        let existing = vec![classification(1, "TARIC", "9999")];
        let source = ItemClassificationModel::new("HS", "1111");
        assert_eq!(decide(&existing, &source), MergeDecision::Create);
        assert_eq!(decide(&[], &source), MergeDecision::Create);
    }

    #[test]
    fn test_decide_noop_when_code_matches() {
        let existing = vec![classification(1, "HS", "1111")];
        let source = ItemClassificationModel::new("HS", "1111");
        assert_eq!(decide(&existing, &source), MergeDecision::NoOp);
    }

    #[test]
    fn test_decide_update_targets_first_in_system() {
        let existing = vec![
            classification(1, "TARIC", "9999"),
            classification(2, "HS", "2222"),
            classification(3, "HS", "3333"),
        ];
        let source = ItemClassificationModel::new("HS", "1111");
        match decide(&existing, &source) {
            MergeDecision::Update(current) => assert_eq!(current.id, Some(2)),
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_decide_noop_when_later_duplicate_matches() {
        let existing = vec![
            classification(2, "HS", "2222"),
            classification(3, "HS", "1111"),
        ];
        let source = ItemClassificationModel::new("HS", "1111");
        assert_eq!(decide(&existing, &source), MergeDecision::NoOp);
    }

    #[test]
    fn test_first_per_system() {
        let source = vec![
            ItemClassificationModel::new("HS", "1111"),
            ItemClassificationModel::new("TARIC", "5555"),
            ItemClassificationModel::new("HS", "2222"),
        ];
        let kept: Vec<_> = first_per_system(&source)
            .into_iter()
            .map(|c| c.product_code.as_str())
            .collect();
        assert_eq!(kept, vec!["1111", "5555"]);
    }

    async fn target_item(classifications: &[(&str, &str)]) -> (InMemoryCatalog, ItemModel) {
        let catalog = InMemoryCatalog::new("target");
        let mut item = ItemModel::new("A1");
        item.company_id = 222;
        for (system, product) in classifications {
            item = item.with_classification(*system, *product);
        }
        let item = catalog.insert_item(item).await;
        (catalog, item)
    }

    #[tokio::test]
    async fn test_merge_one_applies_table() {
        let cases: Vec<(Vec<(&str, &str)>, MergeAction, usize)> = vec![
            (vec![], MergeAction::Created, 1),
            (vec![("HS", "1111")], MergeAction::NoOp, 0),
            (vec![("HS", "2222")], MergeAction::Updated, 1),
        ];

        for (existing, expected, writes) in cases {
            let (catalog, item) = target_item(&existing).await;
            let current = item.classifications.clone().unwrap_or_default();
            let merger = ClassificationMerger::new(&catalog, 222, false);

            let action = merger
                .merge_one(item.id, &current, &ItemClassificationModel::new("HS", "1111"))
                .await
                .unwrap();
            assert_eq!(action, expected);
            assert_eq!(catalog.write_calls().await.len(), writes);

            let stored = catalog.items().await.remove(0).classifications.unwrap();
            assert_eq!(stored.len(), 1);
            assert_eq!(stored[0].system_code, "HS");
            assert_eq!(stored[0].product_code, "1111");
        }
    }

    #[tokio::test]
    async fn test_update_uses_existing_classification_id() {
        let (catalog, item) = target_item(&[("HS", "2222")]).await;
        let current = item.classifications.clone().unwrap();
        let existing_id = current[0].id.unwrap();

        ClassificationMerger::new(&catalog, 222, false)
            .merge_one(item.id, &current, &ItemClassificationModel::new("HS", "1111"))
            .await
            .unwrap();

        let writes = catalog.write_calls().await;
        assert_eq!(
            writes,
            vec![CatalogCall::UpdateClassification {
                company_id: 222,
                item_id: item.id,
                classification_id: existing_id,
                classification: ItemClassificationInput {
                    product_code: "1111".to_string(),
                    system_code: "HS".to_string(),
                },
            }]
        );
    }

    #[tokio::test]
    async fn test_dry_run_issues_no_calls() {
        let (catalog, item) = target_item(&[("HS", "2222")]).await;
        let current = item.classifications.clone().unwrap();
        let merger = ClassificationMerger::new(&catalog, 222, true);

        let updated = merger
            .merge_one(item.id, &current, &ItemClassificationModel::new("HS", "1111"))
            .await
            .unwrap();
        let created = merger
            .merge_one(item.id, &current, &ItemClassificationModel::new("TARIC", "5555"))
            .await
            .unwrap();

        assert_eq!(updated, MergeAction::Updated);
        assert_eq!(created, MergeAction::Created);
        assert!(catalog.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_without_id_fails() {
        let catalog = InMemoryCatalog::new("target");
        let existing = vec![ItemClassificationModel::new("HS", "2222")];

        let result = ClassificationMerger::new(&catalog, 222, false)
            .merge_one(7, &existing, &ItemClassificationModel::new("HS", "1111"))
            .await;
        assert!(matches!(result, Err(SyncError::MissingIdentifier(_))));
        assert!(catalog.calls().await.is_empty());
    }
}
