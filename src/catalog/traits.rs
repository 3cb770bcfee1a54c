use async_trait::async_trait;

use crate::catalog::models::{
    ClassificationSystem, FetchResult, ItemClassificationInput, ItemClassificationModel,
    ItemModel, NexusModel,
};
use crate::catalog::query::QueryOptions;
use crate::error::CatalogResult;

/// Paginated catalog service holding nexus, items and classifications.
///
/// Every call returns a tagged result: the value, a service rejection
/// (`CatalogError::Service`) or an unclassified failure. Implementations
/// must not retry.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Label used in log lines (e.g. "source", "target")
    fn name(&self) -> &str;

    async fn query_nexus(
        &self,
        company_id: i64,
        options: &QueryOptions,
    ) -> CatalogResult<FetchResult<NexusModel>>;

    async fn create_nexus(
        &self,
        company_id: i64,
        nexus: Vec<NexusModel>,
    ) -> CatalogResult<Vec<NexusModel>>;

    /// `count` on the result covers all matches regardless of `$top`/`$skip`
    async fn query_items(&self, options: &QueryOptions) -> CatalogResult<FetchResult<ItemModel>>;

    async fn create_items(
        &self,
        company_id: i64,
        items: Vec<ItemModel>,
    ) -> CatalogResult<Vec<ItemModel>>;

    async fn list_item_classifications(
        &self,
        company_id: i64,
        item_id: i64,
        options: &QueryOptions,
    ) -> CatalogResult<FetchResult<ItemClassificationModel>>;

    async fn create_item_classifications(
        &self,
        company_id: i64,
        item_id: i64,
        classifications: Vec<ItemClassificationInput>,
    ) -> CatalogResult<Vec<ItemClassificationModel>>;

    async fn update_item_classification(
        &self,
        company_id: i64,
        item_id: i64,
        classification_id: i64,
        classification: &ItemClassificationInput,
    ) -> CatalogResult<ItemClassificationModel>;

    async fn list_classification_systems(
        &self,
        options: &QueryOptions,
    ) -> CatalogResult<FetchResult<ClassificationSystem>>;
}
