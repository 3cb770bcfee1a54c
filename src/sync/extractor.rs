use std::future::Future;

use tracing::{debug, info, instrument, warn};

use crate::catalog::models::{FetchResult, ItemModel, NexusModel};
use crate::catalog::query::{Filter, QueryOptions};
use crate::catalog::traits::CatalogService;
use crate::error::{CatalogError, CatalogResult, SyncError, SyncResult};

const ITEM_INCLUDE: &str = "classifications, parameters";

/// Pulls a complete record set out of a paginated collection.
///
/// A count probe learns the total `N`, then `ceil(N / page_size)` pages are
/// read at offsets `0, P, 2P, ...` and concatenated in the order the store
/// returns them. Any failure aborts the extraction; a partial set is never
/// returned.
#[derive(Debug, Clone, Copy)]
pub struct PagedExtractor {
    page_size: u32,
}

impl PagedExtractor {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// Number of page queries needed for `total` records
    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(self.page_size as u64)
    }

    pub async fn extract_all<T, F, Fut>(
        &self,
        collection: &'static str,
        query: &QueryOptions,
        mut fetch: F,
    ) -> SyncResult<Vec<T>>
    where
        F: FnMut(QueryOptions) -> Fut,
        Fut: Future<Output = CatalogResult<FetchResult<T>>>,
    {
        let abort = |source: CatalogError| SyncError::Extraction { collection, source };

        let probe = fetch(count_probe(query)).await.map_err(abort)?;
        let total = probe.count.ok_or_else(|| {
            abort(CatalogError::Decode(format!(
                "{} response carried no record count",
                collection
            )))
        })?;

        let pages = self.page_count(total);
        info!("Extracting {} {} in {} page(s)", total, collection, pages);

        let mut records = Vec::new();
        for page in 0..pages {
            let skip = (page * self.page_size as u64) as u32;
            let result = fetch(query.page(self.page_size, skip)).await.map_err(abort)?;
            debug!(
                "Read {} {} at offset {}",
                result.value.len(),
                collection,
                skip
            );
            records.extend(result.value);
        }

        if records.len() as u64 != total {
            warn!(
                "Extracted {} {} but the service reported {}; the collection changed during extraction",
                records.len(),
                collection,
                total
            );
        }

        Ok(records)
    }

    /// All nexus of a company within one tax-type group filter
    #[instrument(skip(self, service), fields(environment = service.name()))]
    pub async fn extract_nexus(
        &self,
        service: &dyn CatalogService,
        company_id: i64,
        filter: &str,
    ) -> SyncResult<Vec<NexusModel>> {
        let query = QueryOptions::filtered(filter);
        self.extract_all("nexus", &query, move |page| async move {
            service.query_nexus(company_id, &page).await
        })
        .await
    }

    /// All items of a company with their classifications and parameters
    #[instrument(skip(self, service), fields(environment = service.name()))]
    pub async fn extract_items(
        &self,
        service: &dyn CatalogService,
        company_id: i64,
    ) -> SyncResult<Vec<ItemModel>> {
        let query = QueryOptions::filtered(Filter::new().eq_raw("companyId", company_id).to_string())
            .with_include(ITEM_INCLUDE);
        self.extract_all("items", &query, move |page| async move {
            service.query_items(&page).await
        })
        .await
    }
}

impl Default for PagedExtractor {
    fn default() -> Self {
        Self::new(crate::config::MAX_PAGE_SIZE)
    }
}

/// Smallest query that still reports the total count
fn count_probe(query: &QueryOptions) -> QueryOptions {
    let mut probe = query.clone();
    probe.top = Some(1);
    probe.skip = None;
    probe
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::{CatalogCall, InMemoryCatalog};
    use std::collections::HashSet;

    async fn seeded(count: usize) -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new("source");
        for i in 0..count {
            let mut item = ItemModel::new(format!("ITEM-{:05}", i));
            item.company_id = 111;
            catalog.insert_item(item).await;
        }
        catalog
    }

    async fn page_queries(catalog: &InMemoryCatalog) -> Vec<QueryOptions> {
        catalog
            .calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                CatalogCall::QueryItems { options } if options.skip.is_some() => Some(options),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_pagination_is_complete_for_boundary_sizes() {
        let page_size = 4u32;
        let extractor = PagedExtractor::new(page_size);
        let p = page_size as usize;

        for n in [0, 1, p - 1, p, p + 1, 2 * p] {
            let catalog = seeded(n).await;
            let items = extractor.extract_items(&catalog, 111).await.unwrap();

            assert_eq!(items.len(), n, "record count for N={}", n);
            let codes: HashSet<_> = items.iter().map(|i| i.item_code.clone()).collect();
            assert_eq!(codes.len(), n, "duplicates for N={}", n);

            let pages = page_queries(&catalog).await;
            assert_eq!(pages.len(), n.div_ceil(p), "page queries for N={}", n);
            for (index, page) in pages.iter().enumerate() {
                assert_eq!(page.skip, Some(index as u32 * page_size));
                assert_eq!(page.top, Some(page_size));
            }
        }
    }

    #[tokio::test]
    async fn test_preserves_store_order() {
        let catalog = InMemoryCatalog::new("source");
        for code in ["Z", "M", "A"] {
            let mut item = ItemModel::new(code);
            item.company_id = 111;
            catalog.insert_item(item).await;
        }

        let items = PagedExtractor::new(2)
            .extract_items(&catalog, 111)
            .await
            .unwrap();
        let codes: Vec<_> = items.iter().map(|i| i.item_code.as_str()).collect();
        assert_eq!(codes, vec!["Z", "M", "A"]);
    }

    #[tokio::test]
    async fn test_page_failure_aborts_extraction() {
        let catalog = seeded(10).await;
        catalog.fail_item_page(4).await;

        let result = PagedExtractor::new(4).extract_items(&catalog, 111).await;
        match result {
            Err(SyncError::Extraction { collection, source }) => {
                assert_eq!(collection, "items");
                assert!(!source.is_domain());
            }
            other => panic!("expected extraction error, got {:?}", other.map(|i| i.len())),
        }
    }

    #[tokio::test]
    async fn test_missing_count_aborts_extraction() {
        let extractor = PagedExtractor::new(10);
        let result: SyncResult<Vec<i32>> = extractor
            .extract_all("numbers", &QueryOptions::default(), |_| async {
                Ok(FetchResult::new(vec![1, 2, 3], None))
            })
            .await;
        assert!(matches!(result, Err(SyncError::Extraction { .. })));
    }

    #[tokio::test]
    async fn test_absurd_count_fails_on_page_error() {
        let extractor = PagedExtractor::new(1000);
        let mut calls = 0;
        let result: SyncResult<Vec<i32>> = extractor
            .extract_all("numbers", &QueryOptions::default(), |_| {
                calls += 1;
                let call = calls;
                async move {
                    match call {
                        1 => Ok(FetchResult::new(vec![1], Some(u64::MAX / 2))),
                        2 => Ok(FetchResult::new(vec![1, 2], Some(u64::MAX / 2))),
                        _ => Err(CatalogError::Transport("connection reset".to_string())),
                    }
                }
            })
            .await;

        assert!(matches!(result, Err(SyncError::Extraction { collection: "numbers", .. })));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_items_query_includes_classifications() {
        let catalog = seeded(1).await;
        PagedExtractor::new(10)
            .extract_items(&catalog, 111)
            .await
            .unwrap();

        let pages = page_queries(&catalog).await;
        assert_eq!(pages[0].filter.as_deref(), Some("companyId EQ 111"));
        assert_eq!(pages[0].include.as_deref(), Some(ITEM_INCLUDE));
    }
}
