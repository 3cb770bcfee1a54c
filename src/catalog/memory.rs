//! In-memory catalog environment.
//!
//! Keeps records in insertion order, answers the same filter syntax the
//! remote service accepts (equality clauses joined by `AND`), and logs every
//! call so a run can be inspected afterwards. Rejections can be injected per
//! item code or nexus country, transport failures per item lookup or page.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tokio::sync::RwLock;

use crate::catalog::models::{
    ClassificationSystem, FetchResult, ItemClassificationInput, ItemClassificationModel,
    ItemModel, NexusModel,
};
use crate::catalog::query::{Filter, QueryOptions};
use crate::catalog::traits::CatalogService;
use crate::error::{CatalogError, CatalogResult, ServiceErrorDetail};

/// A call received by the in-memory catalog
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogCall {
    QueryNexus { company_id: i64, options: QueryOptions },
    CreateNexus { company_id: i64, nexus: Vec<NexusModel> },
    QueryItems { options: QueryOptions },
    CreateItems { company_id: i64, items: Vec<ItemModel> },
    ListClassifications { company_id: i64, item_id: i64 },
    CreateClassifications {
        company_id: i64,
        item_id: i64,
        classifications: Vec<ItemClassificationInput>,
    },
    UpdateClassification {
        company_id: i64,
        item_id: i64,
        classification_id: i64,
        classification: ItemClassificationInput,
    },
    ListClassificationSystems,
}

impl CatalogCall {
    /// Whether the call changes catalog contents
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            CatalogCall::CreateNexus { .. }
                | CatalogCall::CreateItems { .. }
                | CatalogCall::CreateClassifications { .. }
                | CatalogCall::UpdateClassification { .. }
        )
    }
}

#[derive(Default)]
struct CatalogState {
    nexus: Vec<NexusModel>,
    items: Vec<ItemModel>,
    systems: Vec<ClassificationSystem>,
    next_id: i64,
    rejected_items: HashSet<String>,
    rejected_countries: HashSet<String>,
    failing_item_skips: HashSet<u32>,
    failing_item_lookups: HashSet<String>,
}

impl CatalogState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

pub struct InMemoryCatalog {
    name: String,
    state: RwLock<CatalogState>,
    calls: RwLock<Vec<CatalogCall>>,
}

impl InMemoryCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(CatalogState {
                next_id: 1000,
                ..CatalogState::default()
            }),
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Seed a nexus record without logging a call
    pub async fn insert_nexus(&self, mut nexus: NexusModel) -> NexusModel {
        let mut state = self.state.write().await;
        if nexus.id == 0 {
            nexus.id = state.next_id();
        }
        state.nexus.push(nexus.clone());
        nexus
    }

    /// Seed an item, assigning ids to it and its classifications
    pub async fn insert_item(&self, item: ItemModel) -> ItemModel {
        let mut state = self.state.write().await;
        let item = Self::store_item(&mut state, item);
        state.items.push(item.clone());
        item
    }

    pub async fn insert_classification_system(&self, system: ClassificationSystem) {
        self.state.write().await.systems.push(system);
    }

    /// Reject every create for this item code with a service error
    pub async fn reject_item(&self, item_code: &str) {
        self.state
            .write()
            .await
            .rejected_items
            .insert(item_code.to_string());
    }

    /// Reject every nexus create for this country with a service error
    pub async fn reject_country(&self, country: &str) {
        self.state
            .write()
            .await
            .rejected_countries
            .insert(country.to_string());
    }

    /// Fail item queries at this offset with a transport error
    pub async fn fail_item_page(&self, skip: u32) {
        self.state.write().await.failing_item_skips.insert(skip);
    }

    /// Fail item queries filtered on this item code with a transport error
    pub async fn fail_item_lookup(&self, item_code: &str) {
        let clause = Filter::new().eq_str("itemCode", item_code).to_string();
        self.state.write().await.failing_item_lookups.insert(clause);
    }

    pub async fn calls(&self) -> Vec<CatalogCall> {
        self.calls.read().await.clone()
    }

    pub async fn write_calls(&self) -> Vec<CatalogCall> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }

    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    pub async fn nexus(&self) -> Vec<NexusModel> {
        self.state.read().await.nexus.clone()
    }

    pub async fn items(&self) -> Vec<ItemModel> {
        self.state.read().await.items.clone()
    }

    async fn record(&self, call: CatalogCall) {
        self.calls.write().await.push(call);
    }

    fn store_item(state: &mut CatalogState, mut item: ItemModel) -> ItemModel {
        if item.id == 0 {
            item.id = state.next_id();
        }
        let item_id = item.id;
        if let Some(classifications) = item.classifications.as_mut() {
            for classification in classifications.iter_mut() {
                classification.id = Some(state.next_id());
                classification.item_id = Some(item_id);
            }
        }
        item
    }

    fn rejected(code: &str, message: String) -> CatalogError {
        CatalogError::Service {
            status: 400,
            detail: ServiceErrorDetail {
                code: Some(code.to_string()),
                message: Some(message),
                target: Some("IncorrectData".to_string()),
                details: Vec::new(),
            },
        }
    }

    /// Classification writes on a rejected item code fail like item creates do
    fn ensure_accepts(state: &CatalogState, company_id: i64, item_id: i64) -> CatalogResult<()> {
        let rejected = state
            .items
            .iter()
            .find(|i| i.id == item_id && i.company_id == company_id)
            .filter(|i| state.rejected_items.contains(&i.item_code));
        match rejected {
            Some(item) => Err(Self::rejected(
                "InvalidItem",
                format!("Classification change for {} was rejected", item.item_code),
            )),
            None => Ok(()),
        }
    }

    fn item_mut(
        state: &mut CatalogState,
        company_id: i64,
        item_id: i64,
    ) -> CatalogResult<&mut ItemModel> {
        state
            .items
            .iter_mut()
            .find(|i| i.id == item_id && i.company_id == company_id)
            .ok_or_else(|| {
                Self::rejected("EntityNotFoundError", format!("Item {} not found", item_id))
            })
    }
}

/// Evaluate an `a EQ b AND c EQ "d"` filter against a record's JSON form
pub fn matches_filter<T: Serialize>(record: &T, filter: Option<&str>) -> bool {
    let filter = match filter.map(str::trim) {
        Some(f) if !f.is_empty() => f,
        _ => return true,
    };
    let json = match serde_json::to_value(record) {
        Ok(json) => json,
        Err(_) => return false,
    };

    filter.split(" AND ").all(|clause| {
        let mut parts = clause.splitn(2, " EQ ");
        let (field, expected) = match (parts.next(), parts.next()) {
            (Some(field), Some(expected)) => (field.trim(), expected.trim()),
            _ => return false,
        };
        let expected = expected
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .map(|v| v.replace("\\\"", "\"").replace("\\\\", "\\"))
            .unwrap_or_else(|| expected.to_string());

        match json.get(field) {
            Some(Value::String(actual)) => *actual == expected,
            Some(Value::Number(actual)) => actual.to_string() == expected,
            Some(Value::Bool(actual)) => actual.to_string() == expected,
            _ => false,
        }
    })
}

fn paginate<T: Clone>(records: Vec<T>, options: &QueryOptions) -> FetchResult<T> {
    let count = records.len() as u64;
    let skip = options.skip.unwrap_or(0) as usize;
    let top = options.top.map(|t| t as usize).unwrap_or(usize::MAX);
    let value = records.into_iter().skip(skip).take(top).collect();
    FetchResult::new(value, Some(count))
}

#[async_trait]
impl CatalogService for InMemoryCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query_nexus(
        &self,
        company_id: i64,
        options: &QueryOptions,
    ) -> CatalogResult<FetchResult<NexusModel>> {
        self.record(CatalogCall::QueryNexus {
            company_id,
            options: options.clone(),
        })
        .await;

        let state = self.state.read().await;
        let matching = state
            .nexus
            .iter()
            .filter(|n| n.company_id == company_id)
            .filter(|n| matches_filter(n, options.filter.as_deref()))
            .cloned()
            .collect();
        Ok(paginate(matching, options))
    }

    async fn create_nexus(
        &self,
        company_id: i64,
        nexus: Vec<NexusModel>,
    ) -> CatalogResult<Vec<NexusModel>> {
        self.record(CatalogCall::CreateNexus {
            company_id,
            nexus: nexus.clone(),
        })
        .await;

        let mut state = self.state.write().await;
        let mut created = Vec::with_capacity(nexus.len());
        for mut record in nexus {
            if state.rejected_countries.contains(&record.country) {
                return Err(Self::rejected(
                    "InvalidNexus",
                    format!("Nexus for {} was rejected", record.country),
                ));
            }
            let duplicate = state.nexus.iter().any(|n| {
                n.company_id == company_id && n.country == record.country && n.region == record.region
            });
            if duplicate {
                return Err(Self::rejected(
                    "DuplicateEntry",
                    format!("Nexus for {} already exists", record.country),
                ));
            }
            record.id = state.next_id();
            record.company_id = company_id;
            state.nexus.push(record.clone());
            created.push(record);
        }
        Ok(created)
    }

    async fn query_items(&self, options: &QueryOptions) -> CatalogResult<FetchResult<ItemModel>> {
        self.record(CatalogCall::QueryItems {
            options: options.clone(),
        })
        .await;

        let state = self.state.read().await;
        if let Some(skip) = options.skip {
            if state.failing_item_skips.contains(&skip) {
                return Err(CatalogError::Transport(format!(
                    "connection reset while reading items at offset {}",
                    skip
                )));
            }
        }

        let filter = options.filter.as_deref().unwrap_or_default();
        if filter
            .split(" AND ")
            .any(|clause| state.failing_item_lookups.contains(clause))
        {
            return Err(CatalogError::Transport(format!(
                "connection reset while querying items with {}",
                filter
            )));
        }

        let include_classifications = options
            .include
            .as_deref()
            .map(|i| i.contains("classifications"))
            .unwrap_or(false);
        let matching = state
            .items
            .iter()
            .filter(|i| matches_filter(i, options.filter.as_deref()))
            .map(|i| {
                let mut item = i.clone();
                if !include_classifications {
                    item.classifications = None;
                }
                item
            })
            .collect();
        Ok(paginate(matching, options))
    }

    async fn create_items(
        &self,
        company_id: i64,
        items: Vec<ItemModel>,
    ) -> CatalogResult<Vec<ItemModel>> {
        self.record(CatalogCall::CreateItems {
            company_id,
            items: items.clone(),
        })
        .await;

        let mut state = self.state.write().await;
        let mut created = Vec::with_capacity(items.len());
        for mut item in items {
            if state.rejected_items.contains(&item.item_code) {
                return Err(Self::rejected(
                    "InvalidItem",
                    format!("Item {} was rejected", item.item_code),
                ));
            }
            let duplicate = state
                .items
                .iter()
                .any(|i| i.company_id == company_id && i.item_code == item.item_code);
            if duplicate {
                return Err(Self::rejected(
                    "DuplicateEntry",
                    format!("Item {} already exists", item.item_code),
                ));
            }
            item.id = 0;
            item.company_id = company_id;
            let item = Self::store_item(&mut state, item);
            state.items.push(item.clone());
            created.push(item);
        }
        Ok(created)
    }

    async fn list_item_classifications(
        &self,
        company_id: i64,
        item_id: i64,
        options: &QueryOptions,
    ) -> CatalogResult<FetchResult<ItemClassificationModel>> {
        self.record(CatalogCall::ListClassifications {
            company_id,
            item_id,
        })
        .await;

        let mut state = self.state.write().await;
        let item = Self::item_mut(&mut state, company_id, item_id)?;
        let value = item
            .classifications
            .clone()
            .unwrap_or_default()
            .into_iter()
            .filter(|c| matches_filter(c, options.filter.as_deref()))
            .collect();
        Ok(FetchResult::new(value, None))
    }

    async fn create_item_classifications(
        &self,
        company_id: i64,
        item_id: i64,
        classifications: Vec<ItemClassificationInput>,
    ) -> CatalogResult<Vec<ItemClassificationModel>> {
        self.record(CatalogCall::CreateClassifications {
            company_id,
            item_id,
            classifications: classifications.clone(),
        })
        .await;

        let mut state = self.state.write().await;
        Self::ensure_accepts(&state, company_id, item_id)?;
        let ids: Vec<i64> = classifications.iter().map(|_| state.next_id()).collect();
        let item = Self::item_mut(&mut state, company_id, item_id)?;
        let created: Vec<ItemClassificationModel> = classifications
            .into_iter()
            .zip(ids)
            .map(|(input, id)| ItemClassificationModel {
                id: Some(id),
                item_id: Some(item_id),
                system_code: input.system_code,
                product_code: input.product_code,
            })
            .collect();
        item.classifications
            .get_or_insert_with(Vec::new)
            .extend(created.iter().cloned());
        Ok(created)
    }

    async fn update_item_classification(
        &self,
        company_id: i64,
        item_id: i64,
        classification_id: i64,
        classification: &ItemClassificationInput,
    ) -> CatalogResult<ItemClassificationModel> {
        self.record(CatalogCall::UpdateClassification {
            company_id,
            item_id,
            classification_id,
            classification: classification.clone(),
        })
        .await;

        let mut state = self.state.write().await;
        Self::ensure_accepts(&state, company_id, item_id)?;
        let item = Self::item_mut(&mut state, company_id, item_id)?;
        let existing = item
            .classifications
            .get_or_insert_with(Vec::new)
            .iter_mut()
            .find(|c| c.id == Some(classification_id))
            .ok_or_else(|| {
                Self::rejected(
                    "EntityNotFoundError",
                    format!("Classification {} not found", classification_id),
                )
            })?;
        existing.system_code = classification.system_code.clone();
        existing.product_code = classification.product_code.clone();
        Ok(existing.clone())
    }

    async fn list_classification_systems(
        &self,
        options: &QueryOptions,
    ) -> CatalogResult<FetchResult<ClassificationSystem>> {
        self.record(CatalogCall::ListClassificationSystems).await;

        let state = self.state.read().await;
        let matching = state
            .systems
            .iter()
            .filter(|s| matches_filter(s, options.filter.as_deref()))
            .cloned()
            .collect();
        Ok(paginate(matching, options))
    }
}
