use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Collection response returned by every list/query endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult<T> {
    /// Total matches ignoring `$top`/`$skip`; absent on list endpoints
    #[serde(rename = "@recordsetCount", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

impl<T> FetchResult<T> {
    pub fn new(value: Vec<T>, count: Option<u64>) -> Self {
        Self { count, value }
    }
}

/// Tax nexus declaration for one jurisdiction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NexusModel {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub company_id: i64,
    #[serde(default)]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nexus_tax_type_group: Option<String>,
    /// Jurisdiction fields passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NexusModel {
    /// Copy of this nexus owned by another company
    pub fn for_company(&self, company_id: i64) -> Self {
        let mut nexus = self.clone();
        nexus.company_id = company_id;
        nexus
    }
}

/// Product/SKU record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemModel {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub company_id: i64,
    pub item_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifications: Option<Vec<ItemClassificationModel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemModel {
    pub fn new(item_code: impl Into<String>) -> Self {
        Self {
            id: 0,
            company_id: 0,
            item_code: item_code.into(),
            description: None,
            classifications: None,
            parameters: None,
            extra: Map::new(),
        }
    }

    pub fn with_classification(
        mut self,
        system_code: impl Into<String>,
        product_code: impl Into<String>,
    ) -> Self {
        self.classifications
            .get_or_insert_with(Vec::new)
            .push(ItemClassificationModel::new(system_code, product_code));
        self
    }

    /// Copy of this item owned by another company, classifications embedded
    pub fn for_company(&self, company_id: i64) -> Self {
        let mut item = self.clone();
        item.company_id = company_id;
        item
    }
}

/// One coded classification of an item under one classification system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemClassificationModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<i64>,
    pub system_code: String,
    pub product_code: String,
}

impl ItemClassificationModel {
    pub fn new(system_code: impl Into<String>, product_code: impl Into<String>) -> Self {
        Self {
            id: None,
            item_id: None,
            system_code: system_code.into(),
            product_code: product_code.into(),
        }
    }
}

/// Payload for creating or updating a classification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemClassificationInput {
    pub product_code: String,
    pub system_code: String,
}

impl From<&ItemClassificationModel> for ItemClassificationInput {
    fn from(model: &ItemClassificationModel) -> Self {
        Self {
            product_code: model.product_code.clone(),
            system_code: model.system_code.clone(),
        }
    }
}

/// Reference data: a named coding scheme
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationSystem {
    pub system_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
