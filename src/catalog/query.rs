use std::fmt;

/// Equality predicates ANDed together, in the service's filter syntax
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `field EQ "value"`
    pub fn eq_str(mut self, field: &str, value: &str) -> Self {
        self.clauses
            .push(format!("{} EQ \"{}\"", field, escape_filter_value(value)));
        self
    }

    /// `field EQ value` for numbers and bare enum names
    pub fn eq_raw(mut self, field: &str, value: impl fmt::Display) -> Self {
        self.clauses.push(format!("{} EQ {}", field, value));
        self
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clauses.join(" AND "))
    }
}

/// Options of a single collection query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub filter: Option<String>,
    pub include: Option<String>,
    pub top: Option<u32>,
    pub skip: Option<u32>,
    pub order_by: Option<String>,
}

impl QueryOptions {
    pub fn filtered(filter: impl Into<String>) -> Self {
        Self {
            filter: Some(filter.into()),
            ..Self::default()
        }
    }

    pub fn with_include(mut self, include: impl Into<String>) -> Self {
        self.include = Some(include.into());
        self
    }

    /// Same query restricted to one page
    pub fn page(&self, top: u32, skip: u32) -> Self {
        let mut page = self.clone();
        page.top = Some(top);
        page.skip = Some(skip);
        page
    }

    /// OData-style query parameters; empty options are omitted
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(filter) = self.filter.as_ref().filter(|f| !f.is_empty()) {
            params.push(("$filter", filter.clone()));
        }
        if let Some(include) = self.include.as_ref().filter(|i| !i.is_empty()) {
            params.push(("$include", include.clone()));
        }
        if let Some(top) = self.top {
            params.push(("$top", top.to_string()));
        }
        if let Some(skip) = self.skip {
            params.push(("$skip", skip.to_string()));
        }
        if let Some(order_by) = self.order_by.as_ref().filter(|o| !o.is_empty()) {
            params.push(("$orderBy", order_by.clone()));
        }
        params
    }
}

fn escape_filter_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
