use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::{ServiceErrorDetail, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Nexus,
    Item,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Nexus => write!(f, "nexus"),
            RecordKind::Item => write!(f, "item"),
        }
    }
}

/// One unit of work that could not be applied
#[derive(Debug, Clone, Serialize)]
pub struct FailedRecord {
    pub kind: RecordKind,
    /// Natural key: country for nexus, item code for items
    pub key: String,
    /// Identifier of the record in the source environment
    pub source_id: i64,
    pub message: String,
    /// True when the service rejected the call, false for unclassified errors
    pub domain: bool,
    pub detail: Option<ServiceErrorDetail>,
}

impl FailedRecord {
    pub fn new(kind: RecordKind, key: impl Into<String>, source_id: i64, err: &SyncError) -> Self {
        Self {
            kind,
            key: key.into(),
            source_id,
            message: err.to_string(),
            domain: err.is_domain(),
            detail: err.detail().cloned(),
        }
    }

    /// One line naming the record, plus the service detail when present
    pub fn log(&self) {
        if self.domain {
            warn!(
                "Error applying {} {} (source id {}): {}",
                self.kind, self.key, self.source_id, self.message
            );
        } else {
            error!(
                "Other error occurred applying {} {} (source id {}): {}",
                self.kind, self.key, self.source_id, self.message
            );
        }

        if let Some(detail) = self.detail.as_ref().filter(|d| !d.details.is_empty()) {
            let more = serde_json::to_string(&detail.details).unwrap_or_default();
            warn!("More information: {}", more);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NexusOutcome {
    pub created: usize,
    pub skipped: usize,
    pub failed: Vec<FailedRecord>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemOutcome {
    pub created: usize,
    /// Items that already existed in the target
    pub matched: usize,
    pub classifications_created: usize,
    pub classifications_updated: usize,
    pub classifications_unchanged: usize,
    pub failed: Vec<FailedRecord>,
}

impl ItemOutcome {
    pub fn classifications_applied(&self) -> usize {
        self.classifications_created + self.classifications_updated
    }
}

/// Outcome of one reconciliation run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub classification_systems: usize,
    pub nexus: Option<NexusOutcome>,
    pub items: Option<ItemOutcome>,
}

impl SyncReport {
    pub fn start(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            classification_systems: 0,
            nexus: None,
            items: None,
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailedRecord> {
        let nexus = self.nexus.iter().flat_map(|n| n.failed.iter());
        let items = self.items.iter().flat_map(|i| i.failed.iter());
        nexus.chain(items)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Number of create/update operations applied (or planned on a dry run)
    pub fn writes(&self) -> usize {
        let nexus = self.nexus.as_ref().map(|n| n.created).unwrap_or(0);
        let items = self
            .items
            .as_ref()
            .map(|i| i.created + i.classifications_applied())
            .unwrap_or(0);
        nexus + items
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "would be created" } else { "created" };
        writeln!(f, "Run {}{}", self.run_id, if self.dry_run { " (dry run)" } else { "" })?;

        if let Some(nexus) = &self.nexus {
            writeln!(
                f,
                "  nexus: {} {}, {} already present, {} failed",
                nexus.created,
                verb,
                nexus.skipped,
                nexus.failed.len()
            )?;
        }

        if let Some(items) = &self.items {
            writeln!(
                f,
                "  items: {} {}, {} already present, {} failed",
                items.created,
                verb,
                items.matched,
                items.failed.len()
            )?;
            writeln!(
                f,
                "  classifications: {} added, {} changed, {} unchanged",
                items.classifications_created,
                items.classifications_updated,
                items.classifications_unchanged
            )?;
        }

        for failure in self.failures() {
            writeln!(
                f,
                "  failed {} {} (source id {}): {}",
                failure.kind, failure.key, failure.source_id, failure.message
            )?;
        }

        if let Some(finished_at) = self.finished_at {
            let elapsed = finished_at.signed_duration_since(self.started_at);
            write!(f, "  finished in {}s", elapsed.num_seconds())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;

    #[test]
    fn test_failed_record_keeps_service_detail() {
        let err = SyncError::from(CatalogError::Service {
            status: 400,
            detail: ServiceErrorDetail {
                code: Some("DuplicateEntry".to_string()),
                message: Some("Item already exists".to_string()),
                target: None,
                details: vec![serde_json::json!({ "number": 73 })],
            },
        });

        let failure = FailedRecord::new(RecordKind::Item, "A1", 42, &err);
        assert!(failure.domain);
        assert_eq!(failure.detail.unwrap().details.len(), 1);
    }

    #[test]
    fn test_summary_counts_writes_and_failures() {
        let mut report = SyncReport::start(false);
        report.nexus = Some(NexusOutcome {
            created: 1,
            skipped: 2,
            failed: vec![],
        });
        report.items = Some(ItemOutcome {
            created: 3,
            matched: 1,
            classifications_created: 1,
            classifications_updated: 1,
            classifications_unchanged: 4,
            failed: vec![FailedRecord::new(
                RecordKind::Item,
                "B2",
                7,
                &SyncError::MissingIdentifier("HS classification of item 9".to_string()),
            )],
        });
        let report = report.finish();

        assert_eq!(report.writes(), 6);
        assert!(report.has_failures());
        let summary = report.to_string();
        assert!(summary.contains("nexus: 1 created, 2 already present, 0 failed"));
        assert!(summary.contains("failed item B2 (source id 7)"));
    }
}
