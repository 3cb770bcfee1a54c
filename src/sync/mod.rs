pub mod classification;
pub mod driver;
pub mod extractor;
pub mod items;
pub mod nexus;
pub mod report;

pub use classification::{ClassificationMerger, MergeAction};
pub use driver::ReconciliationDriver;
pub use extractor::PagedExtractor;
pub use items::ItemReconciler;
pub use nexus::NexusReconciler;
pub use report::{FailedRecord, ItemOutcome, NexusOutcome, SyncReport};
