//! # cp-services
//!
//! Business operations of the consulting portal.
//!
//! Every operation takes the caller's [`Principal`](cp_core::types::Principal),
//! runs the matching contract from `cp-contracts`, then works against the
//! [`Store`]. The primary write of an operation is authoritative. Follow-up
//! writes and notifications are best-effort (see `saga`).

mod access;
mod saga;

pub mod assignments;
pub mod completion;
pub mod deletion;
pub mod progress;
pub mod schedule;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use cp_db::Store;
use cp_notifications::Notifier;

pub use assignments::{AssignmentOutcome, AssignmentService, FailedAssignment};
pub use completion::CompletionService;
pub use deletion::{DeletionGuard, DeletionReport};
pub use progress::{ProgressAggregator, ProgressView};
pub use schedule::{DateDistributor, DistributionOutcome};

/// All services over one store and one notifier
#[derive(Clone)]
pub struct Portal {
    pub assignments: AssignmentService,
    pub deletion: DeletionGuard,
    pub schedule: DateDistributor,
    pub completion: CompletionService,
    pub progress: ProgressAggregator,
}

impl Portal {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        let progress = ProgressAggregator::new(store.clone());
        Self {
            assignments: AssignmentService::new(store.clone(), notifier.clone()),
            deletion: DeletionGuard::new(store.clone()),
            schedule: DateDistributor::new(store.clone()),
            completion: CompletionService::new(store, notifier, progress.clone()),
            progress,
        }
    }
}
