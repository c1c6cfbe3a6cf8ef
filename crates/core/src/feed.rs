//! Live allergy listing for one patient.
//!
//! [`AllergyFeed`] publishes [`AllergyListing`] snapshots through a `tokio::sync::watch` channel.
//! The first snapshot is loading. Each [`refresh`](AllergyFeed::refresh) marks the current
//! snapshot as revalidating and keeps its records visible until the new fetch settles.
//!
//! Refreshes may overlap. Each one is numbered when it starts, and a result is only published
//! if no later-started refresh has already settled. `is_revalidating` stays set until the last
//! refresh in flight finishes, whether it completed or was cancelled.

use crate::allergies::{AllergyListing, AllergyService};
use crate::cancellation::{CancellationToken, Outcome};
use chart_types::ResourceId;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

#[derive(Debug)]
pub struct AllergyFeed {
    service: AllergyService,
    patient: ResourceId,
    state: watch::Sender<AllergyListing>,
    refreshes: Mutex<RefreshLedger>,
}

/// Bookkeeping for overlapping refreshes. Always locked before the watch channel is written.
#[derive(Debug, Default)]
struct RefreshLedger {
    in_flight: usize,
    started: u64,
    settled: u64,
}

impl AllergyFeed {
    pub fn new(service: AllergyService, patient: ResourceId) -> Self {
        let (state, _) = watch::channel(AllergyListing::loading());
        Self {
            service,
            patient,
            state,
            refreshes: Mutex::default(),
        }
    }

    pub fn patient(&self) -> &ResourceId {
        &self.patient
    }

    pub fn subscribe(&self) -> watch::Receiver<AllergyListing> {
        self.state.subscribe()
    }

    pub fn current(&self) -> AllergyListing {
        self.state.borrow().clone()
    }

    /// Fetch the patient's allergies again and publish the result.
    ///
    /// A failed fetch keeps the current records alongside the error. A cancelled fetch leaves
    /// the published records untouched. A fetch that settles after a later-started one is
    /// returned to the caller but not published.
    pub async fn refresh(&self, token: &CancellationToken) -> Outcome<AllergyListing> {
        let generation = self.begin_refresh();
        let _in_flight = InFlight { feed: self };

        match self.service.list_allergies(&self.patient, token).await {
            Outcome::Completed(listing) => Outcome::Completed(self.settle(generation, listing)),
            Outcome::Cancelled => {
                tracing::debug!(patient = %self.patient, generation, "allergy refresh cancelled");
                Outcome::Cancelled
            }
        }
    }

    fn ledger(&self) -> MutexGuard<'_, RefreshLedger> {
        self.refreshes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_refresh(&self) -> u64 {
        let mut ledger = self.ledger();
        ledger.in_flight += 1;
        ledger.started += 1;
        self.state.send_if_modified(|listing| {
            if listing.is_loading || listing.is_revalidating {
                return false;
            }
            listing.is_revalidating = true;
            true
        });
        ledger.started
    }

    fn settle(&self, generation: u64, mut listing: AllergyListing) -> AllergyListing {
        let mut ledger = self.ledger();
        if generation < ledger.settled {
            tracing::debug!(
                patient = %self.patient,
                generation,
                settled = ledger.settled,
                "discarding superseded allergy refresh"
            );
            return listing;
        }
        ledger.settled = generation;
        listing.is_revalidating = ledger.in_flight > 1;

        self.state.send_modify(|current| {
            if listing.is_error() && listing.records.is_none() {
                listing.records = current.records.clone();
            }
            *current = listing.clone();
        });
        listing
    }
}

/// Counts a refresh as in flight until it is dropped, so a future abandoned mid-fetch is
/// accounted for the same way as a cancelled one.
struct InFlight<'a> {
    feed: &'a AllergyFeed,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut ledger = self.feed.ledger();
        ledger.in_flight = ledger.in_flight.saturating_sub(1);
        if ledger.in_flight == 0 {
            self.feed
                .state
                .send_if_modified(|listing| std::mem::take(&mut listing.is_revalidating));
        }
    }
}
