//! Dashboard event loop.
//!
//! The coordinator and the submission handler never call each other. Filter
//! edits, page moves, session changes and successful submissions each queue
//! an event; [`Dashboard::run_pending`] drains the queue and runs a single
//! fetch for however many events piled up.

use chrono::NaiveDate;
use std::collections::VecDeque;
use tally_core::{CategoryFilter, DraftExpense, QueryFilter, ValidationError};
use tracing::debug;

use crate::coordinator::{FetchOutcome, QueryCoordinator};
use crate::error::SubmitError;
use crate::gateway::ExpenseApi;
use crate::session::Session;
use crate::submission::{SubmissionHandler, Submitted};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardEvent {
    FilterChanged,
    PageChanged,
    SessionChanged,
    ExpenseCreated,
    /// Explicit reload with the filter unchanged
    Refresh,
}

pub struct Dashboard<A: ExpenseApi> {
    api: A,
    coordinator: QueryCoordinator,
    draft: DraftExpense,
    pending: VecDeque<DashboardEvent>,
}

impl<A: ExpenseApi> Dashboard<A> {
    pub fn new(api: A, filter: QueryFilter, today: NaiveDate) -> Self {
        Self {
            api,
            coordinator: QueryCoordinator::new(filter),
            draft: DraftExpense::new(today),
            pending: VecDeque::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn coordinator(&self) -> &QueryCoordinator {
        &self.coordinator
    }

    pub fn draft(&self) -> &DraftExpense {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut DraftExpense {
        &mut self.draft
    }

    pub fn pending(&self) -> &VecDeque<DashboardEvent> {
        &self.pending
    }

    pub fn dispatch(&mut self, event: DashboardEvent) {
        self.pending.push_back(event);
    }

    fn dispatch_if(&mut self, changed: bool, event: DashboardEvent) -> bool {
        if changed {
            self.dispatch(event);
        }
        changed
    }

    pub fn set_category(&mut self, category: CategoryFilter) -> bool {
        let changed = self.coordinator.set_category(category);
        self.dispatch_if(changed, DashboardEvent::FilterChanged)
    }

    pub fn set_start_date(&mut self, date: NaiveDate) -> bool {
        let changed = self.coordinator.set_start_date(date);
        self.dispatch_if(changed, DashboardEvent::FilterChanged)
    }

    pub fn set_end_date(&mut self, date: NaiveDate) -> bool {
        let changed = self.coordinator.set_end_date(date);
        self.dispatch_if(changed, DashboardEvent::FilterChanged)
    }

    pub fn set_date_range(&mut self, start: NaiveDate, end: NaiveDate) -> bool {
        let changed = self.coordinator.set_date_range(start, end);
        self.dispatch_if(changed, DashboardEvent::FilterChanged)
    }

    pub fn set_page(&mut self, page: u32) -> Result<bool, ValidationError> {
        let changed = self.coordinator.set_page(page)?;
        Ok(self.dispatch_if(changed, DashboardEvent::PageChanged))
    }

    pub fn next_page(&mut self) -> bool {
        let changed = self.coordinator.next_page();
        self.dispatch_if(changed, DashboardEvent::PageChanged)
    }

    pub fn prev_page(&mut self) -> bool {
        let changed = self.coordinator.prev_page();
        self.dispatch_if(changed, DashboardEvent::PageChanged)
    }

    /// Point both the API client and the coordinator at `session`.
    pub fn set_session(&mut self, session: Option<&Session>) -> bool {
        let token = session.map(|s| s.access_token.clone());
        let changed = self.coordinator.observe_session(token.as_deref());
        self.api.set_access_token(token);
        self.dispatch_if(changed, DashboardEvent::SessionChanged)
    }

    /// Submit the current draft. Success queues a refresh.
    pub async fn submit(&mut self) -> Result<Submitted, SubmitError> {
        let submitted = SubmissionHandler::submit(&self.api, &mut self.draft).await?;
        self.dispatch(DashboardEvent::ExpenseCreated);
        Ok(submitted)
    }

    /// Drain queued events with one fetch. `None` when nothing was queued.
    pub async fn run_pending(&mut self) -> Option<FetchOutcome> {
        if self.pending.is_empty() {
            return None;
        }
        let events: Vec<_> = self.pending.drain(..).collect();
        debug!(?events, "refreshing dashboard");
        Some(self.coordinator.refresh(&self.api).await)
    }
}
