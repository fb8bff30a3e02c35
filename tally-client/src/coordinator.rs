//! Expense query coordinator.
//!
//! Owns the dashboard filter and the derived view state (current page and
//! category summary). A fetch runs in two halves: [`QueryCoordinator::begin`]
//! validates the filter and hands out a [`FetchTicket`];
//! [`QueryCoordinator::complete`] folds the responses back in. Every ticket
//! carries a generation number, and any filter, page or session change moves
//! the generation on, so a response that arrives after its filter was
//! superseded is dropped instead of overwriting fresher state.

use chrono::NaiveDate;
use tally_core::{
    CategoryFilter, CategorySummary, ListQuery, ListResponse, PageResult, QueryFilter,
    SummaryResponse, ValidationError,
};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::gateway::ExpenseApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// Filter not fetched yet (or changed since the last fetch)
    Idle,
    Validating,
    Loading,
    Loaded,
    Error,
}

/// Proof that a fetch was started for a particular filter generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    query: ListQuery,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Page and summary replaced.
    Loaded,
    /// Filter invalid; nothing was sent.
    Rejected(ValidationError),
    /// A query failed. Previously loaded data is still on display.
    Failed(String),
    /// Requested page no longer exists; the filter is back on page 1 and
    /// another fetch is due.
    PageReset,
    /// Response belonged to a superseded fetch and was ignored.
    Stale,
}

#[derive(Debug, Clone)]
pub struct QueryCoordinator {
    filter: QueryFilter,
    state: QueryState,
    page: PageResult,
    summary: Vec<CategorySummary>,
    validation_error: Option<ValidationError>,
    fetch_error: Option<String>,
    generation: u64,
    session_token: Option<String>,
}

impl QueryCoordinator {
    pub fn new(filter: QueryFilter) -> Self {
        Self {
            filter,
            state: QueryState::Idle,
            page: PageResult::default(),
            summary: Vec::new(),
            validation_error: None,
            fetch_error: None,
            generation: 0,
            session_token: None,
        }
    }

    pub fn filter(&self) -> &QueryFilter {
        &self.filter
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == QueryState::Loading
    }

    pub fn page(&self) -> &PageResult {
        &self.page
    }

    pub fn summary(&self) -> &[CategorySummary] {
        &self.summary
    }

    pub fn validation_error(&self) -> Option<&ValidationError> {
        self.validation_error.as_ref()
    }

    pub fn fetch_error(&self) -> Option<&str> {
        self.fetch_error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // --- filter changes; each returns whether a refetch is due ---

    pub fn set_category(&mut self, category: CategoryFilter) -> bool {
        let changed = self.filter.set_category(category);
        self.invalidate(changed)
    }

    pub fn set_start_date(&mut self, date: NaiveDate) -> bool {
        let changed = self.filter.set_start_date(date);
        self.invalidate(changed)
    }

    pub fn set_end_date(&mut self, date: NaiveDate) -> bool {
        let changed = self.filter.set_end_date(date);
        self.invalidate(changed)
    }

    pub fn set_date_range(&mut self, start: NaiveDate, end: NaiveDate) -> bool {
        let changed = self.filter.set_date_range(start, end);
        self.invalidate(changed)
    }

    pub fn set_page(&mut self, page: u32) -> Result<bool, ValidationError> {
        let changed = self.filter.set_page(page)?;
        Ok(self.invalidate(changed))
    }

    /// Advance one page; ignored when the last response had no `next` link.
    pub fn next_page(&mut self) -> bool {
        if !self.page.has_next {
            return false;
        }
        let page = self.filter.page() + 1;
        self.set_page(page).unwrap_or(false)
    }

    /// Go back one page, never below 1.
    pub fn prev_page(&mut self) -> bool {
        let page = self.filter.page().saturating_sub(1).max(1);
        self.set_page(page).unwrap_or(false)
    }

    /// Track the session's access token. A different token (sign-in,
    /// sign-out, account switch) invalidates what is on screen.
    pub fn observe_session(&mut self, token: Option<&str>) -> bool {
        if self.session_token.as_deref() == token {
            return false;
        }
        self.session_token = token.map(str::to_string);
        self.invalidate(true)
    }

    fn invalidate(&mut self, changed: bool) -> bool {
        if changed {
            self.generation += 1;
            self.state = QueryState::Idle;
        }
        changed
    }

    // --- fetch lifecycle ---

    /// Validate the filter and start a fetch. `None` means the filter was
    /// rejected and no request may be sent.
    pub fn begin(&mut self) -> Option<FetchTicket> {
        self.state = QueryState::Validating;
        let query = match self.filter.to_list_query() {
            Ok(q) => q,
            Err(e) => {
                debug!(error = %e, "filter rejected; not fetching");
                self.validation_error = Some(e);
                self.state = QueryState::Error;
                return None;
            }
        };
        self.validation_error = None;
        self.generation += 1;
        self.state = QueryState::Loading;
        Some(FetchTicket {
            generation: self.generation,
            query,
        })
    }

    /// Fold the list and summary responses for `ticket` into view state.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        list: Result<ListResponse, ApiError>,
        summary: Result<SummaryResponse, ApiError>,
    ) -> FetchOutcome {
        if ticket.generation != self.generation {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "discarding stale response"
            );
            return FetchOutcome::Stale;
        }

        let mut failure = None;
        let mut page_reset = false;

        match list {
            Ok(resp) => self.page.apply(resp),
            Err(e) if e.is_not_found() && self.filter.reset_page() => {
                info!(page = ticket.query.page, "page out of range; back to page 1");
                page_reset = true;
            }
            Err(e) => failure = Some(e),
        }

        match summary {
            Ok(resp) => {
                if let Some(entries) = resp.into_entries() {
                    self.summary = entries;
                }
            }
            Err(e) => {
                failure.get_or_insert(e);
            }
        }

        if page_reset {
            self.generation += 1;
            self.state = QueryState::Idle;
            return FetchOutcome::PageReset;
        }

        match failure {
            Some(e) => {
                warn!(error = %e, "error fetching expenses");
                let message = e.to_string();
                self.fetch_error = Some(message.clone());
                self.state = QueryState::Error;
                FetchOutcome::Failed(message)
            }
            None => {
                self.fetch_error = None;
                self.state = QueryState::Loaded;
                FetchOutcome::Loaded
            }
        }
    }

    /// Run a full fetch against `api`: list and summary concurrently, with one
    /// automatic retry on page 1 when the requested page has disappeared.
    pub async fn refresh<A: ExpenseApi + ?Sized>(&mut self, api: &A) -> FetchOutcome {
        loop {
            let Some(ticket) = self.begin() else {
                let err = self
                    .validation_error
                    .clone()
                    .unwrap_or(ValidationError::InvalidPage);
                return FetchOutcome::Rejected(err);
            };

            let (list, summary) =
                tokio::join!(api.list_expenses(ticket.query()), api.expense_summary());

            match self.complete(&ticket, list, summary) {
                FetchOutcome::PageReset => continue,
                outcome => return outcome,
            }
        }
    }
}
