//! List/summary response envelopes and their reconciliation into view state.

use serde::{Deserialize, Serialize};

use crate::expense::{decimal, ExpenseRecord};

/// `GET /api/expenses/` response.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ListResponse {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Option<ListEnvelope>,
}

/// Inner `results` object: the page items plus the filtered total.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ListEnvelope {
    #[serde(default)]
    pub results: Option<Vec<ExpenseRecord>>,
    #[serde(default, deserialize_with = "decimal::deserialize_option")]
    pub total: Option<f64>,
}

/// One page of expenses as displayed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    pub items: Vec<ExpenseRecord>,
    /// Sum over the whole filtered range, not just this page
    pub total: f64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageResult {
    /// Replace this page with a fresh response.
    ///
    /// Pagination flags follow the `next`/`previous` links; an empty link
    /// counts as none. A response without the `results` envelope keeps the
    /// previous items and total.
    pub fn apply(&mut self, resp: ListResponse) {
        self.has_next = is_link(&resp.next);
        self.has_prev = is_link(&resp.previous);

        if let Some(envelope) = resp.results {
            self.items = envelope.results.unwrap_or_default();
            self.total = envelope.total.unwrap_or(0.0);
        }
    }
}

fn is_link(link: &Option<String>) -> bool {
    link.as_deref().is_some_and(|s| !s.is_empty())
}

/// `GET /api/expenses/summary/` response.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct SummaryResponse {
    #[serde(default)]
    pub summary: Option<Vec<SummaryRow>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SummaryRow {
    pub category: String,
    #[serde(deserialize_with = "decimal::deserialize")]
    pub total: f64,
}

/// Chart-ready per-category total.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub name: String,
    pub amount: f64,
}

impl SummaryResponse {
    /// Map rows to chart entries, keeping server order. `None` when the
    /// response carried no `summary` key.
    pub fn into_entries(self) -> Option<Vec<CategorySummary>> {
        self.summary.map(|rows| {
            rows.into_iter()
                .map(|row| CategorySummary {
                    name: row.category,
                    amount: row.total,
                })
                .collect()
        })
    }
}
