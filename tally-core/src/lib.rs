//! tally-core: expense domain types, filter validation and response reconciliation.
//!
//! Nothing in here performs I/O; `tally-client` drives these types over HTTP.

pub mod error;
pub mod expense;
pub mod filter;
pub mod page;
pub mod time;

pub use error::ValidationError;
pub use expense::{normalize_amount, Category, DraftExpense, ExpenseId, ExpenseRecord, NewExpense};
pub use filter::{CategoryFilter, ListQuery, QueryFilter};
pub use page::{CategorySummary, ListEnvelope, ListResponse, PageResult, SummaryResponse, SummaryRow};
pub use time::{month_start, today_in};
