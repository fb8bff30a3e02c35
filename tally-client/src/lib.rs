//! tally-client: session handling and dashboard orchestration over the
//! expense REST API.

pub mod auth;
pub mod coordinator;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod session;
pub mod storage;
pub mod submission;

pub use coordinator::{FetchOutcome, FetchTicket, QueryCoordinator, QueryState};
pub use dashboard::{Dashboard, DashboardEvent};
pub use error::{ApiError, AuthError, SubmitError};
pub use gateway::{AuthApi, Credentials, ExpenseApi, Gateway, Registration, TokenPair};
pub use session::{Identity, Session, SessionStore};
pub use storage::{FileStorage, MemoryStorage, TokenStorage};
pub use submission::{SubmissionHandler, Submitted};
