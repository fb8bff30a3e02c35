//! Authenticated request gateway: one place for the base URL, the bearer
//! header and status handling.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tally_core::{ExpenseRecord, ListQuery, ListResponse, NewExpense, SummaryResponse};
use tracing::debug;

use crate::error::ApiError;
use crate::session::Session;

pub const REGISTER_PATH: &str = "api/auth/register/";
pub const LOGIN_PATH: &str = "api/auth/login/";
pub const LOGOUT_PATH: &str = "api/auth/logout/";
pub const EXPENSES_PATH: &str = "api/expenses/";
pub const SUMMARY_PATH: &str = "api/expenses/summary/";

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// `POST /api/auth/login/` response.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Auth endpoints.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, ApiError>;

    async fn register(&self, registration: &Registration) -> Result<(), ApiError>;

    /// Blacklist `refresh_token` server-side.
    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), ApiError>;
}

/// Expense endpoints. Implementations attach whatever credentials they hold.
#[async_trait]
pub trait ExpenseApi: Send + Sync {
    async fn list_expenses(&self, query: &ListQuery) -> Result<ListResponse, ApiError>;

    async fn expense_summary(&self) -> Result<SummaryResponse, ApiError>;

    /// Returns the created record when the server echoes one back.
    async fn create_expense(
        &self,
        expense: &NewExpense,
        idempotency_key: &str,
    ) -> Result<Option<ExpenseRecord>, ApiError>;

    /// Bearer token for subsequent requests; `None` sends them unauthenticated.
    fn set_access_token(&mut self, token: Option<String>);
}

/// HTTP implementation of [`AuthApi`] and [`ExpenseApi`].
#[derive(Debug, Clone)]
pub struct Gateway {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl Gateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            access_token: None,
        }
    }

    /// Gateway carrying the session's access token, or none when signed out.
    pub fn for_session(base_url: impl Into<String>, session: Option<&Session>) -> Self {
        let mut gw = Self::new(base_url);
        gw.access_token = session.map(|s| s.access_token.clone());
        gw
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Builder with the bearer header attached when a token is held.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint(path));
        match &self.access_token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn send(&self, path: &str, builder: RequestBuilder) -> Result<Response, ApiError> {
        let url = self.endpoint(path);
        debug!(%url, authenticated = self.access_token.is_some(), "sending request");

        let resp = builder.send().await.map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(%url, %status, "request rejected");
            return Err(ApiError::Status { url, status, body });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let text = self.send_text(path, builder).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode {
            url: self.endpoint(path),
            message: e.to_string(),
        })
    }

    async fn send_text(&self, path: &str, builder: RequestBuilder) -> Result<String, ApiError> {
        let resp = self.send(path, builder).await?;
        resp.text().await.map_err(|source| ApiError::Transport {
            url: self.endpoint(path),
            source,
        })
    }
}

#[async_trait]
impl AuthApi for Gateway {
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, ApiError> {
        // Login is never sent with a stale bearer token.
        let builder = self
            .client
            .post(self.endpoint(LOGIN_PATH))
            .json(credentials);
        self.send_json(LOGIN_PATH, builder).await
    }

    async fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        let builder = self
            .client
            .post(self.endpoint(REGISTER_PATH))
            .json(registration);
        self.send_text(REGISTER_PATH, builder).await.map(|_| ())
    }

    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), ApiError> {
        #[derive(Serialize)]
        struct Body<'a> {
            refresh: &'a str,
        }

        let builder = self
            .client
            .post(self.endpoint(LOGOUT_PATH))
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .json(&Body {
                refresh: refresh_token,
            });
        self.send_text(LOGOUT_PATH, builder).await.map(|_| ())
    }
}

#[async_trait]
impl ExpenseApi for Gateway {
    async fn list_expenses(&self, query: &ListQuery) -> Result<ListResponse, ApiError> {
        let builder = self.request(Method::GET, EXPENSES_PATH).query(query);
        self.send_json(EXPENSES_PATH, builder).await
    }

    async fn expense_summary(&self) -> Result<SummaryResponse, ApiError> {
        let builder = self.request(Method::GET, SUMMARY_PATH);
        self.send_json(SUMMARY_PATH, builder).await
    }

    async fn create_expense(
        &self,
        expense: &NewExpense,
        idempotency_key: &str,
    ) -> Result<Option<ExpenseRecord>, ApiError> {
        let builder = self
            .request(Method::POST, EXPENSES_PATH)
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
            .json(expense);
        let text = self.send_text(EXPENSES_PATH, builder).await?;
        // The write already succeeded; an unfamiliar echo must not turn it into a failure.
        Ok(serde_json::from_str(&text).ok())
    }

    fn set_access_token(&mut self, token: Option<String>) {
        self.access_token = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::{Category, QueryFilter};

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let gw = Gateway::new("http://127.0.0.1:8000/");
        assert_eq!(gw.endpoint("/api/expenses/"), "http://127.0.0.1:8000/api/expenses/");
        let gw = Gateway::new("http://127.0.0.1:8000");
        assert_eq!(gw.endpoint(SUMMARY_PATH), "http://127.0.0.1:8000/api/expenses/summary/");
    }

    #[test]
    fn test_bearer_header_attached_when_token_present() {
        let mut gw = Gateway::new("http://localhost:8000");
        gw.set_access_token(Some("abc".to_string()));
        let req = gw.request(Method::GET, EXPENSES_PATH).build().unwrap();
        assert_eq!(req.headers().get(AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[test]
    fn test_request_without_token_is_still_built() {
        let gw = Gateway::for_session("http://localhost:8000", None);
        let req = gw.request(Method::GET, EXPENSES_PATH).build().unwrap();
        assert!(req.headers().get(AUTHORIZATION).is_none());
        assert_eq!(req.url().path(), "/api/expenses/");
    }

    #[test]
    fn test_list_query_string() {
        let gw = Gateway::new("http://localhost:8000");
        let mut filter = QueryFilter::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        let query = filter.to_list_query().unwrap();
        let req = gw.request(Method::GET, EXPENSES_PATH).query(&query).build().unwrap();
        assert_eq!(
            req.url().query(),
            Some("page=1&sort=date_desc&start_date=2024-01-01&end_date=2024-01-31")
        );

        filter.set_category(Category::Food.into());
        let query = filter.to_list_query().unwrap();
        let req = gw.request(Method::GET, EXPENSES_PATH).query(&query).build().unwrap();
        assert!(req.url().query().unwrap().ends_with("&category=Food"));
    }
}
