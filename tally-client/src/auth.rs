//! Login and registration flows.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::{ApiError, AuthError};
use crate::gateway::{AuthApi, Credentials, Registration};
use crate::session::SessionStore;
use crate::storage::TokenStorage;

const REGISTRATION_FAILED: &str = "Registration failed";

/// Exchange credentials for tokens and sign the store in.
///
/// Any rejection surfaces as [`AuthError::InvalidCredentials`]; the existing
/// session is left alone.
pub async fn login<A, S>(
    api: &A,
    store: &mut SessionStore<S>,
    username: &str,
    password: &str,
) -> Result<(), AuthError>
where
    A: AuthApi + ?Sized,
    S: TokenStorage,
{
    let credentials = Credentials {
        username: username.to_string(),
        password: password.to_string(),
    };
    let tokens = api.login(&credentials).await.map_err(|e| {
        warn!(error = %e, "login rejected");
        AuthError::InvalidCredentials
    })?;

    store
        .login(&tokens.access, &tokens.refresh, username)
        .map_err(|e| AuthError::Storage(format!("{e:#}")))
}

/// Create an account. Does not sign in.
pub async fn register<A: AuthApi + ?Sized>(
    api: &A,
    registration: &Registration,
) -> Result<(), AuthError> {
    api.register(registration).await.map_err(|e| {
        warn!(error = %e, "registration rejected");
        AuthError::Registration(registration_message(&e))
    })
}

/// Pick the message to show for a rejected registration: the first
/// `username` error, else the first error on any other field.
pub fn registration_message(err: &ApiError) -> String {
    err.body()
        .and_then(|body| serde_json::from_str::<BTreeMap<String, Value>>(body).ok())
        .and_then(|fields| {
            let username = fields.get("username").and_then(first_message);
            username.or_else(|| fields.values().find_map(first_message))
        })
        .unwrap_or_else(|| REGISTRATION_FAILED.to_string())
}

fn first_message(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_message),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::TokenPair;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use reqwest::StatusCode;

    fn rejected(status: StatusCode, body: &str) -> ApiError {
        ApiError::Status {
            url: "http://test/api/auth/".to_string(),
            status,
            body: body.to_string(),
        }
    }

    struct FakeAuth {
        accept_password: &'static str,
        register_body: Option<&'static str>,
    }

    #[async_trait]
    impl AuthApi for FakeAuth {
        async fn login(&self, c: &Credentials) -> Result<TokenPair, ApiError> {
            if c.password == self.accept_password {
                Ok(TokenPair {
                    access: format!("acc-{}", c.username),
                    refresh: format!("ref-{}", c.username),
                })
            } else {
                Err(rejected(StatusCode::UNAUTHORIZED, r#"{"detail": "No active account"}"#))
            }
        }

        async fn register(&self, _: &Registration) -> Result<(), ApiError> {
            match self.register_body {
                Some(body) => Err(rejected(StatusCode::BAD_REQUEST, body)),
                None => Ok(()),
            }
        }

        async fn logout(&self, _: &str, _: &str) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn registration() -> Registration {
        Registration {
            username: "sam".to_string(),
            email: "sam@example.com".to_string(),
            password: "pw".to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_success_signs_in() {
        let api = FakeAuth { accept_password: "pw", register_body: None };
        let mut store = SessionStore::open(MemoryStorage::new()).unwrap();

        login(&api, &mut store, "sam", "pw").await.unwrap();

        let s = store.current().unwrap();
        assert_eq!(s.access_token, "acc-sam");
        assert_eq!(s.identity.username, "sam");
    }

    #[tokio::test]
    async fn test_login_failure_leaves_session_alone() {
        let api = FakeAuth { accept_password: "pw", register_body: None };
        let mut store = SessionStore::open(MemoryStorage::new()).unwrap();
        store.login("keep", "keep-r", "kim").unwrap();

        let err = login(&api, &mut store, "sam", "wrong").await.unwrap_err();

        assert_eq!(err, AuthError::InvalidCredentials);
        assert_eq!(err.to_string(), "Invalid username or password");
        assert_eq!(store.access_token(), Some("keep"));
    }

    #[tokio::test]
    async fn test_register_surfaces_username_error_first() {
        let api = FakeAuth {
            accept_password: "pw",
            register_body: Some(
                r#"{"email": ["Enter a valid email address."], "username": ["A user with that username already exists."]}"#,
            ),
        };
        let err = register(&api, &registration()).await.unwrap_err();
        assert_eq!(
            err,
            AuthError::Registration("A user with that username already exists.".to_string())
        );
    }

    #[tokio::test]
    async fn test_register_falls_back_to_other_fields_then_generic() {
        let api = FakeAuth {
            accept_password: "pw",
            register_body: Some(r#"{"password": ["This password is too short."]}"#),
        };
        let err = register(&api, &registration()).await.unwrap_err();
        assert_eq!(err.to_string(), "This password is too short.");

        let api = FakeAuth {
            accept_password: "pw",
            register_body: Some("<html>502</html>"),
        };
        let err = register(&api, &registration()).await.unwrap_err();
        assert_eq!(err.to_string(), "Registration failed");
    }

    #[tokio::test]
    async fn test_register_success() {
        let api = FakeAuth { accept_password: "pw", register_body: None };
        assert!(register(&api, &registration()).await.is_ok());
    }
}
