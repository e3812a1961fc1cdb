// ============================================================================
// Authentication - credential check and token issuance
// ============================================================================
//
// authenticate: find_by_email -> matches(raw, encoded) -> generate(email, role)
//
// Each step short-circuits: an unknown user never reaches the verifier and a
// wrong password never reaches the issuer.
//
// ============================================================================

mod directory;
mod jwt;
mod password;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use directory::InMemoryUserDirectory;
pub use jwt::{Claims, JwtTokenIssuer};
pub use password::Sha256PasswordVerifier;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("User directory unavailable: {0}")]
    Directory(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;
}

pub trait PasswordVerifier: Send + Sync {
    fn matches(&self, raw: &str, encoded: &str) -> bool;
}

pub trait TokenIssuer: Send + Sync {
    fn generate(&self, email: &str, role: &str) -> Result<String, AuthError>;
    fn validate(&self, token: &str) -> Result<Claims, AuthError>;
}

pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    verifier: Arc<dyn PasswordVerifier>,
    tokens: Arc<dyn TokenIssuer>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        verifier: Arc<dyn PasswordVerifier>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            users,
            verifier,
            tokens,
        }
    }

    /// Returns a signed token for valid credentials and `None` otherwise.
    pub async fn authenticate(&self, request: &LoginRequest) -> Result<Option<String>, AuthError> {
        let Some(user) = self.users.find_by_email(&request.email).await? else {
            tracing::debug!(email = %request.email, "Login rejected: unknown user");
            return Ok(None);
        };

        if !self.verifier.matches(&request.password, &user.password_hash) {
            tracing::debug!(email = %request.email, "Login rejected: bad credentials");
            return Ok(None);
        }

        let token = self.tokens.generate(&user.email, &user.role)?;
        tracing::info!(email = %user.email, role = %user.role, "Login succeeded");
        Ok(Some(token))
    }

    pub fn validate_token(&self, token: &str) -> bool {
        match self.tokens.validate(token) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Token validation failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TOKEN: &str = "valid.jwt.token";

    struct CountingVerifier {
        answer: bool,
        calls: AtomicUsize,
    }

    impl PasswordVerifier for CountingVerifier {
        fn matches(&self, _raw: &str, _encoded: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    struct CountingIssuer {
        reject_tokens: bool,
        generated: AtomicUsize,
        validated: AtomicUsize,
    }

    impl TokenIssuer for CountingIssuer {
        fn generate(&self, _email: &str, _role: &str) -> Result<String, AuthError> {
            self.generated.fetch_add(1, Ordering::SeqCst);
            Ok(TOKEN.to_string())
        }

        fn validate(&self, token: &str) -> Result<Claims, AuthError> {
            self.validated.fetch_add(1, Ordering::SeqCst);
            if self.reject_tokens {
                return Err(AuthError::InvalidToken("signature mismatch".to_string()));
            }
            Ok(Claims {
                sub: token.to_string(),
                role: "USER".to_string(),
                iat: 0,
                exp: usize::MAX,
            })
        }
    }

    struct Fixture {
        verifier: Arc<CountingVerifier>,
        issuer: Arc<CountingIssuer>,
        service: AuthService,
    }

    async fn fixture(password_ok: bool, reject_tokens: bool) -> Fixture {
        let users = InMemoryUserDirectory::new();
        users
            .insert(User {
                email: "test@example.com".to_string(),
                password_hash: "encoded-password".to_string(),
                role: "USER".to_string(),
            })
            .await;

        let verifier = Arc::new(CountingVerifier {
            answer: password_ok,
            calls: AtomicUsize::new(0),
        });
        let issuer = Arc::new(CountingIssuer {
            reject_tokens,
            generated: AtomicUsize::new(0),
            validated: AtomicUsize::new(0),
        });
        let service = AuthService::new(Arc::new(users), verifier.clone(), issuer.clone());

        Fixture {
            verifier,
            issuer,
            service,
        }
    }

    fn login(email: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: "password123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_valid_credentials_issue_token() {
        let f = fixture(true, false).await;

        let token = f.service.authenticate(&login("test@example.com")).await.unwrap();

        assert_eq!(token.as_deref(), Some(TOKEN));
        assert_eq!(f.verifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.issuer.generated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_skips_verifier_and_issuer() {
        let f = fixture(true, false).await;

        let token = f.service.authenticate(&login("nobody@example.com")).await.unwrap();

        assert!(token.is_none());
        assert_eq!(f.verifier.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.issuer.generated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wrong_password_skips_issuer() {
        let f = fixture(false, false).await;

        let token = f.service.authenticate(&login("test@example.com")).await.unwrap();

        assert!(token.is_none());
        assert_eq!(f.verifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.issuer.generated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validate_token() {
        let accepting = fixture(true, false).await;
        assert!(accepting.service.validate_token(TOKEN));

        let rejecting = fixture(true, true).await;
        assert!(!rejecting.service.validate_token("tampered.jwt.token"));
        assert_eq!(rejecting.issuer.validated.load(Ordering::SeqCst), 1);
    }
}
