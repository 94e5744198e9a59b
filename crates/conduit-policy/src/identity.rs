//! Identity verification seam.
//!
//! Token verification itself is owned by an external identity provider;
//! conduit only sees the [`TokenVerifier`] trait.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error type for token verification.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
  #[error("authorization header is missing")]
  MissingHeader,

  #[error("authorization header is malformed: {0}")]
  Malformed(String),

  #[error("token is invalid or expired")]
  InvalidToken,
}

/// The verified caller, attached to the policy context after a successful
/// verification. Read-only downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentitySubject {
  pub claims: Map<String, Value>,
}

impl IdentitySubject {
  pub fn new(claims: Map<String, Value>) -> Self {
    Self { claims }
  }

  pub fn claim(&self, key: &str) -> Option<&Value> {
    self.claims.get(key)
  }

  /// The `sub` claim, when it is a string.
  pub fn subject_id(&self) -> Option<&str> {
    self.claim("sub").and_then(Value::as_str)
  }

  /// Whether the `roles` claim is an array containing `role`.
  pub fn has_role(&self, role: &str) -> bool {
    self
      .claim("roles")
      .and_then(Value::as_array)
      .is_some_and(|roles| roles.iter().any(|r| r.as_str() == Some(role)))
  }
}

/// Verifies the raw `Authorization` header value.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
  /// Fails when the header is absent, malformed, or the token is invalid.
  async fn verify_token(&self, authorization: Option<&str>)
  -> Result<IdentitySubject, IdentityError>;
}

/// Verifier backed by a fixed table of bearer tokens.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
  tokens: HashMap<String, Map<String, Value>>,
}

impl StaticTokenVerifier {
  pub fn new(tokens: HashMap<String, Map<String, Value>>) -> Self {
    Self { tokens }
  }

  pub fn with_token(mut self, token: impl Into<String>, claims: Map<String, Value>) -> Self {
    self.tokens.insert(token.into(), claims);
    self
  }
}

/// Extract the token from a `Bearer <token>` header value.
fn bearer_token(header: &str) -> Result<&str, IdentityError> {
  let (scheme, token) = header
    .trim()
    .split_once(' ')
    .ok_or_else(|| IdentityError::Malformed("expected '<scheme> <token>'".to_string()))?;

  if !scheme.eq_ignore_ascii_case("bearer") {
    return Err(IdentityError::Malformed(format!(
      "unsupported scheme '{}'",
      scheme
    )));
  }

  let token = token.trim();
  if token.is_empty() {
    return Err(IdentityError::Malformed("empty token".to_string()));
  }
  Ok(token)
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
  async fn verify_token(
    &self,
    authorization: Option<&str>,
  ) -> Result<IdentitySubject, IdentityError> {
    let header = authorization.ok_or(IdentityError::MissingHeader)?;
    let token = bearer_token(header)?;

    self
      .tokens
      .get(token)
      .cloned()
      .map(IdentitySubject::new)
      .ok_or(IdentityError::InvalidToken)
  }
}
