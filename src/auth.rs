// ABOUTME: JWT-based tenant authentication for the session/credential boundary
// ABOUTME: Issues and validates HS256 tokens carrying the verified tenant id
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Authentication
//!
//! The workflow trusts the [`TenantId`] extracted here completely and never
//! re-derives it from request content; this module is the only place a
//! tenant identity is established.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::errors::{AppError, AppResult};
use crate::models::TenantId;

/// Token issuer name
const ISSUER: &str = "lumen-insights";
/// Clock skew tolerance for expiry checks
const LEEWAY_SECS: u64 = 60;

/// `JWT` claims carried by an access token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Tenant the caller's data belongs to
    pub tenant_id: String,
    /// Username, kept alongside `sub` for display
    pub username: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Token issuer
    pub iss: String,
}

/// Issues and validates access tokens.
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_hours: i64,
}

impl AuthManager {
    /// Create a manager from the auth configuration
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            expiry_hours: config.expiry_hours,
        }
    }

    /// Generate an access token binding a username to its tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if token encoding fails.
    pub fn generate_token(&self, username: &str, tenant_id: &TenantId) -> AppResult<String> {
        let now = Utc::now();
        let expiry = now + Duration::hours(self.expiry_hours);

        let claims = Claims {
            sub: username.to_owned(),
            tenant_id: tenant_id.as_str().to_owned(),
            username: username.to_owned(),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
            iss: ISSUER.to_owned(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to encode token: {e}")))
    }

    /// Validate a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid` when the signature, expiry, or shape is wrong.
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;
        validation.validate_aud = false;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::auth_invalid(format!("Invalid token: {e}")))
    }

    /// Extract the verified tenant id from a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid` when the token is invalid or carries no tenant.
    pub fn tenant_from_token(&self, token: &str) -> AppResult<TenantId> {
        let claims = self.validate_token(token)?;
        if claims.tenant_id.is_empty() {
            return Err(AppError::auth_invalid("Token missing tenant_id"));
        }
        Ok(TenantId::from(claims.tenant_id))
    }

    /// Extract the verified tenant id from a `Bearer` authorization header.
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid` when the header is missing the scheme or the
    /// token fails validation.
    pub fn tenant_from_bearer(&self, authorization: &str) -> AppResult<TenantId> {
        let token = authorization
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::auth_invalid("Missing Bearer authorization"))?;
        self.tenant_from_token(token)
    }
}
