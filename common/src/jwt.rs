use actix_web::{HttpMessage, HttpResponse, dev::ServiceRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    env_config::JwtConfig,
    error::{AppError, Res},
    misc::Role,
};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JwtClaims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
}

pub struct ClaimsSpec {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// Generates JWT token based on user identity and JWT configuration options
pub fn generate_jwt(spec: ClaimsSpec, config: &JwtConfig) -> Res<String> {
    let issued_at = Utc::now();
    let expiration = issued_at
        .checked_add_signed(Duration::minutes(config.expiration_minutes))
        .ok_or_else(|| AppError::Internal("JWT expiration overflow".to_string()))?;

    let claims = JwtClaims {
        sub: spec.user_id,
        email: spec.email,
        name: spec.name,
        role: spec.role,
        iat: issued_at.timestamp() as usize,
        exp: expiration.timestamp() as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(AppError::from)
}

/// Extracts claims object from JWT token.
/// Requires JWT secret.
///
/// An expired token yields `TokenExpired`; a bad signature or malformed token
/// yields `TokenInvalid`.
pub fn validate_jwt(token: &str, secret: &str) -> Res<JwtClaims> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    jsonwebtoken::decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|token_data| token_data.claims)
    .map_err(|error| match error.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::TokenInvalid,
    })
}

pub fn get_jwt_claims_or_error(req: &ServiceRequest) -> Result<JwtClaims, HttpResponse> {
    if let Some(jwt_claims_res) = req.extensions().get::<Res<JwtClaims>>() {
        match jwt_claims_res {
            Ok(claims) => Ok(claims.clone()),
            Err(app_error) => Err(app_error.to_http_response()),
        }
    } else {
        Err(AppError::Forbidden("No authorization token provided".to_string()).to_http_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            expiration_minutes: 60,
        }
    }

    fn spec(role: Role) -> ClaimsSpec {
        ClaimsSpec {
            user_id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            role,
        }
    }

    #[test]
    fn issued_token_round_trips_identity_and_role() {
        let spec = spec(Role::Admin);
        let user_id = spec.user_id;
        let token = generate_jwt(spec, &config()).unwrap();

        let claims = validate_jwt(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.name, "Ada");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = generate_jwt(spec(Role::User), &config()).unwrap();
        assert!(matches!(
            validate_jwt(&token, "other-secret"),
            Err(AppError::TokenInvalid)
        ));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(
            validate_jwt("not.a.token", "test-secret"),
            Err(AppError::TokenInvalid)
        ));
    }

    #[test]
    fn past_expiry_is_expired() {
        let now = Utc::now().timestamp() as usize;
        let claims = JwtClaims {
            sub: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            role: Role::User,
            iat: now - 7200,
            exp: now - 10,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(
            validate_jwt(&token, "test-secret"),
            Err(AppError::TokenExpired)
        ));
    }
}
