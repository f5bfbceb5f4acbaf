use actix_web::{Responder, post, web};
use common::{error::Res, http::Success};
use validator::Validate;

use crate::{
    dtos::auth::{ForgotPasswordRequest, LoginRequest, ResetPasswordRequest},
    services::auth::AuthService,
};

/// Authenticates a user with email and password.
///
/// # Input
/// - `login_data`: JSON payload containing email and password
/// - `auth`: Login and reset service
///
/// # Output
/// - Success: Returns `{ token, user }` where `user` carries no credential fields
/// - Error: 403 for unknown email or wrong password, 429 after too many attempts
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/v1/auth/login', {
///   method: 'POST',
///   headers: { 'Content-Type': 'application/json' },
///   body: JSON.stringify({ email: 'user@example.com', password: 'securepassword' })
/// });
///
/// if (response.ok) {
///   const { token, user } = await response.json();
///   localStorage.setItem('authToken', token);
/// }
/// ```
#[post("/login")]
pub async fn post_login(
    login_data: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
) -> Res<impl Responder> {
    let login_data = login_data.into_inner();
    login_data.validate()?;
    Success::ok(auth.login(login_data).await?)
}

/// Requests a password reset secret for the given email.
///
/// # Output
/// - Always the same message, whether or not the email is registered
/// - Error: 429 after too many requests for the same email
#[post("/forgot-password")]
pub async fn post_forgot_password(
    req: web::Json<ForgotPasswordRequest>,
    auth: web::Data<AuthService>,
) -> Res<impl Responder> {
    let req = req.into_inner();
    req.validate()?;
    Success::ok(auth.forgot_password(req).await?)
}

/// Redeems a reset secret and sets a new password.
///
/// # Output
/// - Success: `{ "message": "Password reset successfully!" }`
/// - Error: 400 `Invalid or expired token` for a wrong or expired secret
#[post("/reset-password")]
pub async fn post_reset_password(
    req: web::Json<ResetPasswordRequest>,
    auth: web::Data<AuthService>,
) -> Res<impl Responder> {
    let req = req.into_inner();
    req.validate()?;
    Success::ok(auth.reset_password(req).await?)
}
