use actix_web::{Responder, delete, get, post, put, web};
use common::{error::Res, http::Success, jwt::JwtClaims};
use validator::Validate;

use crate::{
    dtos::user::{ChangePasswordRequest, RegisterRequest, UpdateUserRequest},
    policy::Actor,
    services::user::UserService,
};

/// Registers a new account. The role is always USER.
///
/// # Input
/// - `req`: JSON payload with `name`, `email` and `password`
///
/// # Output
/// - Success: 201 Created with the public user fields
/// - Error: 409 Conflict if the email is already registered, 400 on invalid input
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/v1/user/register', {
///   method: 'POST',
///   headers: { 'Content-Type': 'application/json' },
///   body: JSON.stringify({ name: 'John Doe', email: 'user@example.com', password: 'securepassword' })
/// });
/// ```
#[post("/register")]
pub async fn post_register(
    req: web::Json<RegisterRequest>,
    users: web::Data<UserService>,
) -> Res<impl Responder> {
    let req = req.into_inner();
    req.validate()?;
    Success::created(users.register(req).await?)
}

/// Endpoint to retrieve the current authenticated user's profile,
/// including a subscription summary when one exists.
///
/// # Input
/// - `claims`: The JWT claims extracted from the authentication token
///
/// # Output
/// - Success: Returns a JSON object with the user's profile information
/// - Error: 403 if no valid token is provided, 404 if the account no longer exists
#[get("/profile")]
pub async fn get_profile(
    claims: web::ReqData<JwtClaims>,
    users: web::Data<UserService>,
) -> Res<impl Responder> {
    let actor = Actor::from(&*claims);
    Success::ok(users.get_profile(&actor).await?)
}

/// Updates the caller's own profile. Only `name` is accepted from non-admins;
/// a request carrying `email` or `role` is rejected as a whole.
#[put("/profile")]
pub async fn put_profile(
    claims: web::ReqData<JwtClaims>,
    req: web::Json<UpdateUserRequest>,
    users: web::Data<UserService>,
) -> Res<impl Responder> {
    let actor = Actor::from(&*claims);
    let req = req.into_inner();
    req.validate()?;
    Success::ok(users.update_user(&actor, actor.id, req).await?)
}

#[put("/change-password")]
pub async fn put_change_password(
    claims: web::ReqData<JwtClaims>,
    req: web::Json<ChangePasswordRequest>,
    users: web::Data<UserService>,
) -> Res<impl Responder> {
    let actor = Actor::from(&*claims);
    let req = req.into_inner();
    req.validate()?;
    Success::ok(users.change_password(&actor, actor.id, req).await?)
}

/// Deletes the caller's account together with its subscription.
#[delete("/account")]
pub async fn delete_account(
    claims: web::ReqData<JwtClaims>,
    users: web::Data<UserService>,
) -> Res<impl Responder> {
    let actor = Actor::from(&*claims);
    Success::ok(users.delete_account(&actor).await?)
}
