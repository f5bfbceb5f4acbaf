use actix_web::{Responder, delete, get, post, put, web};
use common::{error::Res, http::Success, jwt::JwtClaims, misc::parse_id};
use validator::Validate;

use crate::{
    dtos::user::{
        ChangePasswordRequest, CreateUserRequest, RegisterRequest, RoleQuery, UpdateUserRequest,
    },
    policy::Actor,
    services::user::UserService,
};

/// Lists accounts, optionally filtered with `?role=ADMIN` or `?role=USER`.
///
/// # Output
/// - Success: array of public user objects
/// - Error: 401 if the caller is not an administrator
#[get("")]
pub async fn get_users(
    claims: web::ReqData<JwtClaims>,
    query: web::Query<RoleQuery>,
    users: web::Data<UserService>,
) -> Res<impl Responder> {
    let actor = Actor::from(&*claims);
    Success::ok(users.list_users(&actor, query.role).await?)
}

#[post("")]
pub async fn post_user(
    claims: web::ReqData<JwtClaims>,
    req: web::Json<CreateUserRequest>,
    users: web::Data<UserService>,
) -> Res<impl Responder> {
    let actor = Actor::from(&*claims);
    let req = req.into_inner();
    req.validate()?;
    Success::created(users.create_user(&actor, req).await?)
}

#[post("/admin")]
pub async fn post_admin(
    claims: web::ReqData<JwtClaims>,
    req: web::Json<RegisterRequest>,
    users: web::Data<UserService>,
) -> Res<impl Responder> {
    let actor = Actor::from(&*claims);
    let req = req.into_inner();
    req.validate()?;
    Success::created(users.create_admin(&actor, req).await?)
}

/// # Output
/// - Success: the user, with subscription summary
/// - Error: 400 for a malformed id, 401 for non-admins, 404 if absent
#[get("/{id}")]
pub async fn get_user(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<String>,
    users: web::Data<UserService>,
) -> Res<impl Responder> {
    let actor = Actor::from(&*claims);
    let id = parse_id(&path)?;
    Success::ok(users.get_user(&actor, id).await?)
}

#[put("/{id}")]
pub async fn put_user(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<String>,
    req: web::Json<UpdateUserRequest>,
    users: web::Data<UserService>,
) -> Res<impl Responder> {
    let actor = Actor::from(&*claims);
    let id = parse_id(&path)?;
    let req = req.into_inner();
    req.validate()?;
    Success::ok(users.update_user(&actor, id, req).await?)
}

/// Sets another user's password without the current one.
#[put("/{id}/password")]
pub async fn put_user_password(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<String>,
    req: web::Json<ChangePasswordRequest>,
    users: web::Data<UserService>,
) -> Res<impl Responder> {
    let actor = Actor::from(&*claims);
    let id = parse_id(&path)?;
    let req = req.into_inner();
    req.validate()?;
    Success::ok(users.change_password(&actor, id, req).await?)
}

/// # Output
/// - Error: 409 if the user is already an administrator
#[post("/{id}/promote")]
pub async fn post_promote(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<String>,
    users: web::Data<UserService>,
) -> Res<impl Responder> {
    let actor = Actor::from(&*claims);
    let id = parse_id(&path)?;
    Success::ok(users.promote_to_admin(&actor, id).await?)
}

#[post("/{id}/demote")]
pub async fn post_demote(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<String>,
    users: web::Data<UserService>,
) -> Res<impl Responder> {
    let actor = Actor::from(&*claims);
    let id = parse_id(&path)?;
    Success::ok(users.demote_to_user(&actor, id).await?)
}

#[delete("/{id}")]
pub async fn delete_user(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<String>,
    users: web::Data<UserService>,
) -> Res<impl Responder> {
    let actor = Actor::from(&*claims);
    let id = parse_id(&path)?;
    Success::ok(users.delete_user(&actor, id).await?)
}
