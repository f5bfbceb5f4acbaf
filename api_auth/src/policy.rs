//! Account authorization decisions.
//!
//! Every rule lives in [`POLICY`]; anything not listed there is denied.
//! Decisions depend only on the actor, the target id and the operation, so
//! they are made before any storage lookup.

use common::{
    error::{AppError, Res},
    jwt::JwtClaims,
    misc::Role,
};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListUsers,
    ReadProfile,
    CreateUser,
    /// Editing the name of a profile; the baseline for any profile update.
    UpdateProfile,
    UpdateEmailOrRole,
    ChangePassword,
    PromoteUser,
    DemoteUser,
    DeleteUser,
    DeleteOwnAccount,
}

impl Operation {
    fn denial(self) -> &'static str {
        match self {
            Operation::ListUsers => "Only administrators can list users",
            Operation::ReadProfile => "Users can only view their own profile",
            Operation::CreateUser => "Only administrators can create users",
            Operation::UpdateProfile => "Users can only update their own profile",
            Operation::UpdateEmailOrRole => "Users can only update their name",
            Operation::ChangePassword => "Users can only change their own password",
            Operation::PromoteUser => "Only administrators can promote users to admin",
            Operation::DemoteUser => "Only administrators can demote administrators",
            Operation::DeleteUser => "Only administrators can delete users",
            Operation::DeleteOwnAccount => "Users can only delete their own account",
        }
    }
}

/// How the target of an operation relates to the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    Own,
    Other,
    /// The operation has no single target (listing, creating).
    Unscoped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Actor { id, role }
    }

    fn relationship(&self, target: Option<Uuid>) -> Relationship {
        match target {
            Some(id) if id == self.id => Relationship::Own,
            Some(_) => Relationship::Other,
            None => Relationship::Unscoped,
        }
    }
}

impl From<&JwtClaims> for Actor {
    fn from(claims: &JwtClaims) -> Self {
        Actor::new(claims.sub, claims.role)
    }
}

use Operation::*;
use Relationship::*;
use Role::{Admin, User};

/// Allowed (operation, role, relationship) triples.
pub const POLICY: &[(Operation, Role, Relationship)] = &[
    (ListUsers, Admin, Unscoped),
    (ReadProfile, Admin, Own),
    (ReadProfile, Admin, Other),
    (ReadProfile, User, Own),
    (CreateUser, Admin, Unscoped),
    (UpdateProfile, Admin, Own),
    (UpdateProfile, Admin, Other),
    (UpdateProfile, User, Own),
    (UpdateEmailOrRole, Admin, Own),
    (UpdateEmailOrRole, Admin, Other),
    (ChangePassword, Admin, Own),
    (ChangePassword, Admin, Other),
    (ChangePassword, User, Own),
    (PromoteUser, Admin, Own),
    (PromoteUser, Admin, Other),
    (DemoteUser, Admin, Own),
    (DemoteUser, Admin, Other),
    (DeleteUser, Admin, Own),
    (DeleteUser, Admin, Other),
    (DeleteOwnAccount, Admin, Own),
    (DeleteOwnAccount, User, Own),
];

pub fn decide(operation: Operation, actor: &Actor, target: Option<Uuid>) -> Decision {
    let relationship = actor.relationship(target);
    let allowed = POLICY
        .iter()
        .any(|&(op, role, rel)| op == operation && role == actor.role && rel == relationship);

    if allowed { Decision::Allow } else { Decision::Deny }
}

/// Fails with `Unauthorized` unless the policy allows the operation.
pub fn authorize(operation: Operation, actor: &Actor, target: Option<Uuid>) -> Res<()> {
    match decide(operation, actor, target) {
        Decision::Allow => Ok(()),
        Decision::Deny => Err(AppError::Unauthorized(operation.denial().to_string())),
    }
}

/// Fields a profile update asks to change.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestedFields {
    pub name: bool,
    pub email: bool,
    pub role: bool,
}

/// Authorizes a profile update as a whole: if any requested field is not
/// allowed, the entire request is rejected.
pub fn authorize_update(actor: &Actor, target: Uuid, fields: RequestedFields) -> Res<()> {
    authorize(UpdateProfile, actor, Some(target))?;
    if fields.email || fields.role {
        authorize(UpdateEmailOrRole, actor, Some(target))?;
    }
    Ok(())
}

/// A password change on one's own account must prove knowledge of the
/// current password; an administrator resetting someone else's does not.
pub fn requires_current_password(actor: &Actor, target: Uuid) -> bool {
    actor.relationship(Some(target)) == Own
}
