//! Who may do what. Reads are open to everyone; writes need an
//! authenticated actor, and writes to an owned resource need its owner or
//! an admin.

use axum::http::Method;
use larder_types::models::{Role, UserId};

use crate::error::ApiError;

/// The user on whose behalf a service call runs.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn is_safe(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD || method == Method::OPTIONS
}

pub fn authorize(actor: Option<&Actor>, owner: Option<UserId>, method: &Method) -> Result<(), ApiError> {
    if is_safe(method) {
        return Ok(());
    }

    let actor = actor.ok_or(ApiError::Unauthorized)?;
    match owner {
        None => Ok(()),
        Some(_) if actor.is_admin() => Ok(()),
        Some(owner) if owner == actor.id => Ok(()),
        Some(_) => Err(ApiError::PermissionDenied),
    }
}

pub fn require_admin(actor: &Actor) -> Result<(), ApiError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ApiError::PermissionDenied)
    }
}
