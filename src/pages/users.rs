//! Admin user management posts.
//!
//! These paths are deliberately not in the protected route table
//! (matching the shipped configuration); the handlers enforce admin
//! status themselves from the middleware-attached identity.

use axum::{
    Extension, Form, Router,
    extract::Path,
    response::Response,
    routing::post,
};
use serde::Deserialize;

use super::{PageError, ResultExt, redirect_with_flash};
use crate::auth::{CurrentUser, FlashMessage};
use crate::db::DbSession;

const USERS_PAGE: &str = "/dashboard/users";

pub fn router() -> Router {
    Router::new()
        .route("/{id}/edit", post(edit_user))
        .route("/{id}/delete", post(delete_user))
}

#[derive(Deserialize)]
struct EditUserForm {
    email: Option<String>,
    is_active: Option<bool>,
    is_approved: Option<bool>,
    is_admin: Option<bool>,
}

fn users_redirect(message: Option<FlashMessage>) -> Response {
    match message {
        Some(message) => redirect_with_flash(USERS_PAGE, message),
        None => redirect_with_flash(
            USERS_PAGE,
            FlashMessage::success("User updated successfully"),
        ),
    }
}

async fn edit_user(
    Extension(db): Extension<DbSession>,
    Path(id): Path<String>,
    CurrentUser(current): CurrentUser,
    Form(form): Form<EditUserForm>,
) -> Result<Response, PageError> {
    if !current.is_admin {
        return Ok(users_redirect(Some(FlashMessage::error(
            "Administrator access required",
        ))));
    }

    let Some(mut user) = db
        .find_user_by_id(&id)
        .await
        .db_err("Failed to look up user")?
    else {
        return Ok(users_redirect(Some(FlashMessage::error("User does not exist"))));
    };

    if let Some(email) = form.email {
        if !email.is_empty() && email != user.email {
            let taken = db
                .find_user_by_email(&email)
                .await
                .db_err("Failed to check email")?;
            if taken.is_some() {
                return Ok(users_redirect(Some(FlashMessage::error(
                    "Email already in use",
                ))));
            }
            user.email = email;
        }
    }
    if let Some(active) = form.is_active {
        user.is_active = active;
    }
    if let Some(approved) = form.is_approved {
        user.is_approved = approved;
    }
    if let Some(admin) = form.is_admin {
        user.is_admin = admin;
    }

    db.update_user(&user).await.db_err("Failed to update user")?;

    Ok(users_redirect(None))
}

async fn delete_user(
    Extension(db): Extension<DbSession>,
    Path(id): Path<String>,
    CurrentUser(current): CurrentUser,
) -> Result<Response, PageError> {
    if !current.is_admin {
        return Ok(users_redirect(Some(FlashMessage::error(
            "Administrator access required",
        ))));
    }

    let deleted = db.delete_user(&id).await.db_err("Failed to delete user")?;
    if !deleted {
        return Ok(users_redirect(Some(FlashMessage::error("User does not exist"))));
    }

    Ok(users_redirect(Some(FlashMessage::success(
        "User deleted successfully",
    ))))
}
