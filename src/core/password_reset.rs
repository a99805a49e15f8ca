//! Forgot-password tokens.
//!
//! A token is stored first and then mailed. If the mail cannot be sent the token
//! is deleted again, so no usable token exists that its owner never received.

use crate::{
    entities::{PasswordResetToken, password_reset_token},
    errors::{Error, Result},
    services::{Clock, Notifier},
};
use chrono::Duration;
use sea_orm::{Set, prelude::*};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

const RESET_SUBJECT: &str = "Reset your password";
const RESET_TEMPLATE: &str = "Hello {{email}},\n\n\
    Use this code to reset your password: {{token}}\n\
    The code expires at {{expires_at}}.";

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(Error::bad_request(format!("Invalid email address: {email}"))),
    }
}

/// Issues a token for `email` valid for `ttl` and mails it. Earlier tokens for
/// the same address are discarded.
///
/// # Errors
/// - `BadRequest` for a malformed address
/// - `InternalError` if the mail could not be sent; the token is removed
#[instrument(skip(db, clock, notifier))]
pub async fn request_password_reset(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    notifier: &dyn Notifier,
    ttl: Duration,
    email: &str,
) -> Result<password_reset_token::Model> {
    let email = normalize_email(email)?;
    let now = clock.now();

    PasswordResetToken::delete_many()
        .filter(password_reset_token::Column::Email.eq(email.as_str()))
        .exec(db)
        .await?;

    let token = password_reset_token::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.clone()),
        token: Set(Uuid::new_v4().simple().to_string()),
        expires_at: Set(now + ttl),
        created_at: Set(now),
    }
    .insert(db)
    .await?;

    let vars = HashMap::from([
        ("email".to_string(), email.clone()),
        ("token".to_string(), token.token.clone()),
        ("expires_at".to_string(), token.expires_at.to_rfc3339()),
    ]);

    if let Err(e) = notifier
        .send_templated(RESET_SUBJECT, RESET_TEMPLATE, &email, &vars)
        .await
    {
        warn!(error = %e, "reset mail failed, removing token");
        PasswordResetToken::delete_by_id(token.id).exec(db).await?;
        return Err(Error::Internal {
            message: format!("Failed to send password reset mail: {e}"),
        });
    }

    info!(token_id = %token.id, "password reset requested");
    Ok(token)
}

/// Looks up a token that has not expired. Expired tokens are removed.
///
/// # Errors
/// - `NotFound` for an unknown token
/// - `BadRequest` for an expired token
pub async fn verify_reset_token(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    token: &str,
) -> Result<password_reset_token::Model> {
    let found = PasswordResetToken::find()
        .filter(password_reset_token::Column::Token.eq(token))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Password reset token", token))?;

    if found.expires_at <= clock.now() {
        PasswordResetToken::delete_by_id(found.id).exec(db).await?;
        return Err(Error::bad_request("Password reset token has expired"));
    }
    Ok(found)
}

/// Verifies the token and deletes it, returning the email it was issued for.
pub async fn consume_reset_token(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    token: &str,
) -> Result<String> {
    let found = verify_reset_token(db, clock, token).await?;
    PasswordResetToken::delete_by_id(found.id).exec(db).await?;
    info!(token_id = %found.id, "password reset token used");
    Ok(found.email)
}
