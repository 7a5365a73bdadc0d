use tracing::{info, warn};

use crate::{
    auth::{
        dto::Credentials,
        jwt::JwtKeys,
        password::{hash_password, verify_dummy, verify_password},
        repo::UserRepo,
        repo_types::User,
    },
    error::AuthError,
};

pub async fn register(users: &dyn UserRepo, creds: &Credentials) -> Result<User, AuthError> {
    if creds.username.is_empty() || creds.password.is_empty() {
        warn!("register with missing fields");
        return Err(AuthError::InvalidInput);
    }

    let hash = hash_password(&creds.password)?;
    let Some(user) = users.create(&creds.username, &hash).await? else {
        warn!(username = %creds.username, "username already registered");
        return Err(AuthError::AlreadyExists);
    };

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Returns a freshly signed bearer token.
pub async fn login(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    creds: &Credentials,
) -> Result<String, AuthError> {
    if creds.username.is_empty() || creds.password.is_empty() {
        warn!("login with missing fields");
        return Err(AuthError::InvalidInput);
    }

    let Some(user) = users.find_by_username(&creds.username).await? else {
        verify_dummy(&creds.password);
        warn!(username = %creds.username, "login unknown username");
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(&creds.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let token = keys.sign(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(token)
}
