//! Login and token authorization

use crate::{
    db::{Context, Runner},
    error::{AppError, AppResult},
    models::user::{LoginRequest, LoginResponse, UserRole},
    repository::users,
};

/// Exchange credentials for the user's token
pub async fn login(run: &mut Runner, ctx: &Context, request: LoginRequest) -> AppResult<LoginResponse> {
    let username = request.username.trim();
    let password = request.password.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::validation("Username or password are empty"));
    }

    let token = users::login(run, ctx, username, password).await.map_err(|e| {
        tracing::warn!("Login query failed for {}: {}", username, e);
        AppError::NotAuthenticated("Failed to login user".to_string())
    })?;

    match token {
        Some(token) if !token.is_empty() => {
            tracing::info!("User {} logged in", username);
            Ok(LoginResponse { token })
        }
        _ => Err(AppError::NotAuthenticated("Invalid username or password".to_string())),
    }
}

/// Role of the user owning `token`
pub async fn authorize_user(run: &mut Runner, ctx: &Context, token: &str) -> AppResult<UserRole> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::validation("Invalid value for token parameter"));
    }

    let role = users::role_for_token(run, ctx, token)
        .await
        .map_err(AppError::database("Failed to authorize user"))?;

    match role {
        UserRole::Unknown => Err(AppError::NotFound("User not found".to_string())),
        role => Ok(role),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fake::FakeDriver;
    use crate::db::{Database, Value};
    use std::sync::Arc;

    fn setup() -> (FakeDriver, Runner) {
        let fake = FakeDriver::default();
        let run = Database::new(Arc::new(fake.clone())).runner();
        (fake, run)
    }

    #[tokio::test]
    async fn test_login_trims_credentials() {
        let (fake, mut run) = setup();
        fake.on_query("crypt($2", &["token"], vec![vec![Value::from("tok")]]);

        let request = LoginRequest {
            username: "  anna ".to_string(),
            password: " secret".to_string(),
        };
        let response = login(&mut run, &Context::background(), request).await.unwrap();
        assert_eq!(response.token, "tok");
        assert_eq!(
            fake.args_of("crypt($2").unwrap(),
            vec![Value::from("anna"), Value::from("secret")]
        );
    }

    #[tokio::test]
    async fn test_login_rejects_empty_credentials_without_query() {
        let (fake, mut run) = setup();
        let request = LoginRequest {
            username: "anna".to_string(),
            password: "   ".to_string(),
        };
        let err = login(&mut run, &Context::background(), request).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest { .. }));
        assert!(fake.events().is_empty());
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let (fake, mut run) = setup();
        fake.on_query("crypt($2", &["token"], vec![]);
        let request = LoginRequest {
            username: "anna".to_string(),
            password: "wrong".to_string(),
        };
        let err = login(&mut run, &Context::background(), request).await.unwrap_err();
        assert!(matches!(err, AppError::NotAuthenticated(_)));
    }

    #[tokio::test]
    async fn test_authorize_unknown_token() {
        let (fake, mut run) = setup();
        fake.on_query("SELECT user_role", &["user_role"], vec![]);
        let err = authorize_user(&mut run, &Context::background(), "nobody").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = authorize_user(&mut run, &Context::background(), " ").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn test_authorize_member() {
        let (fake, mut run) = setup();
        fake.on_query("SELECT user_role", &["user_role"], vec![vec![Value::Integer(1)]]);
        assert_eq!(
            authorize_user(&mut run, &Context::background(), "member-token").await.unwrap(),
            UserRole::Member
        );
    }
}
