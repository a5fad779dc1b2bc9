//! User queries

use crate::{
    args,
    db::{Context, DbResult, Runner},
    models::user::UserRole,
};

/// Token of the user with these credentials
pub async fn login(run: &mut Runner, ctx: &Context, username: &str, password: &str) -> DbResult<Option<String>> {
    let row = run
        .query_row(
            ctx,
            r#"
            SELECT token
            FROM library_user
            WHERE username = $1
            AND user_password = crypt($2, user_password)
            "#,
            &args![username, password],
        )
        .await?;

    match row {
        Some(row) => Ok(Some(row.try_read_string(0)?)),
        None => Ok(None),
    }
}

/// Role of the token's owner, `Unknown` for an unknown token
pub async fn role_for_token(run: &mut Runner, ctx: &Context, token: &str) -> DbResult<UserRole> {
    let row = run
        .query_row(
            ctx,
            "SELECT user_role FROM library_user WHERE token = $1",
            &args![token],
        )
        .await?;

    match row {
        Some(row) => Ok(UserRole::from(row.try_read_i64(0)?)),
        None => Ok(UserRole::Unknown),
    }
}

pub async fn id_for_token(run: &mut Runner, ctx: &Context, token: &str) -> DbResult<Option<String>> {
    let row = run
        .query_row(
            ctx,
            "SELECT user_id::text FROM library_user WHERE token = $1",
            &args![token],
        )
        .await?;

    match row {
        Some(row) => Ok(Some(row.try_read_string(0)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fake::FakeDriver;
    use crate::db::{Database, Value};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_role_for_token() {
        let fake = FakeDriver::default();
        let mut run = Database::new(Arc::new(fake.clone())).runner();
        let ctx = Context::background();

        fake.on_query("SELECT user_role", &["user_role"], vec![vec![Value::Integer(2)]]);
        assert_eq!(role_for_token(&mut run, &ctx, "t").await.unwrap(), UserRole::Librarian);
        assert_eq!(fake.args_of("SELECT user_role").unwrap(), vec![Value::from("t")]);
    }

    #[tokio::test]
    async fn test_unknown_token_has_unknown_role() {
        let fake = FakeDriver::default();
        let mut run = Database::new(Arc::new(fake.clone())).runner();
        fake.on_query("SELECT user_role", &["user_role"], vec![]);
        assert_eq!(
            role_for_token(&mut run, &Context::background(), "nope").await.unwrap(),
            UserRole::Unknown
        );
    }

    #[tokio::test]
    async fn test_login_returns_token() {
        let fake = FakeDriver::default();
        let mut run = Database::new(Arc::new(fake.clone())).runner();
        fake.on_query("crypt($2", &["token"], vec![vec![Value::from("tok")]]);
        assert_eq!(
            login(&mut run, &Context::background(), "anna", "pw").await.unwrap(),
            Some("tok".to_string())
        );
    }
}
