//! Organizations and user accounts

use chrono::{DateTime, Utc};
use model_vault::{Pagination, Role};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::models::{Organization, User, UserCredentials};

const USER_COLUMNS: &str = r#"
    id, organization_id, email, full_name, role, is_active, created_at, updated_at, last_login_at
"#;

#[derive(sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: User,
    password_hash: String,
}

impl From<CredentialsRow> for UserCredentials {
    fn from(row: CredentialsRow) -> Self {
        UserCredentials {
            user: row.user,
            password_hash: row.password_hash,
        }
    }
}

#[tracing::instrument(err, skip(pool, organization, admin, password_hash))]
pub async fn create_organization(
    pool: &PgPool,
    organization: &Organization,
    admin: &User,
    password_hash: &str,
) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES ($1, $2, $3)")
        .bind(organization.id)
        .bind(&organization.name)
        .bind(organization.created_at)
        .execute(&mut *tx)
        .await?;

    insert_user_with(&mut *tx, admin, password_hash).await?;

    tx.commit().await?;
    Ok(())
}

pub async fn get_organization(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<Organization>> {
    let organization = sqlx::query_as::<_, Organization>(
        "SELECT id, name, created_at FROM organizations WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(organization)
}

pub async fn email_exists(pool: &PgPool, email: &str) -> anyhow::Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

pub async fn find_credentials_by_email(
    pool: &PgPool,
    email: &str,
) -> anyhow::Result<Option<UserCredentials>> {
    let row = sqlx::query_as::<_, CredentialsRow>(&format!(
        "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Into::into))
}

pub async fn get_credentials(
    pool: &PgPool,
    organization_id: Uuid,
    user_id: Uuid,
) -> anyhow::Result<Option<UserCredentials>> {
    let row = sqlx::query_as::<_, CredentialsRow>(&format!(
        "SELECT {USER_COLUMNS}, password_hash FROM users WHERE organization_id = $1 AND id = $2"
    ))
    .bind(organization_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Into::into))
}

pub async fn get_user(
    pool: &PgPool,
    organization_id: Uuid,
    user_id: Uuid,
) -> anyhow::Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE organization_id = $1 AND id = $2"
    ))
    .bind(organization_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn insert_user(pool: &PgPool, user: &User, password_hash: &str) -> anyhow::Result<()> {
    let mut conn = pool.acquire().await?;
    insert_user_with(&mut *conn, user, password_hash).await
}

async fn insert_user_with(
    conn: &mut sqlx::PgConnection,
    user: &User,
    password_hash: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (
            id, organization_id, email, full_name, password_hash, role, is_active,
            created_at, updated_at, last_login_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(user.id)
    .bind(user.organization_id)
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(password_hash)
    .bind(user.role.as_ref())
    .bind(user.is_active)
    .bind(user.created_at)
    .bind(user.updated_at)
    .bind(user.last_login_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_user(pool: &PgPool, user: &User) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET full_name = $3, role = $4, is_active = $5, updated_at = $6
        WHERE organization_id = $1 AND id = $2
        "#,
    )
    .bind(user.organization_id)
    .bind(user.id)
    .bind(&user.full_name)
    .bind(user.role.as_ref())
    .bind(user.is_active)
    .bind(user.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_password_hash(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
    at: DateTime<Utc>,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
        .bind(user_id)
        .bind(password_hash)
        .bind(at)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn record_login(pool: &PgPool, user_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
    sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
        .bind(user_id)
        .bind(at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Hands documents, folders and share codes to `successor_id`, then removes the account.
/// Profiles and grants go with it through their foreign keys.
#[tracing::instrument(err, skip(pool))]
pub async fn delete_user(
    pool: &PgPool,
    organization_id: Uuid,
    user_id: Uuid,
    successor_id: Uuid,
) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM users WHERE organization_id = $1 AND id = $2)",
    )
    .bind(organization_id)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;
    if !exists {
        return Ok(false);
    }

    for statement in [
        "UPDATE documents SET owner_id = $2 WHERE owner_id = $1",
        "UPDATE folders SET owner_id = $2 WHERE owner_id = $1",
        "UPDATE share_codes SET created_by = $2 WHERE created_by = $1",
    ] {
        sqlx::query(statement)
            .bind(user_id)
            .bind(successor_id)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

pub async fn list_users(
    pool: &PgPool,
    organization_id: Uuid,
    pagination: &Pagination,
) -> anyhow::Result<(Vec<User>, i64)> {
    let users = sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {USER_COLUMNS} FROM users
        WHERE organization_id = $1
        ORDER BY full_name, id
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(organization_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE organization_id = $1")
        .bind(organization_id)
        .fetch_one(pool)
        .await?;

    Ok((users, total))
}

pub async fn count_active_admins(pool: &PgPool, organization_id: Uuid) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE organization_id = $1 AND role = $2 AND is_active",
    )
    .bind(organization_id)
    .bind(Role::Admin.as_ref())
    .fetch_one(pool)
    .await?;
    Ok(count)
}
