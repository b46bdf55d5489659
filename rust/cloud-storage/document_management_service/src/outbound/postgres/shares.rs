//! Share codes and grants

use chrono::{DateTime, Utc};
use model_vault::AccessLevel;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::models::{ShareCode, ShareGrant, ShareResource, ShareResourceType};

const SHARE_CODE_COLUMNS: &str = r#"
    id, code, organization_id, resource_type, resource_id, access_level, created_by,
    expires_at, max_uses, use_count, revoked_at, created_at
"#;

#[derive(sqlx::FromRow)]
struct ShareCodeRow {
    id: Uuid,
    code: String,
    organization_id: Uuid,
    #[sqlx(try_from = "String")]
    resource_type: ShareResourceType,
    resource_id: Uuid,
    #[sqlx(try_from = "String")]
    access_level: AccessLevel,
    created_by: Uuid,
    expires_at: Option<DateTime<Utc>>,
    max_uses: Option<i32>,
    use_count: i32,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ShareCodeRow> for ShareCode {
    fn from(row: ShareCodeRow) -> Self {
        ShareCode {
            id: row.id,
            code: row.code,
            organization_id: row.organization_id,
            resource: ShareResource::new(row.resource_type, row.resource_id),
            access_level: row.access_level,
            created_by: row.created_by,
            expires_at: row.expires_at,
            max_uses: row.max_uses,
            use_count: row.use_count,
            revoked_at: row.revoked_at,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ShareGrantRow {
    user_id: Uuid,
    #[sqlx(try_from = "String")]
    resource_type: ShareResourceType,
    resource_id: Uuid,
    #[sqlx(try_from = "String")]
    access_level: AccessLevel,
    share_code_id: Option<Uuid>,
    granted_at: DateTime<Utc>,
}

impl From<ShareGrantRow> for ShareGrant {
    fn from(row: ShareGrantRow) -> Self {
        ShareGrant {
            user_id: row.user_id,
            resource: ShareResource::new(row.resource_type, row.resource_id),
            access_level: row.access_level,
            share_code_id: row.share_code_id,
            granted_at: row.granted_at,
        }
    }
}

pub async fn insert_share_code(pool: &PgPool, share_code: &ShareCode) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO share_codes (
            id, code, organization_id, resource_type, resource_id, access_level, created_by,
            expires_at, max_uses, use_count, revoked_at, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (code) DO NOTHING
        "#,
    )
    .bind(share_code.id)
    .bind(&share_code.code)
    .bind(share_code.organization_id)
    .bind(share_code.resource.resource_type().as_ref())
    .bind(share_code.resource.id())
    .bind(share_code.access_level.as_ref())
    .bind(share_code.created_by)
    .bind(share_code.expires_at)
    .bind(share_code.max_uses)
    .bind(share_code.use_count)
    .bind(share_code.revoked_at)
    .bind(share_code.created_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn find_share_code(
    pool: &PgPool,
    organization_id: Uuid,
    code: &str,
) -> anyhow::Result<Option<ShareCode>> {
    let row = sqlx::query_as::<_, ShareCodeRow>(&format!(
        "SELECT {SHARE_CODE_COLUMNS} FROM share_codes WHERE organization_id = $1 AND code = $2"
    ))
    .bind(organization_id)
    .bind(code)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Into::into))
}

pub async fn get_share_code(
    pool: &PgPool,
    organization_id: Uuid,
    id: Uuid,
) -> anyhow::Result<Option<ShareCode>> {
    let row = sqlx::query_as::<_, ShareCodeRow>(&format!(
        "SELECT {SHARE_CODE_COLUMNS} FROM share_codes WHERE organization_id = $1 AND id = $2"
    ))
    .bind(organization_id)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Into::into))
}

pub async fn list_share_codes(
    pool: &PgPool,
    organization_id: Uuid,
    resource: ShareResource,
) -> anyhow::Result<Vec<ShareCode>> {
    let rows = sqlx::query_as::<_, ShareCodeRow>(&format!(
        r#"
        SELECT {SHARE_CODE_COLUMNS} FROM share_codes
        WHERE organization_id = $1 AND resource_type = $2 AND resource_id = $3
        ORDER BY created_at DESC
        "#
    ))
    .bind(organization_id)
    .bind(resource.resource_type().as_ref())
    .bind(resource.id())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn revoke_share_code(
    pool: &PgPool,
    organization_id: Uuid,
    id: Uuid,
    at: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE share_codes SET revoked_at = $3
        WHERE organization_id = $1 AND id = $2 AND revoked_at IS NULL
        "#,
    )
    .bind(organization_id)
    .bind(id)
    .bind(at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Consumes one use only while the code is still usable, then upserts the grant keeping the
/// higher access level
#[tracing::instrument(err, skip(pool, grant))]
pub async fn redeem_share_code(
    pool: &PgPool,
    share_code_id: Uuid,
    grant: &ShareGrant,
    at: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;

    let consumed = sqlx::query(
        r#"
        UPDATE share_codes SET use_count = use_count + 1
        WHERE id = $1
          AND revoked_at IS NULL
          AND (expires_at IS NULL OR expires_at > $2)
          AND (max_uses IS NULL OR use_count < max_uses)
        "#,
    )
    .bind(share_code_id)
    .bind(at)
    .execute(&mut *tx)
    .await?;
    if consumed.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO share_grants (
            user_id, resource_type, resource_id, access_level, share_code_id, granted_at
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id, resource_type, resource_id) DO UPDATE SET
            access_level = CASE
                WHEN share_grants.access_level = 'edit' OR EXCLUDED.access_level = 'edit'
                THEN 'edit' ELSE 'view'
            END,
            share_code_id = CASE
                WHEN EXCLUDED.access_level = 'edit' AND share_grants.access_level <> 'edit'
                THEN EXCLUDED.share_code_id ELSE share_grants.share_code_id
            END,
            granted_at = EXCLUDED.granted_at
        "#,
    )
    .bind(grant.user_id)
    .bind(grant.resource.resource_type().as_ref())
    .bind(grant.resource.id())
    .bind(grant.access_level.as_ref())
    .bind(grant.share_code_id)
    .bind(grant.granted_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

pub async fn grants_for_user(pool: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<ShareGrant>> {
    let rows = sqlx::query_as::<_, ShareGrantRow>(
        r#"
        SELECT user_id, resource_type, resource_id, access_level, share_code_id, granted_at
        FROM share_grants
        WHERE user_id = $1
        ORDER BY granted_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}
