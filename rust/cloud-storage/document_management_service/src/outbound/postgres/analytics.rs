//! Aggregates behind the usage summary

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::models::{
    DailyCount, DepartmentStorage, MimeTypeCount, UploaderStat, UsageFacts,
};

#[derive(sqlx::FromRow)]
struct DocumentTotals {
    document_count: i64,
    total_bytes: i64,
    trashed_count: i64,
}

#[tracing::instrument(err, skip(pool))]
pub async fn usage_facts(
    pool: &PgPool,
    organization_id: Uuid,
    since: DateTime<Utc>,
    top_uploaders: i64,
) -> anyhow::Result<UsageFacts> {
    let totals = sqlx::query_as::<_, DocumentTotals>(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE deleted_at IS NULL) AS document_count,
            COALESCE(SUM(size_bytes) FILTER (WHERE deleted_at IS NULL), 0)::BIGINT AS total_bytes,
            COUNT(*) FILTER (WHERE deleted_at IS NOT NULL) AS trashed_count
        FROM documents
        WHERE organization_id = $1
        "#,
    )
    .bind(organization_id)
    .fetch_one(pool)
    .await?;

    let mime_types = sqlx::query_as::<_, MimeTypeCount>(
        r#"
        SELECT mime_type, COUNT(*) AS count
        FROM documents
        WHERE organization_id = $1 AND deleted_at IS NULL
        GROUP BY mime_type
        ORDER BY mime_type
        "#,
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    let uploads_per_day = sqlx::query_as::<_, DailyCount>(
        r#"
        SELECT (created_at AT TIME ZONE 'UTC')::date AS day, COUNT(*) AS count
        FROM documents
        WHERE organization_id = $1 AND created_at >= $2
        GROUP BY day
        ORDER BY day
        "#,
    )
    .bind(organization_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    let active_users: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT user_id)
        FROM audit_logs
        WHERE organization_id = $1 AND created_at >= $2
        "#,
    )
    .bind(organization_id)
    .bind(since)
    .fetch_one(pool)
    .await?;

    let top_uploaders = sqlx::query_as::<_, UploaderStat>(
        r#"
        SELECT u.id AS user_id, u.full_name, COUNT(d.id) AS document_count,
               COALESCE(SUM(d.size_bytes), 0)::BIGINT AS total_bytes
        FROM documents d
        JOIN users u ON u.id = d.owner_id
        WHERE d.organization_id = $1 AND d.deleted_at IS NULL
        GROUP BY u.id, u.full_name
        ORDER BY document_count DESC, total_bytes DESC
        LIMIT $2
        "#,
    )
    .bind(organization_id)
    .bind(top_uploaders)
    .fetch_all(pool)
    .await?;

    let storage_by_department = sqlx::query_as::<_, DepartmentStorage>(
        r#"
        SELECT dep.id AS department_id, dep.name AS department_name,
               COUNT(d.id) AS document_count,
               COALESCE(SUM(d.size_bytes), 0)::BIGINT AS total_bytes
        FROM documents d
        LEFT JOIN employee_profiles p ON p.user_id = d.owner_id
        LEFT JOIN departments dep ON dep.id = p.department_id
        WHERE d.organization_id = $1 AND d.deleted_at IS NULL
        GROUP BY dep.id, dep.name
        ORDER BY total_bytes DESC
        "#,
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    let folder_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders WHERE organization_id = $1")
        .bind(organization_id)
        .fetch_one(pool)
        .await?;

    let active_share_codes: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM share_codes
        WHERE organization_id = $1
          AND revoked_at IS NULL
          AND (expires_at IS NULL OR expires_at > now())
        "#,
    )
    .bind(organization_id)
    .fetch_one(pool)
    .await?;

    Ok(UsageFacts {
        document_count: totals.document_count,
        total_bytes: totals.total_bytes,
        trashed_count: totals.trashed_count,
        mime_types,
        uploads_per_day,
        active_users,
        top_uploaders,
        storage_by_department,
        folder_count,
        active_share_codes,
    })
}
