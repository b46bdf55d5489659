//! The audit log

use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::models::{AuditLog, AuditQuery};

pub async fn insert_audit_log(pool: &PgPool, log: &AuditLog) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (
            id, organization_id, user_id, action, entity_type, entity_id, metadata, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(log.id)
    .bind(log.organization_id)
    .bind(log.user_id)
    .bind(log.action.as_ref())
    .bind(log.entity_type.as_ref())
    .bind(log.entity_id)
    .bind(&log.metadata)
    .bind(log.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn query_audit_logs(
    pool: &PgPool,
    organization_id: Uuid,
    query: &AuditQuery,
) -> anyhow::Result<(Vec<AuditLog>, i64)> {
    let pagination = query.pagination();

    let mut select: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT id, organization_id, user_id, action, entity_type, entity_id, metadata, created_at \
         FROM audit_logs",
    );
    push_filters(&mut select, organization_id, query);
    select.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    select.push_bind(pagination.limit());
    select.push(" OFFSET ");
    select.push_bind(pagination.offset());
    let logs = select.build_query_as::<AuditLog>().fetch_all(pool).await?;

    let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM audit_logs");
    push_filters(&mut count, organization_id, query);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    Ok((logs, total))
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, organization_id: Uuid, query: &AuditQuery) {
    builder.push(" WHERE organization_id = ");
    builder.push_bind(organization_id);

    if let Some(user_id) = query.user_id {
        builder.push(" AND user_id = ");
        builder.push_bind(user_id);
    }
    if let Some(action) = query.action {
        builder.push(" AND action = ");
        builder.push_bind(action.to_string());
    }
    if let Some(entity_type) = query.entity_type {
        builder.push(" AND entity_type = ");
        builder.push_bind(entity_type.to_string());
    }
    if let Some(from) = query.from {
        builder.push(" AND created_at >= ");
        builder.push_bind(from);
    }
    if let Some(to) = query.to {
        builder.push(" AND created_at < ");
        builder.push_bind(to);
    }
}
