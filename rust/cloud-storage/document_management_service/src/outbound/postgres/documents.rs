//! Documents, their tags and search

use chrono::{DateTime, Utc};
use model_vault::Pagination;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::models::{Document, DocumentQuery, DocumentSort, Tag};

/// Selects a full [Document] from `documents d`, tags included
const DOCUMENT_COLUMNS: &str = r#"
    d.id, d.organization_id, d.owner_id, d.folder_id, d.title, d.description,
    d.original_filename, d.mime_type, d.size_bytes, d.checksum, d.storage_key,
    ARRAY(
        SELECT t.name FROM document_tags dt
        JOIN tags t ON t.id = dt.tag_id
        WHERE dt.document_id = d.id
        ORDER BY t.name
    ) AS tags,
    d.created_at, d.updated_at, d.deleted_at
"#;

#[tracing::instrument(err, skip(pool, document), fields(document_id=%document.id))]
pub async fn insert_document(pool: &PgPool, document: &Document) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO documents (
            id, organization_id, owner_id, folder_id, title, description, original_filename,
            mime_type, size_bytes, checksum, storage_key, created_at, updated_at, deleted_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(document.id)
    .bind(document.organization_id)
    .bind(document.owner_id)
    .bind(document.folder_id)
    .bind(&document.title)
    .bind(&document.description)
    .bind(&document.original_filename)
    .bind(&document.mime_type)
    .bind(document.size_bytes)
    .bind(&document.checksum)
    .bind(&document.storage_key)
    .bind(document.created_at)
    .bind(document.updated_at)
    .bind(document.deleted_at)
    .execute(&mut *tx)
    .await?;

    set_tags(&mut *tx, document).await?;

    tx.commit().await?;
    Ok(())
}

/// Replaces the tag links of a document, creating tags on first use
async fn set_tags(conn: &mut PgConnection, document: &Document) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM document_tags WHERE document_id = $1")
        .bind(document.id)
        .execute(&mut *conn)
        .await?;

    for name in &document.tags {
        let tag_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO tags (id, organization_id, name) VALUES ($1, $2, $3)
            ON CONFLICT (organization_id, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(document.organization_id)
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

        sqlx::query(
            "INSERT INTO document_tags (document_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(document.id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn get_document(
    pool: &PgPool,
    organization_id: Uuid,
    id: Uuid,
) -> anyhow::Result<Option<Document>> {
    let document = sqlx::query_as::<_, Document>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.organization_id = $1 AND d.id = $2"
    ))
    .bind(organization_id)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(document)
}

pub async fn update_document(pool: &PgPool, document: &Document) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE documents
        SET title = $3, description = $4, folder_id = $5, updated_at = $6
        WHERE organization_id = $1 AND id = $2
        "#,
    )
    .bind(document.organization_id)
    .bind(document.id)
    .bind(&document.title)
    .bind(&document.description)
    .bind(document.folder_id)
    .bind(document.updated_at)
    .execute(&mut *tx)
    .await?;

    set_tags(&mut *tx, document).await?;

    tx.commit().await?;
    Ok(())
}

pub async fn set_deleted(
    pool: &PgPool,
    organization_id: Uuid,
    id: Uuid,
    deleted_at: Option<DateTime<Utc>>,
    folder_id: Option<Uuid>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE documents SET deleted_at = $3, folder_id = $4
        WHERE organization_id = $1 AND id = $2
        "#,
    )
    .bind(organization_id)
    .bind(id)
    .bind(deleted_at)
    .bind(folder_id)
    .execute(pool)
    .await?;
    Ok(())
}

#[tracing::instrument(err, skip(pool))]
pub async fn purge_document(pool: &PgPool, organization_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;

    for statement in [
        "DELETE FROM share_grants WHERE resource_type = 'document' AND resource_id = $1",
        "DELETE FROM share_codes WHERE resource_type = 'document' AND resource_id = $1",
    ] {
        sqlx::query(statement).bind(id).execute(&mut *tx).await?;
    }

    // tag links go through ON DELETE CASCADE
    let result = sqlx::query("DELETE FROM documents WHERE organization_id = $1 AND id = $2")
        .bind(organization_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_trash(
    pool: &PgPool,
    organization_id: Uuid,
    owner_id: Option<Uuid>,
    pagination: &Pagination,
) -> anyhow::Result<(Vec<Document>, i64)> {
    let documents = sqlx::query_as::<_, Document>(&format!(
        r#"
        SELECT {DOCUMENT_COLUMNS} FROM documents d
        WHERE d.organization_id = $1
          AND d.deleted_at IS NOT NULL
          AND ($2::uuid IS NULL OR d.owner_id = $2)
        ORDER BY d.deleted_at DESC, d.id
        LIMIT $3 OFFSET $4
        "#
    ))
    .bind(organization_id)
    .bind(owner_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM documents
        WHERE organization_id = $1
          AND deleted_at IS NOT NULL
          AND ($2::uuid IS NULL OR owner_id = $2)
        "#,
    )
    .bind(organization_id)
    .bind(owner_id)
    .fetch_one(pool)
    .await?;

    Ok((documents, total))
}

#[tracing::instrument(err, skip(pool))]
pub async fn search_documents(
    pool: &PgPool,
    query: &DocumentQuery,
) -> anyhow::Result<(Vec<Document>, i64)> {
    let mut select: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {DOCUMENT_COLUMNS} FROM documents d"));
    push_filters(&mut select, query);
    select.push(" ORDER BY ");
    select.push(order_by(query.sort));
    select.push(", d.id LIMIT ");
    select.push_bind(query.limit);
    select.push(" OFFSET ");
    select.push_bind(query.offset);

    let documents = select
        .build_query_as::<Document>()
        .fetch_all(pool)
        .await?;

    let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM documents d");
    push_filters(&mut count, query);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    Ok((documents, total))
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &DocumentQuery) {
    builder.push(" WHERE d.organization_id = ");
    builder.push_bind(query.organization_id);
    builder.push(" AND d.deleted_at IS NULL");

    if let Some(user_id) = query.visible_to {
        builder.push(" AND (d.owner_id = ");
        builder.push_bind(user_id);
        builder.push(
            " OR EXISTS (SELECT 1 FROM share_grants g WHERE g.resource_type = 'document' \
             AND g.resource_id = d.id AND g.user_id = ",
        );
        builder.push_bind(user_id);
        builder.push(
            ") OR d.folder_id IN (WITH RECURSIVE granted_folders AS (\
             SELECT f.id FROM folders f JOIN share_grants g \
             ON g.resource_type = 'folder' AND g.resource_id = f.id WHERE g.user_id = ",
        );
        builder.push_bind(user_id);
        builder.push(
            " UNION SELECT c.id FROM folders c JOIN granted_folders gf ON c.parent_id = gf.id\
             ) SELECT id FROM granted_folders))",
        );
    }

    if let Some(text) = &query.text {
        let pattern = format!("%{}%", escape_like(text));
        builder.push(" AND (d.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR d.description ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR d.original_filename ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(folder_id) = query.folder_id {
        builder.push(" AND d.folder_id = ");
        builder.push_bind(folder_id);
    }
    if let Some(tag) = &query.tag {
        builder.push(
            " AND EXISTS (SELECT 1 FROM document_tags dt JOIN tags t ON t.id = dt.tag_id \
             WHERE dt.document_id = d.id AND t.name = ",
        );
        builder.push_bind(tag.clone());
        builder.push(")");
    }
    if let Some(prefix) = &query.mime_prefix {
        builder.push(" AND d.mime_type LIKE ");
        builder.push_bind(format!("{}%", escape_like(prefix)));
    }
    if let Some(owner_id) = query.owner_id {
        builder.push(" AND d.owner_id = ");
        builder.push_bind(owner_id);
    }
    if let Some(from) = query.created_from {
        builder.push(" AND d.created_at >= ");
        builder.push_bind(from);
    }
    if let Some(to) = query.created_to {
        builder.push(" AND d.created_at <= ");
        builder.push_bind(to);
    }
}

fn order_by(sort: DocumentSort) -> &'static str {
    match sort {
        DocumentSort::CreatedDesc => "d.created_at DESC",
        DocumentSort::CreatedAsc => "d.created_at ASC",
        DocumentSort::UpdatedDesc => "d.updated_at DESC",
        DocumentSort::TitleAsc => "lower(d.title) ASC",
        DocumentSort::TitleDesc => "lower(d.title) DESC",
        DocumentSort::SizeDesc => "d.size_bytes DESC",
        DocumentSort::SizeAsc => "d.size_bytes ASC",
    }
}

/// Escapes the LIKE wildcards so user input matches literally
fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub async fn list_tags(pool: &PgPool, organization_id: Uuid) -> anyhow::Result<Vec<Tag>> {
    let tags = sqlx::query_as::<_, Tag>(
        r#"
        SELECT t.id, t.organization_id, t.name, COUNT(d.id) AS document_count
        FROM tags t
        LEFT JOIN document_tags dt ON dt.tag_id = t.id
        LEFT JOIN documents d ON d.id = dt.document_id AND d.deleted_at IS NULL
        WHERE t.organization_id = $1
        GROUP BY t.id, t.organization_id, t.name
        ORDER BY t.name
        "#,
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("report"), "report");
    }
}
