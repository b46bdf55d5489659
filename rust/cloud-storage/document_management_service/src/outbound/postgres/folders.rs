//! The folder tree

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::models::Folder;

const FOLDER_COLUMNS: &str = "id, organization_id, owner_id, parent_id, name, created_at, updated_at";

/// Longest parent chain followed when walking up the tree
const MAX_DEPTH: i32 = 64;

pub async fn insert_folder(pool: &PgPool, folder: &Folder) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO folders (id, organization_id, owner_id, parent_id, name, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(folder.id)
    .bind(folder.organization_id)
    .bind(folder.owner_id)
    .bind(folder.parent_id)
    .bind(&folder.name)
    .bind(folder.created_at)
    .bind(folder.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_folder(pool: &PgPool, organization_id: Uuid, id: Uuid) -> anyhow::Result<Option<Folder>> {
    let folder = sqlx::query_as::<_, Folder>(&format!(
        "SELECT {FOLDER_COLUMNS} FROM folders WHERE organization_id = $1 AND id = $2"
    ))
    .bind(organization_id)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(folder)
}

pub async fn list_folders(
    pool: &PgPool,
    organization_id: Uuid,
    parent_id: Option<Uuid>,
    owner_id: Option<Uuid>,
) -> anyhow::Result<Vec<Folder>> {
    let folders = sqlx::query_as::<_, Folder>(&format!(
        r#"
        SELECT {FOLDER_COLUMNS} FROM folders
        WHERE organization_id = $1
          AND parent_id IS NOT DISTINCT FROM $2
          AND ($3::uuid IS NULL OR owner_id = $3)
        ORDER BY lower(name), id
        "#
    ))
    .bind(organization_id)
    .bind(parent_id)
    .bind(owner_id)
    .fetch_all(pool)
    .await?;
    Ok(folders)
}

pub async fn update_folder(pool: &PgPool, folder: &Folder) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE folders SET name = $3, parent_id = $4, updated_at = $5
        WHERE organization_id = $1 AND id = $2
        "#,
    )
    .bind(folder.organization_id)
    .bind(folder.id)
    .bind(&folder.name)
    .bind(folder.parent_id)
    .bind(folder.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn folder_name_taken(
    pool: &PgPool,
    organization_id: Uuid,
    parent_id: Option<Uuid>,
    name: &str,
    except: Option<Uuid>,
) -> anyhow::Result<bool> {
    let taken: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM folders
            WHERE organization_id = $1
              AND parent_id IS NOT DISTINCT FROM $2
              AND lower(name) = lower($3)
              AND ($4::uuid IS NULL OR id <> $4)
        )
        "#,
    )
    .bind(organization_id)
    .bind(parent_id)
    .bind(name)
    .bind(except)
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

pub async fn folder_path(pool: &PgPool, organization_id: Uuid, id: Uuid) -> anyhow::Result<Vec<Folder>> {
    let path = sqlx::query_as::<_, Folder>(
        r#"
        WITH RECURSIVE path AS (
            SELECT f.id, f.organization_id, f.owner_id, f.parent_id, f.name, f.created_at,
                   f.updated_at, 0 AS depth
            FROM folders f
            WHERE f.organization_id = $1 AND f.id = $2
            UNION ALL
            SELECT p.id, p.organization_id, p.owner_id, p.parent_id, p.name, p.created_at,
                   p.updated_at, path.depth + 1
            FROM folders p
            JOIN path ON p.id = path.parent_id
            WHERE path.depth < $3
        )
        SELECT id, organization_id, owner_id, parent_id, name, created_at, updated_at
        FROM path
        ORDER BY depth DESC
        "#,
    )
    .bind(organization_id)
    .bind(id)
    .bind(MAX_DEPTH)
    .fetch_all(pool)
    .await?;
    Ok(path)
}

pub async fn folder_is_empty(pool: &PgPool, organization_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
    let empty: bool = sqlx::query_scalar(
        r#"
        SELECT NOT EXISTS (
            SELECT 1 FROM folders WHERE organization_id = $1 AND parent_id = $2
        ) AND NOT EXISTS (
            SELECT 1 FROM documents
            WHERE organization_id = $1 AND folder_id = $2 AND deleted_at IS NULL
        )
        "#,
    )
    .bind(organization_id)
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(empty)
}

#[tracing::instrument(err, skip(pool))]
pub async fn delete_folder_tree(
    pool: &PgPool,
    organization_id: Uuid,
    id: Uuid,
    at: DateTime<Utc>,
) -> anyhow::Result<Vec<Uuid>> {
    let mut tx = pool.begin().await?;

    let folder_ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        WITH RECURSIVE tree AS (
            SELECT id FROM folders WHERE organization_id = $1 AND id = $2
            UNION
            SELECT f.id FROM folders f JOIN tree ON f.parent_id = tree.id
        )
        SELECT id FROM tree
        "#,
    )
    .bind(organization_id)
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let mut trashed: Vec<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE documents SET deleted_at = $2
        WHERE folder_id = ANY($1) AND deleted_at IS NULL
        RETURNING id
        "#,
    )
    .bind(&folder_ids)
    .bind(at)
    .fetch_all(&mut *tx)
    .await?;

    for statement in [
        "UPDATE documents SET folder_id = NULL WHERE folder_id = ANY($1)",
        "DELETE FROM share_grants WHERE resource_type = 'folder' AND resource_id = ANY($1)",
        "DELETE FROM share_codes WHERE resource_type = 'folder' AND resource_id = ANY($1)",
    ] {
        sqlx::query(statement)
            .bind(&folder_ids)
            .execute(&mut *tx)
            .await?;
    }

    // children go through ON DELETE CASCADE
    sqlx::query("DELETE FROM folders WHERE organization_id = $1 AND id = $2")
        .bind(organization_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    trashed.sort();
    Ok(trashed)
}
