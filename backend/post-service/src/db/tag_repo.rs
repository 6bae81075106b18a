/// Tag registry
///
/// Maps a normalized tag name to a reference count. Used exclusively by the
/// submission pipeline inside its transaction; the single-statement upsert
/// serializes lookup-or-create-then-increment per tag name at the storage
/// layer, so two concurrent submissions can neither create the same tag twice
/// nor lose an increment.
use crate::models::Tag;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

/// Look up a tag by normalized name, creating it with count 1 on first use or
/// incrementing its count by 1 on reuse. The count never decrements.
pub async fn resolve_or_create(conn: &mut PgConnection, name: &str) -> Result<Tag, sqlx::Error> {
    let tag = sqlx::query_as::<_, Tag>(
        r#"
        INSERT INTO tags (id, name, post_count)
        VALUES ($1, $2, 1)
        ON CONFLICT (name) DO UPDATE SET post_count = tags.post_count + 1
        RETURNING id, name, post_count
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(conn)
    .await?;

    Ok(tag)
}

/// Associate a tag with a post. Duplicate occurrences of a tag within one
/// submission each bump the counter, but the association itself is a set.
pub async fn attach_to_post(
    conn: &mut PgConnection,
    post_id: Uuid,
    tag_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(post_id)
    .bind(tag_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Tag names associated with a single post
pub async fn names_for_post(pool: &PgPool, post_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT t.name
        FROM post_tags pt
        JOIN tags t ON t.id = pt.tag_id
        WHERE pt.post_id = $1
        ORDER BY t.name
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Tag names for a batch of posts, keyed by post id
pub async fn names_for_posts(
    pool: &PgPool,
    post_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<String>>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, String)>(
        r#"
        SELECT pt.post_id, t.name
        FROM post_tags pt
        JOIN tags t ON t.id = pt.tag_id
        WHERE pt.post_id = ANY($1)
        ORDER BY t.name
        "#,
    )
    .bind(post_ids)
    .fetch_all(pool)
    .await?;

    let mut map: HashMap<Uuid, Vec<String>> = HashMap::new();
    for (post_id, name) in rows {
        map.entry(post_id).or_default().push(name);
    }

    Ok(map)
}
