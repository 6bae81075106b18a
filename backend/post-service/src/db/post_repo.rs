use crate::models::{MediaAttachment, MediaType, Post, Visibility};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Insert a new post inside the caller's transaction.
/// Counters start at zero and the edited/pinned flags start false.
#[allow(clippy::too_many_arguments)]
pub async fn insert_post(
    conn: &mut PgConnection,
    id: Uuid,
    user_id: Uuid,
    content: Option<&str>,
    visibility: Visibility,
    location: Option<&str>,
    media_type: MediaType,
    media_urls: &[MediaAttachment],
) -> Result<Post, sqlx::Error> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (id, user_id, content, visibility, location, media_type, media_urls)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, user_id, content, visibility, location, media_type, media_urls,
                  comment_count, like_count, share_count, view_count,
                  is_edited, is_pinned, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(content)
    .bind(visibility)
    .bind(location)
    .bind(media_type)
    .bind(Json(media_urls))
    .fetch_one(conn)
    .await?;

    Ok(post)
}

/// Find a post by ID
pub async fn find_post_by_id(pool: &PgPool, post_id: Uuid) -> Result<Option<Post>, sqlx::Error> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, user_id, content, visibility, location, media_type, media_urls,
               comment_count, like_count, share_count, view_count,
               is_edited, is_pinned, created_at, updated_at
        FROM posts
        WHERE id = $1
        "#,
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await?;

    Ok(post)
}

/// Find a user's posts, newest first
pub async fn find_posts_by_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Post>, sqlx::Error> {
    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, user_id, content, visibility, location, media_type, media_urls,
               comment_count, like_count, share_count, view_count,
               is_edited, is_pinned, created_at, updated_at
        FROM posts
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(posts)
}

/// The caller's stored reaction to a post, if any
pub async fn find_user_reaction(
    pool: &PgPool,
    post_id: Uuid,
    user_id: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query_as::<_, (String,)>(
        "SELECT reaction_type FROM reactions WHERE post_id = $1 AND user_id = $2",
    )
    .bind(post_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(t,)| t))
}
