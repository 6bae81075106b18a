/// Data models for post-service
///
/// Defines the persisted entities (posts, tags) and the denormalized view
/// returned to callers.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Who can see a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "visibility", rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Friends,
    Private,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Public
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "friends" => Ok(Visibility::Friends),
            "private" => Ok(Visibility::Private),
            other => Err(format!("unknown visibility: {other}")),
        }
    }
}

/// The single media category shared by all attachments on one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "media_kind", rename_all = "lowercase")]
pub enum MediaType {
    None,
    Image,
    Video,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaType::None => "none",
            MediaType::Image => "image",
            MediaType::Video => "video",
        };
        f.write_str(s)
    }
}

/// A stored attachment reference: durable URL plus its classified kind.
/// Owned exclusively by its post, never shared across posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

/// A user-authored post row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: Option<String>,
    pub visibility: Visibility,
    pub location: Option<String>,
    pub media_type: MediaType,
    pub media_urls: Json<Vec<MediaAttachment>>,
    pub comment_count: i32,
    pub like_count: i32,
    pub share_count: i32,
    pub view_count: i32,
    pub is_edited: bool,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A normalized tag with its reference count.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub post_count: i64,
}

/// Denormalized owner identity embedded in the outward view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBrief {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// The outward-facing view of a post: the stored entity combined with the
/// owner identity and the caller's current reaction (if any).
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: Option<String>,
    pub visibility: Visibility,
    pub location: Option<String>,
    pub media_type: MediaType,
    pub media_urls: Vec<MediaAttachment>,
    pub comment_count: i32,
    pub like_count: i32,
    pub share_count: i32,
    pub view_count: i32,
    pub is_edited: bool,
    pub is_pinned: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: Option<UserBrief>,
    pub current_user_reaction: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_parses_case_insensitively() {
        assert_eq!("PUBLIC".parse::<Visibility>().unwrap(), Visibility::Public);
        assert_eq!(" friends ".parse::<Visibility>().unwrap(), Visibility::Friends);
        assert!("everyone".parse::<Visibility>().is_err());
    }

    #[test]
    fn attachment_serializes_kind_as_type() {
        let att = MediaAttachment {
            url: "https://cdn.example.com/posts/a".to_string(),
            media_type: MediaType::Image,
        };
        let json = serde_json::to_value(&att).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["url"], "https://cdn.example.com/posts/a");
    }
}
