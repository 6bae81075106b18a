/// Post service - the content-submission pipeline
///
/// Orchestrates validation, attachment classification/upload, tag registry
/// updates, and persistence of a new post as one unit of work, then assembles
/// the outward view for the caller.
use crate::db::{post_repo, tag_repo};
use crate::error::{AppError, Result};
use crate::metrics::{MEDIA_UPLOADS_TOTAL, POSTS_CREATED_TOTAL, POST_CREATE_DURATION_SECONDS};
use crate::middleware::UserContext;
use crate::models::{MediaAttachment, MediaType, Post, PostView, UserBrief, Visibility};
use crate::services::MediaPolicy;
use crate::storage::ObjectStorage;
use bytes::Bytes;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// A file part received with a submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Normalized submission input. Both request shapes (structured JSON and
/// multipart form) are converted into this one representation before the
/// pipeline runs; the pipeline itself is input-shape-agnostic.
#[derive(Debug, Clone, Default)]
pub struct NewPostSubmission {
    pub content: Option<String>,
    pub visibility: Visibility,
    pub location: Option<String>,
    pub tag_names: Vec<String>,
    pub files: Vec<UploadedFile>,
}

pub struct PostService {
    pool: PgPool,
    storage: Arc<dyn ObjectStorage>,
    policy: MediaPolicy,
}

impl PostService {
    pub fn new(pool: PgPool, storage: Arc<dyn ObjectStorage>, policy: MediaPolicy) -> Self {
        Self {
            pool,
            storage,
            policy,
        }
    }

    /// Create a new post.
    ///
    /// Steps run in order: presence validation, attachment classification and
    /// upload (strict submission order), tag resolution, then one transaction
    /// committing the post row, tag upserts and associations together. A
    /// failure after uploads succeeded leaves the uploaded objects orphaned in
    /// storage; that is surfaced in the error, never retried here.
    pub async fn create_post(
        &self,
        author: &UserContext,
        submission: NewPostSubmission,
    ) -> Result<PostView> {
        let timer = Instant::now();

        let has_content = submission
            .content
            .as_deref()
            .map(|c| !c.is_empty())
            .unwrap_or(false);
        if !has_content && submission.files.is_empty() {
            return Err(AppError::Validation(
                "post must include content or media".to_string(),
            ));
        }

        let (media_type, attachments) =
            upload_attachments(&*self.storage, &self.policy, author.id, &submission.files)
                .await?;

        let normalized_tags = normalize_tags(&submission.tag_names);

        let persisted: Result<(Post, Vec<String>)> = async {
            let mut tx = self.pool.begin().await?;

            let post = post_repo::insert_post(
                &mut tx,
                Uuid::new_v4(),
                author.id,
                submission.content.as_deref(),
                submission.visibility,
                submission.location.as_deref(),
                media_type,
                &attachments,
            )
            .await?;

            // Each occurrence of a tag name bumps the counter, duplicates
            // within one submission included; the association itself is a set.
            let mut tag_names = Vec::new();
            for name in &normalized_tags {
                let tag = tag_repo::resolve_or_create(&mut tx, name).await?;
                tag_repo::attach_to_post(&mut tx, post.id, tag.id).await?;
                if !tag_names.contains(&tag.name) {
                    tag_names.push(tag.name);
                }
            }
            // Reads return tags ordered by name; the creation view matches.
            tag_names.sort();

            tx.commit().await?;
            Ok((post, tag_names))
        }
        .await;

        let (post, tag_names) = match persisted {
            Ok(value) => value,
            Err(err) => {
                if !attachments.is_empty() {
                    tracing::warn!(
                        user_id = %author.id,
                        orphaned = attachments.len(),
                        "post commit failed; uploaded attachments remain orphaned in storage"
                    );
                }
                return Err(err);
            }
        };

        POSTS_CREATED_TOTAL
            .with_label_values(&[&post.media_type.to_string()])
            .inc();
        POST_CREATE_DURATION_SECONDS.observe(timer.elapsed().as_secs_f64());

        Ok(build_post_view(
            post,
            tag_names,
            Some(UserBrief {
                id: author.id,
                display_name: author.display_name.clone(),
                avatar_url: author.avatar_url.clone(),
            }),
            None,
        ))
    }

    /// Get a post by ID, assembled with the caller's stored reaction.
    pub async fn get_post(&self, post_id: Uuid, caller: &UserContext) -> Result<Option<PostView>> {
        let Some(post) = post_repo::find_post_by_id(&self.pool, post_id).await? else {
            return Ok(None);
        };

        let tags = tag_repo::names_for_post(&self.pool, post.id).await?;
        let reaction = post_repo::find_user_reaction(&self.pool, post.id, caller.id).await?;

        // Owner identity is only embedded when the caller is the owner;
        // other callers resolve identities through the user service.
        let user = (post.user_id == caller.id).then(|| UserBrief {
            id: caller.id,
            display_name: caller.display_name.clone(),
            avatar_url: caller.avatar_url.clone(),
        });

        Ok(Some(build_post_view(post, tags, user, reaction)))
    }

    /// Get a user's posts, newest first.
    pub async fn get_user_posts(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostView>> {
        let posts = post_repo::find_posts_by_user(&self.pool, user_id, limit, offset).await?;

        let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let mut tags_by_post = tag_repo::names_for_posts(&self.pool, &ids).await?;

        Ok(posts
            .into_iter()
            .map(|post| {
                let tags = tags_by_post.remove(&post.id).unwrap_or_default();
                build_post_view(post, tags, None, None)
            })
            .collect())
    }
}

/// Classify and upload the submission's files in strict submission order.
///
/// Returns the final attachment kind together with the collected references.
/// Two separate values track media kind: the rolling `detected` accumulator
/// exists only for mixed-media conflict detection, and the returned kind is
/// decided once, after the loop, only if anything was collected.
async fn upload_attachments(
    storage: &dyn ObjectStorage,
    policy: &MediaPolicy,
    author_id: Uuid,
    files: &[UploadedFile],
) -> Result<(MediaType, Vec<MediaAttachment>)> {
    let mut detected: Option<MediaType> = None;
    let mut collected: Vec<MediaAttachment> = Vec::new();

    // Timestamp plus a per-submission batch id keeps object keys unique even
    // for same-millisecond concurrent submissions from one user.
    let stamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
    let batch = Uuid::new_v4().simple().to_string();

    for file in files {
        if file.filename.is_empty() {
            continue;
        }

        let kind = policy.classify(&file.content_type).ok_or_else(|| {
            AppError::Validation(format!("unsupported media type: {}", file.content_type))
        })?;

        if let Some(established) = detected {
            if established != kind {
                return Err(AppError::Validation(
                    "cannot mix image and video attachments in one post".to_string(),
                ));
            }
        }
        detected = Some(kind);

        let object_name = format!(
            "user_{}/post_{}_{}_{}",
            author_id,
            stamp,
            batch,
            collected.len()
        );
        let url = storage
            .upload(
                file.data.clone(),
                &file.content_type,
                "posts",
                &object_name,
                &[("user_id".to_string(), author_id.to_string())],
            )
            .await?;

        MEDIA_UPLOADS_TOTAL
            .with_label_values(&[&kind.to_string()])
            .inc();
        collected.push(MediaAttachment {
            url,
            media_type: kind,
        });
    }

    // All filenames empty leaves the post media-less; a body-text-only
    // submission must not regress here.
    match detected {
        Some(kind) if !collected.is_empty() => Ok((kind, collected)),
        _ => Ok((MediaType::None, Vec::new())),
    }
}

/// Normalize raw tag strings: trim, lowercase, drop empties. Duplicates are
/// kept; each occurrence counts against the registry.
fn normalize_tags(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Assemble the outward view from the committed post plus caller-supplied
/// context. Pure and total over well-formed input.
pub fn build_post_view(
    post: Post,
    tags: Vec<String>,
    user: Option<UserBrief>,
    current_user_reaction: Option<String>,
) -> PostView {
    PostView {
        id: post.id,
        user_id: post.user_id,
        content: post.content,
        visibility: post.visibility,
        location: post.location,
        media_type: post.media_type,
        media_urls: post.media_urls.0,
        comment_count: post.comment_count,
        like_count: post.like_count,
        share_count: post.share_count,
        view_count: post.view_count,
        is_edited: post.is_edited,
        is_pinned: post.is_pinned,
        tags,
        created_at: post.created_at,
        updated_at: post.updated_at,
        user,
        current_user_reaction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockStorage;
    use sqlx::types::Json;

    fn policy() -> MediaPolicy {
        MediaPolicy::new(
            vec!["image/jpeg".into(), "image/png".into()],
            vec!["video/mp4".into()],
        )
    }

    fn file(name: &str, content_type: &str) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            content_type: content_type.to_string(),
            data: Bytes::from_static(b"bytes"),
        }
    }

    fn author() -> UserContext {
        UserContext {
            id: Uuid::new_v4(),
            display_name: Some("ada".to_string()),
            avatar_url: None,
        }
    }

    fn service_with(storage: MockStorage) -> PostService {
        // Lazy pool: never connects in tests that fail before persistence.
        let pool = PgPool::connect_lazy("postgres://localhost/unreachable").unwrap();
        PostService::new(pool, Arc::new(storage), policy())
    }

    #[tokio::test]
    async fn empty_submission_is_rejected() {
        let service = service_with(MockStorage::new());

        let err = service
            .create_post(&author(), NewPostSubmission::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn blank_content_without_files_is_rejected() {
        let service = service_with(MockStorage::new());

        let submission = NewPostSubmission {
            content: Some(String::new()),
            ..Default::default()
        };
        let err = service.create_post(&author(), submission).await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn unsupported_type_fails_before_any_upload() {
        // No expectations on the mock: any upload call would panic.
        let storage = MockStorage::new();

        let err = upload_attachments(
            &storage,
            &policy(),
            Uuid::new_v4(),
            &[file("doc.pdf", "application/pdf")],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn mixed_media_stops_after_the_conflict() {
        let mut storage = MockStorage::new();
        // Only the leading image may be uploaded.
        storage
            .expect_upload()
            .times(1)
            .returning(|_, _, folder, name, _| Ok(format!("https://cdn.test/{folder}/{name}")));

        let err = upload_attachments(
            &storage,
            &policy(),
            Uuid::new_v4(),
            &[
                file("a.jpg", "image/jpeg"),
                file("b.mp4", "video/mp4"),
                file("c.jpg", "image/jpeg"),
            ],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn three_images_upload_in_order_with_distinct_keys() {
        let captured = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let keys = captured.clone();

        let mut storage = MockStorage::new();
        storage
            .expect_upload()
            .times(3)
            .returning(move |_, _, folder, name, _| {
                let key = format!("{folder}/{name}");
                keys.lock().unwrap().push(key.clone());
                Ok(format!("https://cdn.test/{key}"))
            });

        let author_id = Uuid::new_v4();
        let (kind, attachments) = upload_attachments(
            &storage,
            &policy(),
            author_id,
            &[
                file("a.jpg", "image/jpeg"),
                file("b.png", "image/png"),
                file("c.jpg", "image/jpeg"),
            ],
        )
        .await
        .unwrap();

        assert_eq!(kind, MediaType::Image);
        assert_eq!(attachments.len(), 3);

        let keys = captured.lock().unwrap();
        assert_eq!(keys.len(), 3);
        // Distinct keys, sequence index preserved in submission order.
        for (i, key) in keys.iter().enumerate() {
            assert!(key.ends_with(&format!("_{i}")), "unexpected key {key}");
        }
        for (key, att) in keys.iter().zip(&attachments) {
            assert_eq!(att.url, format!("https://cdn.test/{key}"));
            assert_eq!(att.media_type, MediaType::Image);
        }
    }

    #[tokio::test]
    async fn empty_filenames_yield_no_media() {
        let storage = MockStorage::new();

        let (kind, attachments) = upload_attachments(
            &storage,
            &policy(),
            Uuid::new_v4(),
            &[file("", "image/jpeg"), file("", "video/mp4")],
        )
        .await
        .unwrap();

        assert_eq!(kind, MediaType::None);
        assert!(attachments.is_empty());
    }

    #[test]
    fn tags_are_trimmed_lowercased_and_duplicates_kept() {
        let raw = vec![
            "Foo".to_string(),
            " foo ".to_string(),
            "bar".to_string(),
            "  ".to_string(),
        ];

        assert_eq!(normalize_tags(&raw), vec!["foo", "foo", "bar"]);
    }

    #[test]
    fn fresh_view_has_zero_counters_and_no_reaction() {
        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content: Some("hello".to_string()),
            visibility: Visibility::Public,
            location: None,
            media_type: MediaType::None,
            media_urls: Json(Vec::new()),
            comment_count: 0,
            like_count: 0,
            share_count: 0,
            view_count: 0,
            is_edited: false,
            is_pinned: false,
            created_at: now,
            updated_at: now,
        };

        let view = build_post_view(post, vec!["foo".to_string()], None, None);

        assert_eq!(view.comment_count, 0);
        assert_eq!(view.like_count, 0);
        assert_eq!(view.share_count, 0);
        assert_eq!(view.view_count, 0);
        assert_eq!(view.current_user_reaction, None);
        assert_eq!(view.tags, vec!["foo"]);
        assert!(!view.is_edited);
        assert!(!view.is_pinned);
    }
}
