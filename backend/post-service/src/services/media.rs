/// Attachment classification
///
/// Classifies a declared media type against the two configured MIME
/// allow-lists. The policy is an immutable value built from configuration and
/// handed to the pipeline at construction time.
use crate::config::MediaConfig;
use crate::models::MediaType;

#[derive(Debug, Clone)]
pub struct MediaPolicy {
    image_types: Vec<String>,
    video_types: Vec<String>,
}

impl MediaPolicy {
    pub fn new(image_types: Vec<String>, video_types: Vec<String>) -> Self {
        Self {
            image_types,
            video_types,
        }
    }

    /// Classify a declared content type as image or video, or `None` when it
    /// matches neither allow-list. MIME parameters (e.g. charset) are ignored.
    pub fn classify(&self, content_type: &str) -> Option<MediaType> {
        let essence = content_type
            .parse::<mime::Mime>()
            .map(|m| m.essence_str().to_ascii_lowercase())
            .unwrap_or_else(|_| content_type.trim().to_ascii_lowercase());

        if self.image_types.iter().any(|t| t == &essence) {
            Some(MediaType::Image)
        } else if self.video_types.iter().any(|t| t == &essence) {
            Some(MediaType::Video)
        } else {
            None
        }
    }
}

impl From<&MediaConfig> for MediaPolicy {
    fn from(config: &MediaConfig) -> Self {
        Self::new(
            config.allowed_image_types.clone(),
            config.allowed_video_types.clone(),
        )
    }
}
