//! Prometheus metrics for post-service.
//!
//! Exposes submission-pipeline collectors and an HTTP handler for the
//! `/metrics` endpoint.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};

lazy_static! {
    /// Posts created, segmented by attachment kind.
    pub static ref POSTS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "posts_created_total",
        "Posts created segmented by media kind",
        &["media_type"]
    )
    .expect("failed to register posts_created_total");

    /// Attachment uploads that reached object storage, segmented by kind.
    pub static ref MEDIA_UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "post_media_uploads_total",
        "Attachment uploads segmented by media kind",
        &["kind"]
    )
    .expect("failed to register post_media_uploads_total");

    /// End-to-end submission pipeline duration.
    pub static ref POST_CREATE_DURATION_SECONDS: Histogram = register_histogram!(
        "post_create_duration_seconds",
        "Submission pipeline duration from validation to commit"
    )
    .expect("failed to register post_create_duration_seconds");
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
