/// HTTP middleware utilities for post-service
///
/// The gateway terminates authentication and forwards the verified caller
/// identity in headers. This module materializes that identity for handlers;
/// the values are trusted as already-verified.
use actix_web::{error::ErrorUnauthorized, Error, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

/// Verified caller identity forwarded by the authentication gateway.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserContext {
    fn from_headers(req: &HttpRequest) -> Result<Self, Error> {
        let id = req
            .headers()
            .get("x-user-id")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ErrorUnauthorized("Missing x-user-id header"))?;

        let id = Uuid::parse_str(id).map_err(|_| ErrorUnauthorized("Invalid user ID"))?;

        let header_string = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
        };

        Ok(UserContext {
            id,
            display_name: header_string("x-user-name"),
            avatar_url: header_string("x-user-avatar"),
        })
    }
}

impl FromRequest for UserContext {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(UserContext::from_headers(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn extracts_full_identity() {
        let req = TestRequest::default()
            .insert_header(("x-user-id", "7f1e9c3a-1111-4222-8333-444455556666"))
            .insert_header(("x-user-name", "ada"))
            .insert_header(("x-user-avatar", "https://cdn.example.com/a.png"))
            .to_http_request();

        let ctx = UserContext::from_headers(&req).unwrap();
        assert_eq!(
            ctx.id,
            Uuid::parse_str("7f1e9c3a-1111-4222-8333-444455556666").unwrap()
        );
        assert_eq!(ctx.display_name.as_deref(), Some("ada"));
        assert_eq!(ctx.avatar_url.as_deref(), Some("https://cdn.example.com/a.png"));
    }

    #[actix_web::test]
    async fn rejects_missing_or_malformed_id() {
        let req = TestRequest::default().to_http_request();
        assert!(UserContext::from_headers(&req).is_err());

        let req = TestRequest::default()
            .insert_header(("x-user-id", "not-a-uuid"))
            .to_http_request();
        assert!(UserContext::from_headers(&req).is_err());
    }
}
