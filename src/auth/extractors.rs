use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;
use crate::models::User;

/// The authenticated caller: the full user row plus the exact bearer token
/// this request presented.
///
/// `AuthMiddleware` resolves both and stores them in request extensions
/// before any handler runs. Handlers that need the caller just take this
/// as an argument; logout additionally needs the token string itself, since
/// that string is the session being revoked.
///
/// If nothing was inserted (the middleware did not run on this route), the
/// extractor refuses the request rather than guessing.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub user: User,
    pub token: String,
}

impl FromRequest for AuthedUser {
    type Error = ActixError; // AppError converts into ActixError via ResponseError
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthedUser>().cloned() {
            Some(authed) => ready(Ok(authed)),
            None => {
                let err = AppError::Unauthorized("Please authenticate.".to_string());
                ready(Err(err.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::dev::Payload;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_authed_user() -> AuthedUser {
        AuthedUser {
            user: User {
                id: Uuid::new_v4(),
                name: "Jess".to_string(),
                email: "jess@example.com".to_string(),
                password_hash: "$2b$12$secret".to_string(),
                age: 27,
                avatar: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            token: "header.payload.signature".to_string(),
        }
    }

    #[actix_rt::test]
    async fn test_authed_user_extractor_success() {
        let req = test::TestRequest::default().to_http_request();
        let authed = sample_authed_user();
        let expected_id = authed.user.id;
        req.extensions_mut().insert(authed); // HttpMessage trait brings .extensions_mut()

        let mut payload = Payload::None;
        let extracted = AuthedUser::from_request(&req, &mut payload).await;
        assert!(extracted.is_ok());

        let extracted = extracted.unwrap();
        assert_eq!(extracted.user.id, expected_id);
        assert_eq!(extracted.token, "header.payload.signature");
    }

    #[actix_rt::test]
    async fn test_authed_user_extractor_failure() {
        let req = test::TestRequest::default().to_http_request();
        // Nothing inserted into extensions

        let mut payload = Payload::None;
        let extracted = AuthedUser::from_request(&req, &mut payload).await;
        assert!(extracted.is_err());

        let err = extracted.unwrap_err();
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
