use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use sqlx::PgPool;

use crate::auth::extractors::AuthedUser;
use crate::auth::token;
use crate::error::AppError;

/// Bearer-token guard for every route except the public ones.
///
/// A request must carry `Authorization: Bearer <token>`, the token must
/// verify, and the exact token string must still be a live session row.
/// On success the resolved user and the token are stored in request
/// extensions for the `AuthedUser` extractor; on any failure the request
/// ends here with 401 and the single body `{"error": "Please authenticate."}`.
pub struct AuthMiddleware;

/// Routes that must work without a session: account creation, login, the
/// public avatar fetch and the health probe.
fn is_public(path: &str, method: &Method) -> bool {
    path == "/health"
        || (*method == Method::POST && (path == "/users" || path == "/users/login"))
        || (*method == Method::GET && path.starts_with("/users/") && path.ends_with("/avatar"))
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    // Rc because the async block in `call` has to own a handle to the
    // inner service.
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if is_public(req.path(), req.method()) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let bearer = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_owned);

        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let token = match bearer {
                Some(token) => token,
                None => {
                    return Err(AppError::Unauthorized("Please authenticate.".into()).into());
                }
            };

            let pool = match req.app_data::<web::Data<PgPool>>() {
                Some(pool) => pool.clone(),
                None => {
                    return Err(
                        AppError::Internal("database pool missing from app data".into()).into(),
                    );
                }
            };

            // Signature check plus session-row lookup in one step. Every
            // failure mode answers the same way.
            let user = match token::validate(pool.get_ref(), &token).await {
                Ok(user) => user,
                Err(_) => {
                    return Err(AppError::Unauthorized("Please authenticate.".into()).into());
                }
            };

            req.extensions_mut().insert(AuthedUser { user, token });
            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_routes() {
        assert!(is_public("/health", &Method::GET));
        assert!(is_public("/users", &Method::POST));
        assert!(is_public("/users/login", &Method::POST));
        assert!(is_public(
            "/users/0c9bc36a-2dcd-4b3c-8800-1bd8d4a337a4/avatar",
            &Method::GET
        ));
    }

    #[test]
    fn test_protected_routes() {
        // Same paths, other methods
        assert!(!is_public("/users", &Method::GET));
        assert!(!is_public("/users/me/avatar", &Method::POST));
        assert!(!is_public("/users/me/avatar", &Method::DELETE));

        assert!(!is_public("/users/me", &Method::GET));
        assert!(!is_public("/users/logout", &Method::POST));
        assert!(!is_public("/tasks", &Method::GET));
        assert!(!is_public("/tasks", &Method::POST));
        assert!(!is_public("/tasks-alt", &Method::GET));
    }
}
