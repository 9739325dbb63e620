pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use serde::{Deserialize, Serialize};
use validator::Validate;

// Re-export necessary items
pub use extractors::AuthedUser;
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use token::Claims;

use crate::models::User;

/// Payload for a login request.
///
/// Only the email shape is validated here; whether the pair matches an
/// account is the credential lookup's business, and that failure is
/// deliberately opaque.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    pub password: String,
}

/// Body returned by registration and login: the serialized account plus the
/// freshly issued session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_login_request_validation() {
        let valid_login = LoginRequest {
            email: "test@example.com".to_string(),
            password: "horsebattery".to_string(),
        };
        assert!(valid_login.validate().is_ok());

        let invalid_email_login = LoginRequest {
            email: "testexample.com".to_string(),
            password: "horsebattery".to_string(),
        };
        assert!(invalid_email_login.validate().is_err());
    }
}
