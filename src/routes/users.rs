use crate::{
    auth::{self, AuthResponse, AuthedUser, LoginRequest},
    config::Config,
    email::Mailer,
    error::AppError,
    models::{
        ensure_allowed_fields, CreateUserRequest, NewUpload, UpdateUserRequest, Upload, User,
        USER_UPDATE_FIELDS,
    },
    storage,
};
use actix_multipart::Multipart;
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use futures::TryStreamExt;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Registers a new account.
///
/// On success the account is stored with a hashed password, a first session
/// token is issued, and a welcome email is queued in the background.
///
/// ## Responses:
/// - `201 Created`: `{"user": {...}, "token": "..."}`. The user JSON never
///   contains the password hash.
/// - `400 Bad Request`: On any validation failure, including a duplicate
///   email.
#[post("/users")]
pub async fn register(
    pool: web::Data<PgPool>,
    mailer: web::Data<Mailer>,
    body: web::Json<CreateUserRequest>,
) -> Result<impl Responder, AppError> {
    let pool = pool.get_ref();

    let user = User::create(pool, body.into_inner()).await?;
    let token = auth::token::issue(pool, user.id).await?;

    mailer.send_welcome(&user.email, &user.name);

    Ok(HttpResponse::Created().json(AuthResponse { user, token }))
}

/// Exchanges credentials for a fresh session token.
///
/// Each login issues a new token and leaves existing sessions untouched.
/// An unknown email and a wrong password produce the same answer.
///
/// ## Responses:
/// - `200 OK`: `{"user": {...}, "token": "..."}`.
/// - `400 Bad Request`: `{"error": "Unable to login"}` on bad credentials.
#[post("/users/login")]
pub async fn login(
    pool: web::Data<PgPool>,
    body: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    body.validate()?;
    let pool = pool.get_ref();

    let user = User::find_by_credentials(pool, &body.email, &body.password).await?;
    let token = auth::token::issue(pool, user.id).await?;

    Ok(HttpResponse::Ok().json(AuthResponse { user, token }))
}

/// Ends the calling session only. The exact token that authenticated this
/// request is revoked; sessions on other devices keep working.
#[post("/users/logout")]
pub async fn logout(
    pool: web::Data<PgPool>,
    authed: AuthedUser,
) -> Result<impl Responder, AppError> {
    auth::token::revoke_one(pool.get_ref(), authed.user.id, &authed.token).await?;
    Ok(HttpResponse::Ok().finish())
}

/// Ends every session of the calling user, on every device.
#[post("/users/logoutAll")]
pub async fn logout_all(
    pool: web::Data<PgPool>,
    authed: AuthedUser,
) -> Result<impl Responder, AppError> {
    auth::token::revoke_all(pool.get_ref(), authed.user.id).await?;
    Ok(HttpResponse::Ok().finish())
}

/// Lists every account. Requires a session but is not scoped to the
/// caller.
#[get("/users")]
pub async fn list_users(pool: web::Data<PgPool>) -> Result<impl Responder, AppError> {
    let users = User::all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(users))
}

/// Returns the caller's own profile.
#[get("/users/me")]
pub async fn me(authed: AuthedUser) -> impl Responder {
    HttpResponse::Ok().json(authed.user)
}

/// Partially updates the caller's profile.
///
/// The body may only contain `name`, `email`, `password` and `age`; any
/// other key fails the whole request with `{"error": "Invalid update"}`
/// before anything is written. A new password goes through the same rules
/// as on registration and is re-hashed.
#[patch("/users/me")]
pub async fn update_me(
    pool: web::Data<PgPool>,
    authed: AuthedUser,
    body: web::Json<serde_json::Value>,
) -> Result<impl Responder, AppError> {
    ensure_allowed_fields(&body, USER_UPDATE_FIELDS)?;

    let update: UpdateUserRequest = serde_json::from_value(body.into_inner())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user = User::apply_update(pool.get_ref(), authed.user.id, update).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// Deletes the caller's account and returns its last state.
///
/// Sessions, tasks and upload records go with it; a cancellation email is
/// queued in the background.
#[delete("/users/me")]
pub async fn delete_me(
    pool: web::Data<PgPool>,
    mailer: web::Data<Mailer>,
    authed: AuthedUser,
) -> Result<impl Responder, AppError> {
    User::delete(pool.get_ref(), authed.user.id).await?;

    mailer.send_cancellation(&authed.user.email, &authed.user.name);

    Ok(HttpResponse::Ok().json(authed.user))
}

/// Reads the single expected file field off a multipart payload, enforcing
/// the name screen and the size ceiling before anything is stored. Returns
/// the client's filename, the declared content type and the raw bytes.
async fn read_avatar_field(payload: &mut Multipart) -> Result<(String, String, Vec<u8>), AppError> {
    let mut field = payload
        .try_next()
        .await?
        .ok_or_else(|| AppError::BadRequest("Please provide an avatar file".into()))?;

    if field.name() != "avatar" {
        return Err(AppError::BadRequest("Unexpected field".into()));
    }

    let original_name = field
        .content_disposition()
        .get_filename()
        .map(str::to_owned)
        .ok_or_else(|| AppError::BadRequest("Please provide an avatar file".into()))?;

    if !storage::acceptable_image_name(&original_name) {
        return Err(AppError::BadRequest(
            "Please upload a valid image. Only JPG, PNG and GIF files are allowed.".into(),
        ));
    }

    let mimetype = field
        .content_type()
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| storage::content_type_for(&original_name).to_string());

    let mut bytes: Vec<u8> = Vec::new();
    let mut oversize = false;
    while let Some(chunk) = field.try_next().await? {
        if oversize {
            // Keep draining so the client gets a clean 400 instead of a
            // dropped connection.
            continue;
        }
        if bytes.len() + chunk.len() > storage::MAX_AVATAR_BYTES {
            oversize = true;
            bytes.clear();
            continue;
        }
        bytes.extend_from_slice(&chunk);
    }

    if oversize {
        return Err(AppError::BadRequest("File too large".into()));
    }
    if bytes.is_empty() {
        return Err(AppError::BadRequest("Please provide an avatar file".into()));
    }

    Ok((original_name, mimetype, bytes))
}

/// Stores a new avatar for the caller.
///
/// Expects a multipart body with one file field named `avatar`. The file
/// must carry a png/gif/jpeg/jpg extension and stay within the size
/// ceiling; accepted files are shrunk to fit 720x720 and written under the
/// avatar directory. An Upload record is created, a previous avatar (file
/// and record) is removed best effort, and the user row points at the new
/// path.
///
/// ## Responses:
/// - `200 OK`: Empty body.
/// - `400 Bad Request`: Wrong field, bad extension, oversize payload or
///   bytes that do not decode as an image. Nothing is stored in that case.
/// - `401 Unauthorized`: If the request lacks a valid session token.
#[post("/users/me/avatar")]
pub async fn upload_avatar(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    authed: AuthedUser,
    mut payload: Multipart,
) -> Result<impl Responder, AppError> {
    let pool = pool.get_ref();

    let (original_name, mimetype, bytes) = read_avatar_field(&mut payload).await?;
    let size = bytes.len() as i64;

    let extension = storage::file_extension(&original_name).ok_or_else(|| {
        AppError::BadRequest(
            "Please upload a valid image. Only JPG, PNG and GIF files are allowed.".into(),
        )
    })?;
    let normalized = storage::normalize_avatar(&bytes, &extension)?;

    let filename = storage::stored_filename("avatar", &original_name).ok_or_else(|| {
        AppError::BadRequest(
            "Please upload a valid image. Only JPG, PNG and GIF files are allowed.".into(),
        )
    })?;
    let path = storage::store_avatar(&config.avatar_dir, &filename, &normalized).await?;

    Upload::create(
        pool,
        NewUpload {
            path: path.clone(),
            filename,
            originalname: original_name,
            size,
            mimetype,
            collection_name: "users".to_string(),
            owner: authed.user.id,
        },
    )
    .await?;

    // Drop the previous avatar before the account points at the new one.
    if let Some(old_path) = &authed.user.avatar {
        if old_path != &path {
            storage::remove_stored_file(pool, old_path).await;
        }
    }

    User::set_avatar(pool, authed.user.id, Some(&path)).await?;

    Ok(HttpResponse::Ok().finish())
}

/// Removes the caller's avatar, file and record included. Answers 200
/// whether or not an avatar existed.
#[delete("/users/me/avatar")]
pub async fn delete_avatar(
    pool: web::Data<PgPool>,
    authed: AuthedUser,
) -> Result<impl Responder, AppError> {
    let pool = pool.get_ref();

    if let Some(avatar) = &authed.user.avatar {
        storage::remove_stored_file(pool, avatar).await;
        User::set_avatar(pool, authed.user.id, None).await?;
    }

    Ok(HttpResponse::Ok().finish())
}

/// Serves any user's avatar image without authentication.
///
/// ## Responses:
/// - `200 OK`: The image bytes, with Content-Type derived from the stored
///   file's extension.
/// - `400 Bad Request`: Malformed id, unknown user, no avatar set, or the
///   stored file is gone.
#[get("/users/{id}/avatar")]
pub async fn get_avatar(
    pool: web::Data<PgPool>,
    user_id: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let id = user_id
        .parse::<Uuid>()
        .map_err(|_| AppError::BadRequest("Invalid user id".into()))?;

    let user = User::find_by_id(pool.get_ref(), id)
        .await?
        .ok_or_else(|| AppError::BadRequest("Avatar not found".into()))?;

    let avatar = user
        .avatar
        .ok_or_else(|| AppError::BadRequest("Avatar not found".into()))?;

    let bytes = tokio::fs::read(&avatar)
        .await
        .map_err(|_| AppError::BadRequest("Avatar not found".into()))?;

    Ok(HttpResponse::Ok()
        .content_type(storage::content_type_for(&avatar).as_ref())
        .body(bytes))
}
