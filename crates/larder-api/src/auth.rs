use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{error, info, warn};

use larder_db::models::NewUser;
use larder_db::{Database, DbError};
use larder_types::api::{
    Claims, LoginRequest, RegisterRequest, SetPasswordRequest, TokenResponse, UserResponse,
};
use larder_types::models::{Role, UserId};

use crate::error::ApiError;
use crate::middleware::{ApiJson, AuthUser};
use crate::policy::Actor;
use crate::state::{AppState, run_blocking};

const MAX_NAME_LEN: usize = 150;
const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 150;

// -- Passwords & tokens --

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    // Argon2id with a fresh salt
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal
        })
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        warn!("Stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn create_token(
    secret: &str,
    ttl: chrono::Duration,
    user_id: UserId,
    username: &str,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!("Token encoding failed: {}", e);
        ApiError::Internal
    })
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized)
}

// -- Registration --

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-')
}

fn validate_password(field: &'static str, password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(ApiError::validation(
            field,
            format!(
                "password must be between {} and {} characters",
                MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
            ),
        ));
    }
    Ok(())
}

pub fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    let email = req.email.trim();
    if email.is_empty() || email.len() > MAX_EMAIL_LEN || !email.contains('@') {
        return Err(ApiError::validation("email", "enter a valid email address"));
    }

    let username = req.username.trim();
    if username.is_empty()
        || username.chars().count() > MAX_NAME_LEN
        || !username.chars().all(is_username_char)
    {
        return Err(ApiError::validation(
            "username",
            "username may contain only letters, digits and @/./+/-/_",
        ));
    }
    if username == "me" {
        return Err(ApiError::validation("username", "username cannot be 'me'"));
    }

    for (field, value) in [("first_name", &req.first_name), ("last_name", &req.last_name)] {
        if value.trim().is_empty() || value.chars().count() > MAX_NAME_LEN {
            return Err(ApiError::validation(
                field,
                format!("must be between 1 and {} characters", MAX_NAME_LEN),
            ));
        }
    }

    validate_password("password", &req.password)
}

pub fn register_user(db: &Database, req: &RegisterRequest) -> Result<UserResponse, ApiError> {
    validate_registration(req)?;
    let password_hash = hash_password(&req.password)?;

    let email = req.email.trim();
    let username = req.username.trim();
    let id = db
        .create_user(&NewUser {
            email,
            username,
            first_name: req.first_name.trim(),
            last_name: req.last_name.trim(),
            password_hash: &password_hash,
            role: Role::User,
        })
        .map_err(|e| match e {
            DbError::Conflict => {
                ApiError::AlreadyExists("a user with that email or username already exists")
            }
            other => other.into(),
        })?;

    info!("Registered user {} ({})", username, id);
    Ok(UserResponse {
        email: email.to_string(),
        id,
        username: username.to_string(),
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        is_subscribed: false,
    })
}

/// Checks credentials; returns the user id and username to put in a token.
pub fn check_credentials(db: &Database, req: &LoginRequest) -> Result<(UserId, String), ApiError> {
    let invalid = || ApiError::validation("credentials", "invalid email or password");

    let user = db.get_user_by_email(req.email.trim())?.ok_or_else(invalid)?;
    if !verify_password(&req.password, &user.password) {
        return Err(invalid());
    }
    Ok((user.id, user.username))
}

pub fn change_password(db: &Database, actor: &Actor, req: &SetPasswordRequest) -> Result<(), ApiError> {
    let user = db
        .get_user_by_id(actor.id)?
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&req.current_password, &user.password) {
        return Err(ApiError::validation("current_password", "wrong password"));
    }
    validate_password("new_password", &req.new_password)?;

    let password_hash = hash_password(&req.new_password)?;
    db.update_password(actor.id, &password_hash)?;
    info!("User {} ({}) changed their password", actor.username, actor.id);
    Ok(())
}

// -- Handlers --

/// POST /users
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_blocking(&state, move |db| register_user(db, &req)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/token/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user_id, username) = run_blocking(&state, move |db| check_credentials(db, &req)).await?;

    let auth_token = create_token(&state.jwt_secret, state.token_ttl, user_id, &username)?;
    Ok(Json(TokenResponse { auth_token }))
}

/// POST /users/set_password
pub async fn set_password(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<SetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |db| change_password(db, &actor, &req)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn registration(username: &str) -> RegisterRequest {
        RegisterRequest {
            email: format!("{}@example.com", username),
            username: username.to_string(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            password: "correct horse".into(),
        }
    }

    #[test]
    fn registration_rules() {
        assert!(validate_registration(&registration("ada.l+test@home")).is_ok());

        let mut me = registration("me");
        me.email = "me@example.com".into();
        assert!(validate_registration(&me).is_err());

        assert!(validate_registration(&registration("has space")).is_err());

        let mut bad_email = registration("ada");
        bad_email.email = "ada.example.com".into();
        assert!(validate_registration(&bad_email).is_err());

        let mut short = registration("ada");
        short.password = "short".into();
        assert!(validate_registration(&short).is_err());
    }

    #[test]
    fn register_then_login() {
        let db = testutil::db();
        let user = register_user(&db, &registration("ada")).unwrap();
        assert_eq!(user.username, "ada");

        let ok = LoginRequest {
            email: "ada@example.com".into(),
            password: "correct horse".into(),
        };
        assert_eq!(check_credentials(&db, &ok).unwrap().0, user.id);

        let wrong = LoginRequest {
            email: "ada@example.com".into(),
            password: "battery staple".into(),
        };
        assert!(matches!(
            check_credentials(&db, &wrong),
            Err(ApiError::Validation { field: "credentials", .. })
        ));
    }

    #[test]
    fn duplicate_registration_is_already_exists() {
        let db = testutil::db();
        register_user(&db, &registration("ada")).unwrap();
        assert!(matches!(
            register_user(&db, &registration("ada")),
            Err(ApiError::AlreadyExists(_))
        ));
    }

    #[test]
    fn password_change_requires_the_current_password() {
        let db = testutil::db();
        let user = register_user(&db, &registration("ada")).unwrap();
        let actor = Actor {
            id: user.id,
            username: user.username,
            role: Role::User,
        };

        let wrong = SetPasswordRequest {
            new_password: "a brand new one".into(),
            current_password: "not it at all".into(),
        };
        assert!(change_password(&db, &actor, &wrong).is_err());

        let right = SetPasswordRequest {
            new_password: "a brand new one".into(),
            current_password: "correct horse".into(),
        };
        change_password(&db, &actor, &right).unwrap();

        let login = LoginRequest {
            email: "ada@example.com".into(),
            password: "a brand new one".into(),
        };
        assert!(check_credentials(&db, &login).is_ok());
    }

    #[test]
    fn tokens_carry_the_user_id_and_reject_other_secrets() {
        let token = create_token("secret-a", chrono::Duration::hours(1), 42, "ada").unwrap();
        assert_eq!(decode_token("secret-a", &token).unwrap().sub, 42);
        assert!(matches!(
            decode_token("secret-b", &token),
            Err(ApiError::Unauthorized)
        ));
    }
}
