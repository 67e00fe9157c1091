use std::sync::OnceLock;

use regex::Regex;
use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::auth::validate_token;
use crate::config::*;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::{
    hash_password, json_response, new_id, non_empty, now_utc, parse_json_body, validate_uuid,
    verify_password,
};
use crate::core::query_params::{get_string, parse_query_params};
use crate::core::store::{KvStore, KvStoreExt};
use crate::models::models::{
    AuthResponse, ProfilePictureRequest, PublicUser, SignupRequest, User, UserEntry,
};
use crate::state::AppState;

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Regex should compile"))
}

// === Credential store ===

/// The `users_list` directory in signup order.
pub fn load_directory(store: &dyn KvStore) -> ApiResult<Vec<UserEntry>> {
    Ok(store.get_json(USERS_LIST_KEY)?.unwrap_or_default())
}

pub fn load_users(store: &dyn KvStore) -> ApiResult<Vec<User>> {
    let entries = load_directory(store)?;
    let mut users = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(user) = store.get_json::<User>(&user_key(&entry.id))? {
            users.push(user);
        }
    }
    Ok(users)
}

pub fn find_user(store: &dyn KvStore, user_id: &str) -> ApiResult<Option<User>> {
    if !validate_uuid(user_id) {
        return Ok(None);
    }
    Ok(store.get_json(&user_key(user_id))?)
}

pub fn get_user(store: &dyn KvStore, user_id: &str) -> ApiResult<User> {
    find_user(store, user_id)?.ok_or_else(|| ApiError::not_found("User not found"))
}

pub fn find_by_email(store: &dyn KvStore, email: &str) -> ApiResult<Option<User>> {
    match load_directory(store)?.into_iter().find(|e| e.email == email) {
        Some(entry) => find_user(store, &entry.id),
        None => Ok(None),
    }
}

pub fn save_user(store: &dyn KvStore, user: &User) -> ApiResult<()> {
    store.set_json(&user_key(&user.id), user)?;
    Ok(())
}

fn already_exists() -> ApiError {
    ApiError::Conflict("User already exists with that email or username".to_string())
}

fn is_taken(directory: &[UserEntry], username: &str, email: &str) -> bool {
    directory
        .iter()
        .any(|e| e.username == username || e.email == email)
}

/// Username and email are stored exactly as submitted and compared exactly.
pub fn register(store: &dyn KvStore, username: &str, email: &str, password: &str) -> ApiResult<User> {
    if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("All fields are required"));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    if !email_regex().is_match(email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    // Early reject before hashing. The directory update below is authoritative.
    if is_taken(&load_directory(store)?, username, email) {
        return Err(already_exists());
    }

    let user = User {
        id: new_id(),
        username: username.to_string(),
        email: email.to_string(),
        password: hash_password(password)?,
        profile_picture: DEFAULT_PROFILE_PICTURE.to_string(),
        followers: Vec::new(),
        following: Vec::new(),
        created_at: now_utc(),
    };
    save_user(store, &user)?;

    let claimed = store.update_json(USERS_LIST_KEY, |directory: &mut Vec<UserEntry>| {
        if is_taken(directory, &user.username, &user.email) {
            return Err(already_exists());
        }
        directory.push(UserEntry::from(&user));
        Ok(())
    });
    if let Err(err) = claimed {
        store.delete(&user_key(&user.id))?;
        return Err(err);
    }

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Same error for unknown email and wrong password.
pub fn authenticate(store: &dyn KvStore, email: &str, password: &str) -> ApiResult<User> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    match find_by_email(store, email)? {
        Some(user) if verify_password(password, &user.password) => Ok(user),
        _ => Err(ApiError::Unauthorized("Invalid email or password".to_string())),
    }
}

/// Case-insensitive substring match on username or email.
pub fn search(store: &dyn KvStore, query: &str) -> ApiResult<Vec<User>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(Vec::new());
    }

    Ok(load_users(store)?
        .into_iter()
        .filter(|u| {
            u.username.to_lowercase().contains(&needle) || u.email.to_lowercase().contains(&needle)
        })
        .take(USER_SEARCH_LIMIT)
        .collect())
}

pub fn set_profile_picture(store: &dyn KvStore, user_id: &str, image: Option<&str>) -> ApiResult<User> {
    let image = non_empty(image).ok_or_else(|| ApiError::bad_request("Profile picture is required"))?;
    let mut user = get_user(store, user_id)?;
    user.profile_picture = image.to_string();
    save_user(store, &user)?;
    Ok(user)
}

// === HTTP Handlers ===

pub fn create_user(app: &AppState, req: &Request) -> ApiResult<Response> {
    let body: SignupRequest = parse_json_body(req)?;
    let user = register(
        app.store(),
        body.username.as_deref().unwrap_or_default(),
        body.email.as_deref().unwrap_or_default(),
        body.password.as_deref().unwrap_or_default(),
    )?;

    let token = app.tokens.issue(&user.id)?;
    json_response(
        201,
        &AuthResponse {
            message: "User created successfully".to_string(),
            token,
            user: PublicUser::from(&user),
        },
    )
}

pub fn get_profile(app: &AppState, req: &Request) -> ApiResult<Response> {
    let user_id = validate_token(app, req)?;
    let user = get_user(app.store(), &user_id)?;
    json_response(200, &PublicUser::from(&user))
}

pub fn search_users(app: &AppState, req: &Request) -> ApiResult<Response> {
    let params = parse_query_params(req.uri());
    let query = get_string(&params, "q", None).unwrap_or_default();

    let users: Vec<PublicUser> = search(app.store(), &query)?
        .iter()
        .map(PublicUser::from)
        .collect();
    json_response(200, &users)
}

pub fn update_profile_picture(app: &AppState, req: &Request) -> ApiResult<Response> {
    let user_id = validate_token(app, req)?;
    let body: ProfilePictureRequest = parse_json_body(req)?;

    let user = set_profile_picture(app.store(), &user_id, body.profile_picture.as_deref())?;
    info!(user_id = %user.id, "profile picture updated");

    json_response(
        200,
        &serde_json::json!({
            "message": "Profile picture updated successfully",
            "user": PublicUser::from(&user),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;

    #[test]
    fn register_then_authenticate() {
        let store = MemoryStore::new();
        let user = register(&store, "alice", "alice@x.com", "secret1").unwrap();

        assert_ne!(user.password, "secret1");
        assert_eq!(user.profile_picture, DEFAULT_PROFILE_PICTURE);
        assert!(user.followers.is_empty() && user.following.is_empty());

        let logged_in = authenticate(&store, "alice@x.com", "secret1").unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[test]
    fn duplicate_username_or_email_conflicts() {
        let store = MemoryStore::new();
        register(&store, "alice", "alice@x.com", "secret1").unwrap();

        let same_email = register(&store, "alice2", "alice@x.com", "secret1").unwrap_err();
        assert!(matches!(same_email, ApiError::Conflict(_)));

        let same_name = register(&store, "alice", "other@x.com", "secret1").unwrap_err();
        assert!(matches!(same_name, ApiError::Conflict(_)));

        // exact match only
        register(&store, "Alice", "ALICE@x.com", "secret1").unwrap();
    }

    #[test]
    fn register_validates_input() {
        let store = MemoryStore::new();
        for (name, email, pass) in [
            ("", "a@x.com", "secret1"),
            ("bob", "", "secret1"),
            ("bob", "a@x.com", ""),
            ("bob", "not-an-email", "secret1"),
            ("bob", "a@x.com", "123"),
            ("   ", "a@x.com", "secret1"),
            ("bob", " a@x.com", "secret1"),
        ] {
            let err = register(&store, name, email, pass).unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(_)), "{name:?} {email:?}");
        }
    }

    #[test]
    fn username_is_stored_exactly_as_submitted() {
        let store = MemoryStore::new();
        let tom = register(&store, "tom&jerry", "tom@x.com", "secret1").unwrap();
        assert_eq!(tom.username, "tom&jerry");
        assert_eq!(get_user(&store, &tom.id).unwrap().username, "tom&jerry");

        let found = search(&store, "tom&jerry").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, tom.id);

        // a different string, so no conflict
        register(&store, "tom&amp;jerry", "tom2@x.com", "secret1").unwrap();
        let angle = register(&store, "a<b", "ab@x.com", "secret1").unwrap();
        assert_eq!(angle.username, "a<b");
    }

    #[test]
    fn concurrent_signups_all_land_in_the_directory() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    register(store.as_ref(), &format!("user{i}"), &format!("u{i}@x.com"), "secret1").unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(load_directory(store.as_ref()).unwrap().len(), 8);
        assert_eq!(load_users(store.as_ref()).unwrap().len(), 8);
        for i in 0..8 {
            authenticate(store.as_ref(), &format!("u{i}@x.com"), "secret1").unwrap();
        }
        assert!(matches!(
            register(store.as_ref(), "user0", "u0@x.com", "secret1"),
            Err(ApiError::Conflict(_))
        ));
    }

    #[test]
    fn racing_duplicate_signups_leave_one_account() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || register(store.as_ref(), "same", "same@x.com", "secret1").is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(load_directory(store.as_ref()).unwrap().len(), 1);
    }

    #[test]
    fn wrong_password_and_unknown_email_look_the_same() {
        let store = MemoryStore::new();
        register(&store, "alice", "alice@x.com", "secret1").unwrap();

        let wrong = authenticate(&store, "alice@x.com", "nope").unwrap_err();
        let unknown = authenticate(&store, "ghost@x.com", "secret1").unwrap_err();
        assert!(matches!(wrong, ApiError::Unauthorized(_)));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[test]
    fn search_is_case_insensitive_and_capped() {
        let store = MemoryStore::new();
        for i in 0..22 {
            register(&store, &format!("Member{i}"), &format!("m{i}@x.com"), "secret1").unwrap();
        }
        register(&store, "zed", "zed@Example.org", "secret1").unwrap();

        assert_eq!(search(&store, "member").unwrap().len(), USER_SEARCH_LIMIT);
        let by_email = search(&store, "EXAMPLE").unwrap();
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].username, "zed");
        assert!(search(&store, "").unwrap().is_empty());
        assert!(search(&store, "   ").unwrap().is_empty());
    }

    #[test]
    fn profile_picture_update() {
        let store = MemoryStore::new();
        let user = register(&store, "alice", "alice@x.com", "secret1").unwrap();

        let updated = set_profile_picture(&store, &user.id, Some("data:image/png;base64,AAAA")).unwrap();
        assert_eq!(updated.profile_picture, "data:image/png;base64,AAAA");
        assert_eq!(get_user(&store, &user.id).unwrap().profile_picture, updated.profile_picture);

        assert!(matches!(
            set_profile_picture(&store, &user.id, None),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            set_profile_picture(&store, &new_id(), Some("data:,x")),
            Err(ApiError::NotFound(_))
        ));
    }
}
