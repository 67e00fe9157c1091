use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::auth::validate_token;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::json_response;
use crate::core::store::KvStore;
use crate::models::models::User;
use crate::state::AppState;
use crate::users::{get_user, save_user};

pub fn is_following(store: &dyn KvStore, follower_id: &str, target_id: &str) -> ApiResult<bool> {
    let follower = get_user(store, follower_id)?;
    Ok(follower.following.iter().any(|id| id == target_id))
}

/// Makes the edge `follower -> target` present or absent on both user
/// documents and returns the resulting state. Calling it with the current
/// state rewrites both sides, which also repairs a one-sided edge.
///
/// The two writes are not transactional. Both documents are computed before
/// the first write; a store failure between the writes can still leave a
/// one-sided edge.
pub fn set_follow(store: &dyn KvStore, follower_id: &str, target_id: &str, desired: bool) -> ApiResult<bool> {
    if follower_id == target_id {
        return Err(ApiError::bad_request("Cannot follow yourself"));
    }

    let mut follower = get_user(store, follower_id)?;
    let mut target = get_user(store, target_id)?;

    if desired {
        add_edge(&mut follower.following, target_id);
        add_edge(&mut target.followers, follower_id);
    } else {
        follower.following.retain(|id| id != target_id);
        target.followers.retain(|id| id != follower_id);
    }

    save_pair(store, &target, &follower)?;
    Ok(desired)
}

/// Flips the follow state and returns the new `isFollowing`.
pub fn toggle_follow(store: &dyn KvStore, follower_id: &str, target_id: &str) -> ApiResult<bool> {
    if follower_id == target_id {
        return Err(ApiError::bad_request("Cannot follow yourself"));
    }
    // Resolve the target first so an unknown id is a 404 either way
    get_user(store, target_id)?;
    let currently = is_following(store, follower_id, target_id)?;
    set_follow(store, follower_id, target_id, !currently)
}

fn add_edge(edges: &mut Vec<String>, id: &str) {
    if !edges.iter().any(|e| e == id) {
        edges.push(id.to_string());
    }
}

fn save_pair(store: &dyn KvStore, first: &User, second: &User) -> ApiResult<()> {
    save_user(store, first)?;
    save_user(store, second)
}

// === HTTP Handlers ===

pub fn handle_follow(app: &AppState, req: &Request, target_user_id: &str) -> ApiResult<Response> {
    let user_id = validate_token(app, req)?;

    let now_following = toggle_follow(app.store(), &user_id, target_user_id)?;
    info!(follower = %user_id, target = %target_user_id, following = now_following, "follow toggled");

    let message = if now_following {
        "Followed successfully"
    } else {
        "Unfollowed successfully"
    };
    json_response(
        200,
        &serde_json::json!({
            "message": message,
            "isFollowing": now_following,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::helpers::new_id;
    use crate::core::store::MemoryStore;
    use crate::users::register;

    fn two_users(store: &MemoryStore) -> (String, String) {
        let a = register(store, "alice", "alice@x.com", "secret1").unwrap();
        let b = register(store, "bob", "bob@x.com", "secret1").unwrap();
        (a.id, b.id)
    }

    #[test]
    fn follow_is_symmetric_and_toggle_twice_restores() {
        let store = MemoryStore::new();
        let (a, b) = two_users(&store);

        assert!(toggle_follow(&store, &a, &b).unwrap());
        let alice = get_user(&store, &a).unwrap();
        let bob = get_user(&store, &b).unwrap();
        assert_eq!(alice.following, vec![b.clone()]);
        assert_eq!(bob.followers, vec![a.clone()]);
        assert!(alice.followers.is_empty() && bob.following.is_empty());

        assert!(!toggle_follow(&store, &a, &b).unwrap());
        let alice = get_user(&store, &a).unwrap();
        let bob = get_user(&store, &b).unwrap();
        assert!(alice.following.is_empty());
        assert!(bob.followers.is_empty());
    }

    #[test]
    fn cannot_follow_self() {
        let store = MemoryStore::new();
        let (a, _) = two_users(&store);
        assert!(matches!(toggle_follow(&store, &a, &a), Err(ApiError::BadRequest(_))));
        assert!(matches!(set_follow(&store, &a, &a, true), Err(ApiError::BadRequest(_))));
        assert!(get_user(&store, &a).unwrap().following.is_empty());
    }

    #[test]
    fn unknown_users_are_not_found() {
        let store = MemoryStore::new();
        let (a, _) = two_users(&store);
        assert!(matches!(toggle_follow(&store, &a, &new_id()), Err(ApiError::NotFound(_))));
        assert!(matches!(toggle_follow(&store, &new_id(), &a), Err(ApiError::NotFound(_))));
        assert!(matches!(toggle_follow(&store, &a, "garbage"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn set_follow_is_idempotent_and_repairs_one_sided_edges() {
        let store = MemoryStore::new();
        let (a, b) = two_users(&store);

        set_follow(&store, &a, &b, true).unwrap();
        set_follow(&store, &a, &b, true).unwrap();
        assert_eq!(get_user(&store, &a).unwrap().following, vec![b.clone()]);
        assert_eq!(get_user(&store, &b).unwrap().followers, vec![a.clone()]);

        // simulate a write lost between the two documents
        let mut bob = get_user(&store, &b).unwrap();
        bob.followers.clear();
        save_user(&store, &bob).unwrap();

        set_follow(&store, &a, &b, true).unwrap();
        assert_eq!(get_user(&store, &b).unwrap().followers, vec![a.clone()]);
    }
}
