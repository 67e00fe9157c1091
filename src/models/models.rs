use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// === Stored documents ===

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string, never the plain password.
    pub password: String,
    pub profile_picture: String,
    #[serde(default)]
    pub followers: Vec<String>,
    #[serde(default)]
    pub following: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// One row of the `users_list` directory. Username and email never change
/// after signup, so uniqueness is decided on the directory alone.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserEntry {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserEntry {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author: String,
    pub content: String,
    pub image: Option<String>,
    pub category: String,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.iter().any(|id| id == user_id)
    }

    /// Flips `user_id` in the like-set and returns whether it is now liked.
    pub fn toggle_like(&mut self, user_id: &str) -> bool {
        let liked = if self.is_liked_by(user_id) {
            self.likes.retain(|id| id != user_id);
            false
        } else {
            self.likes.push(user_id.to_string());
            true
        };
        self.sync_counts();
        liked
    }

    pub fn push_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
        self.sync_counts();
    }

    pub fn find_comment(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == comment_id)
    }

    pub fn remove_comment(&mut self, comment_id: &str) -> Option<Comment> {
        let idx = self.comments.iter().position(|c| c.id == comment_id)?;
        let removed = self.comments.remove(idx);
        self.sync_counts();
        Some(removed)
    }

    /// Counters are derived from the backing collections, so they can't drift
    /// or go below zero.
    pub fn sync_counts(&mut self) {
        self.like_count = self.likes.len() as u64;
        self.comment_count = self.comments.len() as u64;
    }
}

// === Response views ===

/// A user as exposed over the API: everything but the password hash.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub profile_picture: String,
    pub followers: Vec<String>,
    pub following: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            profile_picture: user.profile_picture.clone(),
            followers: user.followers.clone(),
            following: user.following.clone(),
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: String,
    pub username: Option<String>,
    pub profile_picture: Option<String>,
}

impl AuthorSummary {
    pub fn unresolved(id: &str) -> Self {
        Self {
            id: id.to_string(),
            username: None,
            profile_picture: None,
        }
    }
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: Some(user.username.clone()),
            profile_picture: Some(user.profile_picture.clone()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub author: AuthorSummary,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub author: AuthorSummary,
    pub content: String,
    pub image: Option<String>,
    pub category: String,
    pub likes: Vec<String>,
    pub like_count: u64,
    pub comments: Vec<CommentView>,
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: PublicUser,
}

// === Request bodies ===
// Fields are optional so a missing field becomes a 400 from the handler
// instead of a generic parse failure.

#[derive(Deserialize, Debug, Default)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePictureRequest {
    pub profile_picture: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct CreatePostRequest {
    pub content: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct CommentRequest {
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> Post {
        Post {
            id: "p".into(),
            author: "a".into(),
            content: "hi".into(),
            image: None,
            category: "All Posts".into(),
            likes: vec![],
            like_count: 0,
            comments: vec![],
            comment_count: 0,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn like_toggle_keeps_count_equal_to_set_size() {
        let mut p = post();
        assert!(p.toggle_like("u1"));
        assert!(p.toggle_like("u2"));
        assert_eq!((p.like_count, p.likes.len()), (2, 2));
        assert!(!p.toggle_like("u1"));
        assert_eq!(p.like_count, 1);
        assert_eq!(p.likes, vec!["u2".to_string()]);
    }

    #[test]
    fn stale_counter_is_repaired_not_decremented_below_zero() {
        let mut p = post();
        p.likes.push("u1".into());
        p.like_count = 0;
        p.toggle_like("u1");
        assert_eq!(p.like_count, 0);
        assert!(p.likes.is_empty());
    }

    #[test]
    fn public_user_serialization_has_no_password() {
        let user = User {
            id: "1".into(),
            username: "alice".into(),
            email: "alice@x.com".into(),
            password: "$argon2id$secret".into(),
            profile_picture: "data:,".into(),
            followers: vec![],
            following: vec![],
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(PublicUser::from(&user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["profilePicture"], "data:,");
    }
}
