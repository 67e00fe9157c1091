//! Like and comment state transitions on a single post document.
//!
//! Every operation is a read-modify-write of one post; the counters are
//! recomputed from the backing collections before the post is saved.

use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::auth::validate_token;
use crate::config::MAX_COMMENT_LENGTH;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::{json_response, new_id, now_utc, parse_json_body, present};
use crate::core::store::KvStore;
use crate::models::models::{Comment, CommentRequest, Post};
use crate::posts::{get_by_id, render, save};
use crate::state::AppState;

pub fn toggle_like(store: &dyn KvStore, post_id: &str, acting_user_id: &str) -> ApiResult<Post> {
    let mut post = get_by_id(store, post_id)?;
    let liked = post.toggle_like(acting_user_id);
    post.updated_at = Some(now_utc());
    save(store, &post)?;

    info!(post_id = %post.id, user = %acting_user_id, liked, like_count = post.like_count, "like toggled");
    Ok(post)
}

pub fn add_comment(store: &dyn KvStore, post_id: &str, acting_user_id: &str, text: Option<&str>) -> ApiResult<Post> {
    let mut post = get_by_id(store, post_id)?;

    let text = present(text).ok_or_else(|| ApiError::bad_request("Comment text is required"))?;
    if text.chars().count() > MAX_COMMENT_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_LENGTH
        )));
    }

    let now = now_utc();
    post.push_comment(Comment {
        id: new_id(),
        author: acting_user_id.to_string(),
        text: text.to_string(),
        created_at: now,
    });
    post.updated_at = Some(now);
    save(store, &post)?;

    info!(post_id = %post.id, user = %acting_user_id, comment_count = post.comment_count, "comment added");
    Ok(post)
}

/// Only the comment's author may delete it; owning the post is not enough.
pub fn delete_comment(store: &dyn KvStore, post_id: &str, comment_id: &str, acting_user_id: &str) -> ApiResult<Post> {
    let mut post = get_by_id(store, post_id)?;

    let comment = post
        .find_comment(comment_id)
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    if comment.author != acting_user_id {
        return Err(ApiError::forbidden("Not authorized to delete this comment"));
    }

    post.remove_comment(comment_id);
    post.updated_at = Some(now_utc());
    save(store, &post)?;

    info!(post_id = %post.id, comment_id = %comment_id, comment_count = post.comment_count, "comment deleted");
    Ok(post)
}

// === HTTP Handlers ===

pub fn like_post(app: &AppState, req: &Request, post_id: &str) -> ApiResult<Response> {
    let user_id = validate_token(app, req)?;
    let post = toggle_like(app.store(), post_id, &user_id)?;
    json_response(200, &render(app.store(), &post)?)
}

pub fn comment_post(app: &AppState, req: &Request, post_id: &str) -> ApiResult<Response> {
    let user_id = validate_token(app, req)?;
    let body: CommentRequest = parse_json_body(req)?;
    let post = add_comment(app.store(), post_id, &user_id, body.text.as_deref())?;
    json_response(201, &render(app.store(), &post)?)
}

pub fn remove_comment(app: &AppState, req: &Request, post_id: &str, comment_id: &str) -> ApiResult<Response> {
    let user_id = validate_token(app, req)?;
    let post = delete_comment(app.store(), post_id, comment_id, &user_id)?;
    json_response(200, &render(app.store(), &post)?)
}
