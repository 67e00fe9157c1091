use spin_sdk::http::{Method, Request, Response};
use tracing::debug;

use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::json_response;
use crate::state::AppState;
use crate::{follow, interactions, posts, users};

fn method_name(method: &Method) -> &'static str {
    match method {
        Method::Get => "GET",
        Method::Post => "POST",
        Method::Put => "PUT",
        Method::Delete => "DELETE",
        Method::Patch => "PATCH",
        Method::Head => "HEAD",
        Method::Options => "OPTIONS",
        _ => "OTHER",
    }
}

/// Path portion of a request URI, which may be absolute (`http://host/x?y`)
/// or origin-form (`/x?y`).
fn request_path(uri: &str) -> &str {
    let without_scheme = match uri.find("://") {
        Some(idx) => {
            let rest = &uri[idx + 3..];
            rest.find('/').map_or("/", |slash| &rest[slash..])
        }
        None => uri,
    };
    let end = without_scheme.find(['?', '#']).unwrap_or(without_scheme.len());
    &without_scheme[..end]
}

/// Splits the path into segments, dropping the optional `/api` mount prefix.
fn route_segments(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.first() == Some(&"api") {
        segments.remove(0);
    }
    segments
}

pub fn handle_request(app: &AppState, req: Request) -> Response {
    let method = method_name(req.method());
    let path = request_path(req.uri()).to_string();
    debug!(method, path = %path, "request");

    let segments = route_segments(&path);
    let result: ApiResult<Response> = match (method, segments.as_slice()) {
        ("GET", ["health"]) => health(),

        ("POST", ["auth", "signup"]) => users::create_user(app, &req),
        ("POST", ["auth", "login"]) => crate::auth::login_user(app, &req),
        ("GET", ["auth", "me"]) => users::get_profile(app, &req),
        ("GET", ["auth", "search"]) => users::search_users(app, &req),
        ("POST", ["auth", "follow", user_id]) => follow::handle_follow(app, &req, user_id),
        ("PUT", ["auth", "profile-picture"]) => users::update_profile_picture(app, &req),

        ("POST", ["posts"]) => posts::create_post(app, &req),
        ("GET", ["posts"]) => posts::list_posts(app, &req),
        // before /posts/:postId
        ("GET", ["posts", "search"]) => posts::search_posts(app, &req),
        ("GET", ["posts", post_id]) => posts::get_post(app, post_id),
        ("DELETE", ["posts", post_id]) => posts::delete_post(app, &req, post_id),
        ("POST", ["posts", post_id, "like"]) => interactions::like_post(app, &req, post_id),
        ("POST", ["posts", post_id, "comment"]) => interactions::comment_post(app, &req, post_id),
        ("DELETE", ["posts", post_id, "comment", comment_id]) => {
            interactions::remove_comment(app, &req, post_id, comment_id)
        }

        _ => Err(ApiError::not_found("Route not found")),
    };

    result.unwrap_or_else(Response::from)
}

fn health() -> ApiResult<Response> {
    json_response(
        200,
        &serde_json::json!({
            "status": "Server is running",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }),
    )
}
