use std::collections::HashMap;

use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::auth::validate_token;
use crate::config::*;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::{
    json_response, message_response, new_id, non_empty, now_utc, parse_json_body, present, validate_uuid,
};
use crate::core::query_params::{get_string, parse_query_params};
use crate::core::store::{KvStore, KvStoreExt};
use crate::models::models::{AuthorSummary, CommentView, CreatePostRequest, Post, PostView};
use crate::state::AppState;
use crate::users::find_user;

/// Ordering for post listings. Ties keep feed order (newest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Likes,
    Comments,
    #[default]
    Newest,
}

impl SortKey {
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("likes") => SortKey::Likes,
            Some("comments") => SortKey::Comments,
            _ => SortKey::Newest,
        }
    }

    fn sort(self, posts: &mut [Post]) {
        match self {
            SortKey::Likes => posts.sort_by(|a, b| b.like_count.cmp(&a.like_count)),
            SortKey::Comments => posts.sort_by(|a, b| b.comment_count.cmp(&a.comment_count)),
            SortKey::Newest => posts.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
    }
}

/// "All Posts" (or nothing) means no filter.
fn category_filter(category: Option<&str>) -> Option<&str> {
    non_empty(category).filter(|c| *c != DEFAULT_CATEGORY)
}

fn matches_category(post: &Post, filter: Option<&str>) -> bool {
    filter.map_or(true, |c| post.category == c)
}

// === Post store ===

/// All posts in feed order, newest first.
pub fn load_feed(store: &dyn KvStore) -> ApiResult<Vec<Post>> {
    let ids: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    let mut posts = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(post) = store.get_json::<Post>(&post_key(&id))? {
            posts.push(post);
        }
    }
    Ok(posts)
}

pub fn save(store: &dyn KvStore, post: &Post) -> ApiResult<()> {
    store.set_json(&post_key(&post.id), post)?;
    Ok(())
}

pub fn create(
    store: &dyn KvStore,
    author_id: &str,
    content: Option<&str>,
    image: Option<&str>,
    category: Option<&str>,
) -> ApiResult<Post> {
    let content = present(content).ok_or_else(|| ApiError::bad_request("Content is required"))?;
    if content.chars().count() > MAX_POST_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Content must be at most {} characters",
            MAX_POST_LENGTH
        )));
    }

    let post = Post {
        id: new_id(),
        author: author_id.to_string(),
        content: content.to_string(),
        image: non_empty(image).map(str::to_string),
        category: non_empty(category).unwrap_or(DEFAULT_CATEGORY).to_string(),
        likes: Vec::new(),
        like_count: 0,
        comments: Vec::new(),
        comment_count: 0,
        created_at: now_utc(),
        updated_at: None,
    };
    save(store, &post)?;

    // Prepend newest
    store.update_json(FEED_KEY, |feed: &mut Vec<String>| {
        feed.insert(0, post.id.clone());
        Ok::<_, ApiError>(())
    })?;

    info!(post_id = %post.id, author = %author_id, category = %post.category, "post created");
    Ok(post)
}

pub fn get_by_id(store: &dyn KvStore, post_id: &str) -> ApiResult<Post> {
    let not_found = || ApiError::not_found("Post not found");
    if !validate_uuid(post_id) {
        return Err(not_found());
    }
    store.get_json::<Post>(&post_key(post_id))?.ok_or_else(not_found)
}

pub fn list(store: &dyn KvStore, category: Option<&str>, sort: SortKey) -> ApiResult<Vec<Post>> {
    let filter = category_filter(category);
    let mut posts: Vec<Post> = load_feed(store)?
        .into_iter()
        .filter(|p| matches_category(p, filter))
        .collect();

    sort.sort(&mut posts);
    posts.truncate(POST_LIST_LIMIT);
    Ok(posts)
}

/// Case-insensitive substring match on content, newest first.
pub fn search(store: &dyn KvStore, query: &str, category: Option<&str>) -> ApiResult<Vec<Post>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(Vec::new());
    }
    let filter = category_filter(category);

    let mut posts: Vec<Post> = load_feed(store)?
        .into_iter()
        .filter(|p| matches_category(p, filter) && p.content.to_lowercase().contains(&needle))
        .collect();

    SortKey::Newest.sort(&mut posts);
    posts.truncate(POST_SEARCH_LIMIT);
    Ok(posts)
}

pub fn delete(store: &dyn KvStore, post_id: &str, acting_user_id: &str) -> ApiResult<()> {
    let post = get_by_id(store, post_id)?;
    if post.author != acting_user_id {
        return Err(ApiError::forbidden("Not authorized to delete this post"));
    }

    store.delete(&post_key(post_id))?;

    store.update_json(FEED_KEY, |feed: &mut Vec<String>| {
        feed.retain(|id| id != post_id);
        Ok::<_, ApiError>(())
    })?;

    info!(post_id = %post_id, "post deleted");
    Ok(())
}

// === Rendering ===

/// Resolves author summaries, loading each user at most once per response.
struct AuthorCache<'a> {
    store: &'a dyn KvStore,
    seen: HashMap<String, AuthorSummary>,
}

impl<'a> AuthorCache<'a> {
    fn new(store: &'a dyn KvStore) -> Self {
        Self {
            store,
            seen: HashMap::new(),
        }
    }

    fn resolve(&mut self, user_id: &str) -> ApiResult<AuthorSummary> {
        if let Some(summary) = self.seen.get(user_id) {
            return Ok(summary.clone());
        }
        let summary = match find_user(self.store, user_id)? {
            Some(user) => AuthorSummary::from(&user),
            None => AuthorSummary::unresolved(user_id),
        };
        self.seen.insert(user_id.to_string(), summary.clone());
        Ok(summary)
    }

    fn view(&mut self, post: &Post) -> ApiResult<PostView> {
        let comments = post
            .comments
            .iter()
            .map(|c| {
                Ok(CommentView {
                    id: c.id.clone(),
                    author: self.resolve(&c.author)?,
                    text: c.text.clone(),
                    created_at: c.created_at,
                })
            })
            .collect::<ApiResult<Vec<_>>>()?;

        Ok(PostView {
            id: post.id.clone(),
            author: self.resolve(&post.author)?,
            content: post.content.clone(),
            image: post.image.clone(),
            category: post.category.clone(),
            likes: post.likes.clone(),
            like_count: post.like_count,
            comments,
            comment_count: post.comment_count,
            created_at: post.created_at,
            updated_at: post.updated_at,
        })
    }
}

pub fn render(store: &dyn KvStore, post: &Post) -> ApiResult<PostView> {
    AuthorCache::new(store).view(post)
}

pub fn render_all(store: &dyn KvStore, posts: &[Post]) -> ApiResult<Vec<PostView>> {
    let mut cache = AuthorCache::new(store);
    posts.iter().map(|p| cache.view(p)).collect()
}

// === HTTP Handlers ===

pub fn create_post(app: &AppState, req: &Request) -> ApiResult<Response> {
    let user_id = validate_token(app, req)?;
    let body: CreatePostRequest = parse_json_body(req)?;

    let post = create(
        app.store(),
        &user_id,
        body.content.as_deref(),
        body.image.as_deref(),
        body.category.as_deref(),
    )?;
    json_response(201, &render(app.store(), &post)?)
}

pub fn list_posts(app: &AppState, req: &Request) -> ApiResult<Response> {
    let params = parse_query_params(req.uri());
    let category = get_string(&params, "category", None);
    let sort = SortKey::from_param(params.get("sortBy").map(String::as_str));

    let posts = list(app.store(), category.as_deref(), sort)?;
    json_response(200, &render_all(app.store(), &posts)?)
}

pub fn search_posts(app: &AppState, req: &Request) -> ApiResult<Response> {
    let params = parse_query_params(req.uri());
    let query = get_string(&params, "q", None).unwrap_or_default();
    let category = get_string(&params, "category", None);

    let posts = search(app.store(), &query, category.as_deref())?;
    json_response(200, &render_all(app.store(), &posts)?)
}

pub fn get_post(app: &AppState, post_id: &str) -> ApiResult<Response> {
    let post = get_by_id(app.store(), post_id)?;
    json_response(200, &render(app.store(), &post)?)
}

pub fn delete_post(app: &AppState, req: &Request, post_id: &str) -> ApiResult<Response> {
    let user_id = validate_token(app, req)?;
    delete(app.store(), post_id, &user_id)?;
    message_response(200, "Post deleted")
}
