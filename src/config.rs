use std::str::FromStr;

// === Validation limits ===
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_POST_LENGTH: usize = 5000;
pub const MAX_COMMENT_LENGTH: usize = 1000;

// === Result caps ===
pub const POST_LIST_LIMIT: usize = 50;
pub const POST_SEARCH_LIMIT: usize = 20;
pub const USER_SEARCH_LIMIT: usize = 20;

pub const DEFAULT_CATEGORY: &str = "All Posts";

/// Placeholder avatar assigned at signup (inline SVG).
pub const DEFAULT_PROFILE_PICTURE: &str = "data:image/svg+xml;base64,PHN2ZyB4bWxucz0iaHR0cDovL3d3dy53My5vcmcvMjAwMC9zdmciIHdpZHRoPSI4MCIgaGVpZ2h0PSI4MCIgdmlld0JveD0iMCAwIDgwIDgwIj48Y2lyY2xlIGN4PSI0MCIgY3k9IjQwIiByPSI0MCIgZmlsbD0iIzRmN2NhYyIvPjxjaXJjbGUgY3g9IjQwIiBjeT0iMzEiIHI9IjEzIiBmaWxsPSIjZmZmIi8+PHBhdGggZD0iTTE2IDY2YzMtMTIgMTMtMTkgMjQtMTlzMjEgNyAyNCAxOXoiIGZpbGw9IiNmZmYiLz48L3N2Zz4=";

// === Store keys ===
pub const USERS_LIST_KEY: &str = "users_list";
pub const FEED_KEY: &str = "feed";

pub fn user_key(user_id: &str) -> String {
    format!("user:{}", user_id)
}

pub fn post_key(post_id: &str) -> String {
    format!("post:{}", post_id)
}

// === Runtime configuration ===
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_TOKEN_EXPIRATION_HOURS: i64 = 24 * 7;
/// Ten years; longer lifetimes are clamped.
pub const MAX_TOKEN_EXPIRATION_HOURS: i64 = 24 * 365 * 10;
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Process-wide settings, read once at startup and passed into [`crate::state::AppState`].
#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    /// HS256 key for bearer tokens. `None` means the caller has to supply one.
    pub token_secret: Option<Vec<u8>>,
    pub token_expiration_hours: i64,
    pub max_body_bytes: usize,
    pub seed_demo_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            token_secret: None,
            token_expiration_hours: DEFAULT_TOKEN_EXPIRATION_HOURS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            seed_demo_data: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("PLAZA_BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            token_secret: std::env::var("PLAZA_TOKEN_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .map(String::into_bytes),
            token_expiration_hours: token_expiration_hours(),
            max_body_bytes: env_or("PLAZA_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
            seed_demo_data: env_or("PLAZA_SEED_DEMO_DATA", false),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("token_secret", &self.token_secret.as_ref().map(|_| "<redacted>"))
            .field("token_expiration_hours", &self.token_expiration_hours)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("seed_demo_data", &self.seed_demo_data)
            .finish()
    }
}

pub fn token_expiration_hours() -> i64 {
    env_or("PLAZA_TOKEN_EXPIRATION_HOURS", DEFAULT_TOKEN_EXPIRATION_HOURS).clamp(1, MAX_TOKEN_EXPIRATION_HOURS)
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
