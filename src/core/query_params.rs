use std::collections::HashMap;

/// Parse query parameters from a URI string
///
/// Handles URL decoding (including `+` as space) and returns a HashMap of
/// parameter key-value pairs. Repeated keys keep the last value.
///
/// # Example
/// ```
/// use plaza::core::query_params::parse_query_params;
///
/// let params = parse_query_params("/posts?category=Promotions&sortBy=likes");
/// assert_eq!(params.get("category"), Some(&"Promotions".to_string()));
/// assert_eq!(params.get("sortBy"), Some(&"likes".to_string()));
/// ```
pub fn parse_query_params(uri: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    if let Some(query_start) = uri.find('?') {
        let query = &uri[query_start + 1..];
        for param in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = match param.find('=') {
                Some(eq_idx) => (&param[..eq_idx], decode(&param[eq_idx + 1..])),
                // Flag parameter without value
                None => (param, String::new()),
            };
            params.insert(decode(key), value);
        }
    }

    params
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

/// Get a string parameter from parsed query params with optional default
pub fn get_string(params: &HashMap<String, String>, key: &str, default: Option<&str>) -> Option<String> {
    params
        .get(key)
        .cloned()
        .or_else(|| default.map(|d| d.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_percent_and_plus() {
        let params = parse_query_params("/posts/search?q=hello+world&category=All%20Posts");
        assert_eq!(params.get("q").unwrap(), "hello world");
        assert_eq!(params.get("category").unwrap(), "All Posts");
    }

    #[test]
    fn empty_value_and_flag_are_empty_strings() {
        let params = parse_query_params("/auth/search?q=&verbose");
        assert_eq!(params.get("q").unwrap(), "");
        assert_eq!(params.get("verbose").unwrap(), "");
    }

    #[test]
    fn no_query_string_means_no_params() {
        assert!(parse_query_params("/posts").is_empty());
        assert_eq!(get_string(&parse_query_params("/posts"), "sortBy", Some("newest")).unwrap(), "newest");
    }
}
