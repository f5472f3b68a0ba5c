//! Base-URL handling shared by the completion and article clients.

/// Strip trailing slashes so endpoints can be appended safely.
///
/// ```
/// use blendchat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://openrouter.ai/api/v1/"), "https://openrouter.ai/api/v1");
/// assert_eq!(normalize_base_url("https://openrouter.ai/api/v1///"), "https://openrouter.ai/api/v1");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path with exactly one slash.
///
/// ```
/// use blendchat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.spaceflightnewsapi.net/v4/", "/articles"),
///     "https://api.spaceflightnewsapi.net/v4/articles"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Accept only absolute http(s) URLs with a host; returns the normalized form.
pub fn validate_base_url(candidate: &str) -> Result<String, String> {
    let trimmed = candidate.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| format!("'{trimmed}' must start with http:// or https://"))?;
    if rest.trim_start_matches('/').is_empty() || rest.starts_with('/') {
        return Err(format!("'{trimmed}' has no host"));
    }
    Ok(normalize_base_url(trimmed))
}
