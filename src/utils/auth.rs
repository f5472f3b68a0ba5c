//! Request headers for OpenRouter-style chat completions.

/// Header OpenRouter reads to attribute traffic to an application name.
pub const TITLE_HEADER: &str = "X-Title";
/// Header OpenRouter reads to attribute traffic to an application URL.
pub const REFERER_HEADER: &str = "HTTP-Referer";

/// Add the bearer token and the optional attribution headers.
///
/// Empty attribution values are skipped rather than sent blank.
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    api_key: &str,
    app_title: Option<&str>,
    referer: Option<&str>,
) -> reqwest::RequestBuilder {
    let mut request = request.header("Authorization", format!("Bearer {api_key}"));
    if let Some(title) = app_title.filter(|t| !t.trim().is_empty()) {
        request = request.header(TITLE_HEADER, title);
    }
    if let Some(referer) = referer.filter(|r| !r.trim().is_empty()) {
        request = request.header(REFERER_HEADER, referer);
    }
    request
}
