/// Default base URL for completion requests.
pub const DEFAULT_RESPONSES_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Normalize a base URL to its `/responses` endpoint.
///
/// A URL already ending in `/responses` is kept; a blank input falls back to
/// [`DEFAULT_RESPONSES_BASE_URL`].
pub fn normalize_responses_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_RESPONSES_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/responses") {
        return trimmed.to_string();
    }
    format!("{trimmed}/responses")
}
