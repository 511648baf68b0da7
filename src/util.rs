/// Truncate to at most `max` characters, marking the cut with "...".
pub fn truncate(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }

    let char_count = s.chars().count();
    if char_count <= max {
        return s.to_string();
    }

    if max <= 3 {
        return s.chars().take(max).collect();
    }

    let truncated: String = s.chars().take(max - 3).collect();
    format!("{}...", truncated)
}

/// Maximum length for provider response bodies quoted in error messages
const MAX_ERROR_CONTENT_LEN: usize = 300;

/// Prepare a provider response body for an error message.
///
/// Bodies that look like they echo credentials are replaced entirely.
pub fn sanitize_api_response(content: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "api_key",
        "apikey",
        "x-api-key",
        "secret",
        "password",
        "credential",
        "bearer",
    ];

    let truncated = truncate(content.trim(), MAX_ERROR_CONTENT_LEN);

    let lower = truncated.to_lowercase();
    let echoes_secret = SECRET_PATTERNS.iter().any(|pattern| lower.contains(pattern))
        || contains_key_prefix(&lower, "sk-");
    if echoes_secret {
        return "(response details redacted - may contain sensitive data)".to_string();
    }

    truncated
}

/// `prefix` occurring at the start of a word, so "sk-" matches a key but not
/// "task-" or "disk-"
fn contains_key_prefix(text: &str, prefix: &str) -> bool {
    text.match_indices(prefix).any(|(start, _)| {
        text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric())
    })
}

/// Mask a credential for display, keeping only the last four characters.
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{}", tail)
}
