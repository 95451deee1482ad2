//! Shared utility functions

/// Maximum length of an error message in logs and responses.
const MAX_LOG_MESSAGE_LEN: usize = 200;

/// Sanitize an error message before logging or returning it to a client.
///
/// Replaces CR, LF and TAB with single spaces so a crafted upstream error
/// cannot inject extra log lines, then truncates to 200 characters.
///
/// # Examples
///
/// ```
/// use parallax_server::util::sanitize_message;
///
/// assert_eq!(sanitize_message("a\nb\rc\td"), "a b c d");
/// ```
pub fn sanitize_message(message: &str) -> String {
    let cleaned: String = message
        .chars()
        .map(|c| if matches!(c, '\r' | '\n' | '\t') { ' ' } else { c })
        .collect();

    if cleaned.chars().count() <= MAX_LOG_MESSAGE_LEN {
        cleaned
    } else {
        let truncated: String = cleaned.chars().take(MAX_LOG_MESSAGE_LEN).collect();
        format!("{truncated}…")
    }
}

/// Escape a string for interpolation into HTML text content.
pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Mask a secret header value for request logs.
///
/// Keeps the first four characters so operators can distinguish keys
/// without exposing them.
pub fn mask_token(token: &str) -> String {
    if token.len() <= 4 {
        "****".to_string()
    } else {
        let prefix: String = token.chars().take(4).collect();
        format!("{prefix}****")
    }
}
