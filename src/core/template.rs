//! Path Templating
//!
//! Positional `{placeholder}` substitution for login targets such as
//! `auth/{mount}/login/{role}`. Variable values are URL-encoded.

/// Render a path template by substituting placeholders in order.
///
/// Surplus placeholders are left untouched; surplus variables are ignored.
pub fn render_path(template: &str, vars: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut vars = vars.iter();

    while let Some(open) = rest.find('{') {
        match rest[open..].find('}') {
            Some(close) => {
                out.push_str(&rest[..open]);
                match vars.next() {
                    Some(var) => out.push_str(&urlencoding::encode(var)),
                    None => out.push_str(&rest[open..open + close + 1]),
                }
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }

    out.push_str(rest);
    out
}

/// Join a service base URL and an API path under the `/v1/` prefix.
pub fn api_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/v1/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
