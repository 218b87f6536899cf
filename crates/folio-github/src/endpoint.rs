//! Validation of caller-influenced path fragments.
//!
//! The HTTP layer only accepts a [`ValidatedPath`], and the only way to get
//! one is through [`validate_endpoint`]. A raw string can therefore never be
//! joined onto the trusted base URL.
//!
//! Every check is a linear scan; no regular expressions are involved.

use std::fmt;

use crate::error::GithubError;

/// A relative path (optionally with a query string) that is safe to join
/// onto the trusted upstream base URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedPath(String);

impl ValidatedPath {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates a path fragment destined for `{base}/{fragment}`.
///
/// Surrounding whitespace is trimmed first. Rejections, in order:
///
/// 1. contains a scheme separator `://`;
/// 2. starts with `//`, or contains `//` once the single leading and
///    trailing slashes are stripped;
/// 3. contains a parent-directory sequence `..`;
/// 4. contains anything outside ASCII letters, digits and `/ - _ ? & = .`.
///
/// An empty fragment is rejected as well.
///
/// # Errors
///
/// Returns [`GithubError::InvalidEndpoint`] naming the rule that failed.
pub fn validate_endpoint(raw: &str) -> Result<ValidatedPath, GithubError> {
    let trimmed = raw.trim();

    if trimmed.contains("://") {
        return Err(invalid("protocol scheme is not allowed"));
    }
    if trimmed.starts_with("//") {
        return Err(invalid("protocol-relative path is not allowed"));
    }

    let path = trimmed.trim_matches('/');
    if path.is_empty() {
        return Err(invalid("endpoint is empty"));
    }
    if path.contains("//") {
        return Err(invalid("empty path segment is not allowed"));
    }
    if path.contains("..") {
        return Err(invalid("parent-directory sequence is not allowed"));
    }
    if !path.chars().all(is_allowed) {
        return Err(invalid("endpoint contains a disallowed character"));
    }

    Ok(ValidatedPath(path.to_string()))
}

/// Validates a value that will be interpolated as exactly one path segment,
/// such as a username or repository name.
///
/// Applies the same character rules as [`validate_endpoint`] and additionally
/// rejects separators (`/ ? & =`) so the value cannot add segments or query
/// parameters of its own.
///
/// # Errors
///
/// Returns [`GithubError::InvalidEndpoint`] naming the rule that failed.
pub fn validate_segment(raw: &str) -> Result<&str, GithubError> {
    let segment = raw.trim();
    if segment.is_empty() {
        return Err(invalid("path segment is empty"));
    }
    if segment.contains("..") {
        return Err(invalid("parent-directory sequence is not allowed"));
    }
    if segment
        .chars()
        .any(|c| matches!(c, '/' | '?' | '&' | '=') || !is_allowed(c))
    {
        return Err(invalid("path segment contains a disallowed character"));
    }
    Ok(segment)
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '?' | '&' | '=' | '.')
}

fn invalid(reason: &'static str) -> GithubError {
    GithubError::InvalidEndpoint { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejects(raw: &str) -> bool {
        matches!(
            validate_endpoint(raw),
            Err(GithubError::InvalidEndpoint { .. })
        )
    }

    #[test]
    fn accepts_simple_user_endpoint() {
        assert_eq!(validate_endpoint("users/testuser").unwrap().as_str(), "users/testuser");
    }

    #[test]
    fn accepts_languages_endpoint() {
        assert_eq!(
            validate_endpoint("repos/owner/repo/languages").unwrap().as_str(),
            "repos/owner/repo/languages"
        );
    }

    #[test]
    fn accepts_query_string() {
        let path = validate_endpoint("users/a/repos?per_page=100&page=2").unwrap();
        assert_eq!(path.as_str(), "users/a/repos?per_page=100&page=2");
    }

    #[test]
    fn trims_whitespace_and_single_slashes() {
        assert_eq!(validate_endpoint("  /users/x/  ").unwrap().as_str(), "users/x");
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(rejects("users/../admin"));
        assert!(rejects(".."));
        assert!(rejects("users/..%2fadmin"));
    }

    #[test]
    fn rejects_scheme_injection() {
        assert!(rejects("http://evil.com/api"));
        assert!(rejects("users/x?next=https://evil.com"));
    }

    #[test]
    fn rejects_protocol_relative() {
        assert!(rejects("//evil.com/api"));
        assert!(rejects("  //evil.com"));
        assert!(rejects("users//evil.com"));
    }

    #[test]
    fn rejects_disallowed_characters() {
        assert!(rejects("users/x y"));
        assert!(rejects("users/x#frag"));
        assert!(rejects("users/x\nHost: evil"));
        assert!(rejects("users/x%00"));
        assert!(rejects("users/ünïcode"));
    }

    #[test]
    fn rejects_empty() {
        assert!(rejects(""));
        assert!(rejects("   "));
        assert!(rejects("/"));
    }

    #[test]
    fn segment_rejects_separators() {
        assert!(validate_segment("octocat").is_ok());
        assert!(validate_segment("octo-cat_2.0").is_ok());
        assert!(validate_segment("octocat/repos").is_err());
        assert!(validate_segment("octocat?x=1").is_err());
        assert!(validate_segment("..").is_err());
        assert!(validate_segment("").is_err());
    }

    #[test]
    fn long_input_is_handled() {
        let long = "a/".repeat(50_000);
        assert!(validate_endpoint(&long).is_ok());
        let hostile = format!("{}!", "a".repeat(100_000));
        assert!(rejects(&hostile));
    }
}
