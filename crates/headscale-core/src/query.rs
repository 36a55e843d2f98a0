//! Convenience builder for HTTP query parameters.
//!
//! Optional values are skipped entirely, so an absent filter never reaches
//! Headscale as an empty string.

use std::fmt::Display;

/// Builder for assembling query parameter pairs.
#[derive(Debug, Default, Clone)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Append a key/value pair when the value is present.
    pub fn push_opt<T>(&mut self, key: &'static str, value: Option<T>)
    where
        T: Display,
    {
        if let Some(value) = value {
            self.pairs.push((key, value.to_string()));
        }
    }

    /// Append a required key/value pair.
    pub fn push<T>(&mut self, key: &'static str, value: T)
    where
        T: Display,
    {
        self.pairs.push((key, value.to_string()));
    }

    /// Return the collected key/value pairs.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(&'static str, String)> {
        self.pairs
    }

    /// Returns true if no parameters have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::QueryParams;

    #[test]
    fn push_opt_skips_none() {
        let mut params = QueryParams::new();
        params.push_opt("user", Option::<String>::None);
        assert!(params.is_empty());
    }

    #[test]
    fn push_opt_keeps_empty_string() {
        let mut params = QueryParams::new();
        params.push_opt("user", Some(""));
        assert_eq!(params.into_pairs(), vec![("user", String::new())]);
    }

    #[test]
    fn push_opt_borrows_owned_values() {
        let name = Some("alice".to_string());
        let email: Option<String> = None;

        let mut params = QueryParams::new();
        params.push_opt("name", name.as_deref());
        params.push_opt("email", email.as_deref());
        assert_eq!(params.into_pairs(), vec![("name", "alice".to_string())]);
    }

    #[test]
    fn push_preserves_order() {
        let mut params = QueryParams::new();
        params.push("user", "alice");
        params.push("key", "abc123");
        assert_eq!(
            params.into_pairs(),
            vec![("user", "alice".to_string()), ("key", "abc123".to_string())]
        );
    }
}
