//! HTTP header map with case-insensitive name lookup.

use std::fmt;

/// A case-insensitive, multi-value HTTP header map.
///
/// Preserves insertion order and allows multiple values per header name.
///
/// # Examples
///
/// ```
/// use calcrelay::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Connection", "keep-alive, Upgrade");
///
/// assert_eq!(headers.get("connection"), Some("keep-alive, Upgrade"));
/// assert!(headers.contains_token("Connection", "upgrade"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header map with pre-allocated capacity for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends a header entry. Multiple values for the same name are preserved.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the first value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns an iterator over all values for the given header name (case-insensitive).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if any value of `name` is a comma-separated list containing `token`.
    ///
    /// Comparison is case-insensitive and ignores surrounding whitespace, as
    /// required for `Connection` and `Upgrade` (RFC 9110 §7.6.1).
    pub fn contains_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name)
            .flat_map(|value| value.split(','))
            .any(|item| item.trim().eq_ignore_ascii_case(token))
    }

    /// Returns `true` if the map contains at least one entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Returns the total number of header entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_get() {
        let mut h = Headers::new();
        h.insert("Sec-WebSocket-Key", "abc");
        assert_eq!(h.get("sec-websocket-key"), Some("abc"));
        assert_eq!(h.get("SEC-WEBSOCKET-KEY"), Some("abc"));
    }

    #[test]
    fn get_outlives_lookup_name() {
        let mut headers = Headers::new();
        headers.insert("Sec-WebSocket-Key", "abc");
        let value = {
            let name = String::from("sec-websocket-key");
            headers.get(&name)
        };
        assert_eq!(value, Some("abc"));
    }

    #[test]
    fn token_list_lookup() {
        let mut h = Headers::new();
        h.insert("Connection", "keep-alive, Upgrade");
        assert!(h.contains_token("connection", "upgrade"));
        assert!(h.contains_token("connection", "Keep-Alive"));
        assert!(!h.contains_token("connection", "close"));
    }

    #[test]
    fn token_across_repeated_headers() {
        let mut h = Headers::new();
        h.insert("Connection", "keep-alive");
        h.insert("Connection", "upgrade");
        assert!(h.contains_token("connection", "upgrade"));
    }

    #[test]
    fn token_requires_whole_item() {
        let mut h = Headers::new();
        h.insert("Upgrade", "websocketx");
        assert!(!h.contains_token("upgrade", "websocket"));
    }

    #[test]
    fn contains() {
        let mut h = Headers::new();
        h.insert("Host", "localhost:8080");
        assert!(h.contains("host"));
        assert!(!h.contains("x-missing"));
        assert_eq!(h.len(), 1);
    }
}
