//! Query-string parameter building for index filters.
//!
//! Filters pass through to the server: lists are comma-joined, booleans are
//! lowercased, and absent optionals are skipped entirely.

use std::fmt::Display;

/// Ordered set of query parameters.
#[derive(Debug, Clone, Default)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single `key=value` pair. Booleans and numbers render the way
    /// the API expects (`true`/`false`, plain digits).
    pub fn set(mut self, key: &str, value: impl Display) -> Self {
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a pair only when the value is present.
    pub fn set_opt(self, key: &str, value: Option<impl Display>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    /// Add a comma-joined list value, e.g. `bbox=-90,-180,90,180`.
    pub fn set_list(mut self, key: &str, values: &[impl Display]) -> Self {
        let joined = values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.pairs.push((key.to_string(), joined));
        self
    }

    /// Remove and return a value, used by the index driver to take over
    /// `skip`/`limit` handling.
    pub(crate) fn take(&mut self, key: &str) -> Option<String> {
        let index = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(index).1)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Render as a query string, without a leading `?`. Spaces become `+`.
    pub fn query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v.replace(' ', "+")))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_bool_and_list_rendering() {
        let params = Params::new()
            .set("state", "New York")
            .set("video", true)
            .set("limit", 25)
            .set_list("bbox", &[-169.35, 1.137, -1.69, 64.008]);

        assert_eq!(
            params.query_string(),
            "state=New+York&video=true&limit=25&bbox=-169.35,1.137,-1.69,64.008"
        );
    }

    #[test]
    fn test_absent_optionals_are_skipped() {
        let params = Params::new()
            .set_opt("marker", None::<&str>)
            .set_opt("camera", Some("cam-1"));
        assert_eq!(params.query_string(), "camera=cam-1");
    }

    #[test]
    fn test_take_removes_pair() {
        let mut params = Params::new().set("skip", 200).set("state", "Ohio");
        assert_eq!(params.take("skip").as_deref(), Some("200"));
        assert_eq!(params.take("skip"), None);
        assert_eq!(params.query_string(), "state=Ohio");
    }

    #[test]
    fn test_empty() {
        assert!(Params::new().is_empty());
        assert_eq!(Params::new().query_string(), "");
    }
}
