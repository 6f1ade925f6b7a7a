//! URL path and query construction.

use std::fmt::Display;

/// Join path segments with `/`, percent-encoding each one independently so
/// that a slash inside an object name stays part of the name.
///
/// An empty trailing segment yields a trailing slash.
#[must_use]
pub fn encode_path<S: AsRef<str>>(segments: &[S]) -> String {
    let encoded: Vec<String> = segments
        .iter()
        .map(|segment| urlencoding::encode(segment.as_ref()).into_owned())
        .collect();
    format!("/{}", encoded.join("/"))
}

/// Query string built from an explicit list of parameters. Absent values
/// are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(&'static str, String)>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter.
    #[must_use]
    pub fn param(mut self, name: &'static str, value: impl Display) -> Self {
        self.params.push((name, value.to_string()));
        self
    }

    /// Add a parameter only when a value is present.
    #[must_use]
    pub fn param_opt<V: Display>(self, name: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.param(name, v),
            None => self,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Render as `?a=1&b=2`, or an empty string when there are no parameters.
    #[must_use]
    pub fn render(&self) -> String {
        if self.params.is_empty() {
            return String::new();
        }
        let pairs: Vec<String> = self
            .params
            .iter()
            .map(|(name, value)| format!("{}={}", urlencoding::encode(name), urlencoding::encode(value)))
            .collect();
        format!("?{}", pairs.join("&"))
    }
}

/// Join a path and a query into a request target.
#[must_use]
pub fn target(path: &str, query: &Query) -> String {
    format!("{path}{}", query.render())
}
