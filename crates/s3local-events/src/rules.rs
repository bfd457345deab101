//! Key filters and event-type patterns
//!
//! Two independent predicates: [`KeyMatcher`] for object keys and
//! [`event_matches`] for event types.

use s3local_core::types::FilterRule;

/// Compiled form of a [`FilterRule`], anchored at both ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMatcher {
    prefix: Option<String>,
    suffix: Option<String>,
}

impl KeyMatcher {
    pub fn compile(rule: &FilterRule) -> Self {
        Self {
            prefix: rule.prefix.clone(),
            suffix: rule.suffix.clone(),
        }
    }

    /// Literal comparison only; no wildcard inside prefix or suffix
    pub fn matches(&self, key: &str) -> bool {
        let prefix_ok = self.prefix.as_deref().map_or(true, |p| key.starts_with(p));
        let suffix_ok = self.suffix.as_deref().map_or(true, |s| key.ends_with(s));
        prefix_ok && suffix_ok
    }
}

/// Hierarchical event-type match.
///
/// A `*` segment matches any one segment, so `ObjectCreated:*` matches
/// `ObjectCreated:Put`. The `s3:` namespace is optional on both sides.
pub fn event_matches(pattern: &str, event_type: &str) -> bool {
    let pattern = strip_namespace(pattern);
    let event_type = strip_namespace(event_type);

    let pattern_segments: Vec<&str> = pattern.split(':').collect();
    let event_segments: Vec<&str> = event_type.split(':').collect();

    if pattern_segments.len() != event_segments.len() {
        return false;
    }

    pattern_segments
        .iter()
        .zip(&event_segments)
        .all(|(p, e)| *p == "*" || p == e)
}

fn strip_namespace(name: &str) -> &str {
    name.strip_prefix("s3:").unwrap_or(name)
}
