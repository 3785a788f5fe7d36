//! # Topics
//!
//! Topic name and filter validation, and filter matching.
//!
//! Topics are `/`-separated levels. Filters may use `+` to match exactly one
//! level and a trailing `#` to match every remaining level (including none).
//! Names starting with `$` are reserved and never matched by a leading
//! wildcard.

use crate::transport::TransportError;
use crate::{MULTI_LEVEL_WILDCARD, SINGLE_LEVEL_WILDCARD, TOPIC_SEPARATOR};

/// Validate a topic name that a message is published on.
pub fn validate_topic_name(name: &str) -> Result<(), TransportError> {
    if name.is_empty() {
        return Err(TransportError::InvalidTopic("topic name is empty".into()));
    }
    if name.contains('\0') {
        return Err(TransportError::InvalidTopic(format!(
            "topic name contains NUL: {name:?}"
        )));
    }
    if name.contains([SINGLE_LEVEL_WILDCARD, MULTI_LEVEL_WILDCARD]) {
        return Err(TransportError::InvalidTopic(format!(
            "wildcards are not allowed in topic names: {name}"
        )));
    }
    Ok(())
}

/// Validate a subscription filter.
pub fn validate_topic_filter(filter: &str) -> Result<(), TransportError> {
    if filter.is_empty() {
        return Err(TransportError::InvalidTopic("topic filter is empty".into()));
    }
    if filter.contains('\0') {
        return Err(TransportError::InvalidTopic(format!(
            "topic filter contains NUL: {filter:?}"
        )));
    }

    let mut levels = filter.split(TOPIC_SEPARATOR).peekable();
    while let Some(level) = levels.next() {
        if level.contains(MULTI_LEVEL_WILDCARD) {
            if level.len() != 1 || levels.peek().is_some() {
                return Err(TransportError::InvalidTopic(format!(
                    "'#' must be the whole last level: {filter}"
                )));
            }
        } else if level.contains(SINGLE_LEVEL_WILDCARD) && level.len() != 1 {
            return Err(TransportError::InvalidTopic(format!(
                "'+' must be a whole level: {filter}"
            )));
        }
    }
    Ok(())
}

/// Check whether a topic name matches a (valid) filter.
#[must_use]
pub fn topic_matches(filter: &str, name: &str) -> bool {
    if name.starts_with('$') && filter.starts_with([SINGLE_LEVEL_WILDCARD, MULTI_LEVEL_WILDCARD]) {
        return false;
    }

    let mut filter_levels = filter.split(TOPIC_SEPARATOR);
    let mut name_levels = name.split(TOPIC_SEPARATOR);

    loop {
        match (filter_levels.next(), name_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(n)) if f == n => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
