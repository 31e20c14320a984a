//! Topic name and filter validation, and wildcard matching.

use core::fmt;

/// Maximum topic name/filter length in bytes (UTF-8 encoded).
pub const MAX_TOPIC_LENGTH: usize = 65_535;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
    /// Topic or filter is zero length.
    Empty,
    /// Length exceeds the 16-bit wire limit.
    TooLong,
    /// Contains the forbidden NUL character.
    ContainsNul,
    /// `+` or `#` appeared in a publish topic.
    WildcardInPublishTopic,
    /// `+` does not occupy an entire level.
    InvalidSingleLevelWildcard,
    /// `#` is not the final level, or does not occupy an entire level.
    InvalidMultiLevelWildcard,
}

impl fmt::Display for TopicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TopicError::Empty => "topic is empty",
            TopicError::TooLong => "topic exceeds 65535 bytes",
            TopicError::ContainsNul => "topic contains a NUL character",
            TopicError::WildcardInPublishTopic => "publish topic contains a wildcard",
            TopicError::InvalidSingleLevelWildcard => "'+' must occupy an entire level",
            TopicError::InvalidMultiLevelWildcard => "'#' must be the final level",
        };
        write!(f, "{}", text)
    }
}

impl std::error::Error for TopicError {}

fn validate_common(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }
    if topic.len() > MAX_TOPIC_LENGTH {
        return Err(TopicError::TooLong);
    }
    if topic.contains('\0') {
        return Err(TopicError::ContainsNul);
    }
    Ok(())
}

/// Validates a topic name used in PUBLISH. Wildcards are not allowed.
pub fn validate_publish_topic(topic: &str) -> Result<(), TopicError> {
    validate_common(topic)?;

    if topic.contains('+') || topic.contains('#') {
        return Err(TopicError::WildcardInPublishTopic);
    }

    Ok(())
}

/// Validates a subscription filter, including wildcard placement.
pub fn validate_filter(filter: &str) -> Result<(), TopicError> {
    validate_common(filter)?;

    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;

    for (idx, level) in levels.iter().enumerate() {
        if level.contains('+') && *level != "+" {
            return Err(TopicError::InvalidSingleLevelWildcard);
        }
        if level.contains('#') && (*level != "#" || idx != last) {
            return Err(TopicError::InvalidMultiLevelWildcard);
        }
    }

    Ok(())
}

/// Returns true when `topic` matches the subscription `filter` under MQTT
/// wildcard semantics.
///
/// `+` matches exactly one level, `#` matches the remaining levels
/// including the parent (`sport/#` matches `sport`). Topics starting with
/// `$` are never matched by a filter whose first level is a wildcard.
/// Both arguments are assumed to have passed validation.
pub fn matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_level_wildcard_matching() {
        assert!(matches("sensors/+/temp", "sensors/a/temp"));
        assert!(!matches("sensors/+/temp", "sensors/a/b/temp"));
        assert!(!matches("sensors/+/temp", "sensors/temp"));
        assert!(matches("a/+", "a/x"));
        assert!(!matches("a/+", "a/x/y"));
        assert!(!matches("a/+", "a"));
        // '+' matches an empty level
        assert!(matches("a/+", "a/"));
    }

    #[test]
    fn multi_level_wildcard_matching() {
        assert!(matches("sensors/#", "sensors"));
        assert!(matches("sensors/#", "sensors/a"));
        assert!(matches("sensors/#", "sensors/a/b"));
        assert!(matches("#", "anything/at/all"));
        assert!(!matches("sensors/#", "other/a"));
    }

    #[test]
    fn exact_matching() {
        assert!(matches("a/b/c", "a/b/c"));
        assert!(!matches("a/b/c", "a/b"));
        assert!(!matches("a/b", "a/b/c"));
    }

    #[test]
    fn dollar_topics_hidden_from_leading_wildcards() {
        assert!(!matches("#", "$SYS/broker/uptime"));
        assert!(!matches("+/broker/uptime", "$SYS/broker/uptime"));
        assert!(matches("$SYS/#", "$SYS/broker/uptime"));
    }

    #[test]
    fn publish_topic_validation() {
        assert!(validate_publish_topic("a/b").is_ok());
        assert!(validate_publish_topic("/leading/slash").is_ok());
        assert_eq!(validate_publish_topic(""), Err(TopicError::Empty));
        assert_eq!(
            validate_publish_topic("a\0b"),
            Err(TopicError::ContainsNul)
        );
        assert_eq!(
            validate_publish_topic("a/+/b"),
            Err(TopicError::WildcardInPublishTopic)
        );
        assert_eq!(
            validate_publish_topic("a/#"),
            Err(TopicError::WildcardInPublishTopic)
        );
    }

    #[test]
    fn filter_validation() {
        assert!(validate_filter("a/b").is_ok());
        assert!(validate_filter("+").is_ok());
        assert!(validate_filter("#").is_ok());
        assert!(validate_filter("a/+/b").is_ok());
        assert!(validate_filter("a/+/#").is_ok());
        assert!(validate_filter("/#").is_ok());

        assert_eq!(validate_filter(""), Err(TopicError::Empty));
        assert_eq!(
            validate_filter("a/b+/c"),
            Err(TopicError::InvalidSingleLevelWildcard)
        );
        assert_eq!(
            validate_filter("a/#/b"),
            Err(TopicError::InvalidMultiLevelWildcard)
        );
        assert_eq!(
            validate_filter("a/b#"),
            Err(TopicError::InvalidMultiLevelWildcard)
        );
    }

    #[test]
    fn filter_too_long() {
        let long = "a".repeat(MAX_TOPIC_LENGTH + 1);
        assert_eq!(validate_filter(&long), Err(TopicError::TooLong));
        let max = "a".repeat(MAX_TOPIC_LENGTH);
        assert!(validate_filter(&max).is_ok());
    }
}
