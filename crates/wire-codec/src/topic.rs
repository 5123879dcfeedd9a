/// Separator between a topic's prefix and its trailer.
pub const TOPIC_SEPARATOR: char = '.';

/// A topic split at its first separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicParts {
    /// Everything before the first `.`, or the whole topic if there is none.
    pub prefix: String,
    /// Everything after the first `.`; empty when there is no separator.
    pub trailer: String,
}

/// Split a raw topic into prefix and trailer. Total; never fails.
pub fn split_topic(raw: &str) -> TopicParts {
    match raw.split_once(TOPIC_SEPARATOR) {
        Some((prefix, trailer)) => TopicParts {
            prefix: prefix.to_string(),
            trailer: trailer.to_string(),
        },
        None => TopicParts {
            prefix: raw.to_string(),
            trailer: String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_separator_keeps_whole_topic_as_prefix() {
        let parts = split_topic("whispers");
        assert_eq!(parts.prefix, "whispers");
        assert_eq!(parts.trailer, "");
    }

    #[test]
    fn splits_at_first_separator_only() {
        let parts = split_topic("a.b.c");
        assert_eq!(parts.prefix, "a");
        assert_eq!(parts.trailer, "b.c");
    }

    #[test]
    fn leading_and_trailing_separators() {
        assert_eq!(
            split_topic(".x"),
            TopicParts {
                prefix: String::new(),
                trailer: "x".into()
            }
        );
        assert_eq!(
            split_topic("x."),
            TopicParts {
                prefix: "x".into(),
                trailer: String::new()
            }
        );
    }

    #[test]
    fn empty_topic() {
        let parts = split_topic("");
        assert!(parts.prefix.is_empty());
        assert!(parts.trailer.is_empty());
    }
}
