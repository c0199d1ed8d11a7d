use std::fmt;

/// Cache identity of a link sighting: the same URL posted in two rooms is
/// tracked twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub link: String,
    pub room_id: String,
}

impl DedupKey {
    pub fn new(link: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            room_id: room_id.into(),
        }
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.link, self.room_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryResult {
    pub summary: String,
    pub original_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Processing,
    Summary,
    NoSummary,
    Error,
}

/// A message the pipeline posts to the forwarding room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub room_id: String,
    pub kind: NotificationKind,
    pub body: String,
}

impl Notification {
    pub fn processing(room_id: &str, sender: &str, link: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            kind: NotificationKind::Processing,
            body: format!("Link shared by {sender} in another room:\n{link}\n\nGenerating summary..."),
        }
    }

    pub fn summary(room_id: &str, result: &SummaryResult) -> Self {
        Self {
            room_id: room_id.to_string(),
            kind: NotificationKind::Summary,
            body: format!("Summary of {}:\n\n{}", result.original_url, result.summary),
        }
    }

    pub fn no_summary(room_id: &str, link: &str, reason: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            kind: NotificationKind::NoSummary,
            body: format!("Could not generate a summary for {link} ({reason})."),
        }
    }

    pub fn error(room_id: &str, link: &str, description: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            kind: NotificationKind::Error,
            body: format!("Error occurred while processing {link}: {description}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keys_differ_by_room() {
        let a = DedupKey::new("https://example.com", "!a:m");
        let b = DedupKey::new("https://example.com", "!b:m");
        assert_ne!(a, b);
        assert_eq!(a, DedupKey::new("https://example.com", "!a:m"));
        assert_eq!(a.to_string(), "https://example.com-!a:m");
    }

    #[test]
    fn processing_mentions_sender_and_link() {
        let n = Notification::processing("!dst:m", "Alice", "https://example.com");
        assert_eq!(n.kind, NotificationKind::Processing);
        assert_eq!(n.room_id, "!dst:m");
        assert!(n.body.contains("Alice"));
        assert!(n.body.contains("https://example.com"));
    }

    #[test]
    fn summary_carries_url_and_text() {
        let result = SummaryResult {
            summary: "Short and sweet.".into(),
            original_url: "https://example.com".into(),
        };
        let n = Notification::summary("!dst:m", &result);
        assert_eq!(n.kind, NotificationKind::Summary);
        assert!(n.body.contains("https://example.com"));
        assert!(n.body.ends_with("Short and sweet."));
    }

    #[test]
    fn failure_bodies_name_the_link() {
        let none = Notification::no_summary("!d:m", "https://x.org", "page returned HTTP 404");
        assert!(none.body.starts_with("Could not generate a summary for https://x.org"));
        assert!(none.body.contains("HTTP 404"));

        let err = Notification::error("!d:m", "https://x.org", "timed out");
        assert_eq!(err.kind, NotificationKind::Error);
        assert!(err.body.contains("https://x.org"));
        assert!(err.body.ends_with("timed out"));
    }
}
