use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A public post found by searching or listing a community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub community: String,
    pub permalink: String,
    pub created_utc: i64,
}

/// A private message or comment reply delivered to a credential's mailbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxMessage {
    pub id: String,
    pub author: String,
    pub subject: String,
    pub body: String,
    pub created_utc: i64,
    pub is_comment_reply: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItem {
    Lead(Lead),
    InboxMessage(InboxMessage),
}

impl WorkItem {
    /// Fullname used as the reply target (`t3_…`, `t1_…`, `t4_…`).
    pub fn id(&self) -> &str {
        match self {
            WorkItem::Lead(l) => &l.id,
            WorkItem::InboxMessage(m) => &m.id,
        }
    }

    pub fn author(&self) -> &str {
        match self {
            WorkItem::Lead(l) => &l.author,
            WorkItem::InboxMessage(m) => &m.author,
        }
    }

    pub fn text(&self) -> String {
        match self {
            WorkItem::Lead(l) if l.body.is_empty() => l.title.clone(),
            WorkItem::Lead(l) => format!("{}\n\n{}", l.title, l.body),
            WorkItem::InboxMessage(m) => m.body.clone(),
        }
    }

    /// Builds a variant from one `{kind, data}` entry of a listing.
    pub fn from_thing(thing: &Value) -> Option<Self> {
        let kind = thing.get("kind")?.as_str()?;
        let data = thing.get("data")?;
        let s = |key: &str| {
            data.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let created_utc = data
            .get("created_utc")
            .and_then(|v| v.as_f64())
            .map(|f| f as i64)
            .unwrap_or(0);
        let id = match data.get("name").and_then(|v| v.as_str()) {
            Some(name) => name.to_string(),
            None => format!("{}_{}", kind, data.get("id")?.as_str()?),
        };

        match kind {
            "t3" => Some(WorkItem::Lead(Lead {
                id,
                title: s("title"),
                body: s("selftext"),
                author: s("author"),
                community: s("subreddit"),
                permalink: s("permalink"),
                created_utc,
            })),
            "t1" | "t4" => Some(WorkItem::InboxMessage(InboxMessage {
                id,
                author: s("author"),
                subject: s("subject"),
                body: s("body"),
                created_utc,
                is_comment_reply: kind == "t1"
                    || data
                        .get("was_comment")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false),
            })),
            _ => None,
        }
    }
}

/// Parses a `{data: {children: [...]}}` listing, skipping unknown kinds.
pub fn parse_listing(payload: &Value) -> Vec<WorkItem> {
    payload
        .get("data")
        .and_then(|d| d.get("children"))
        .and_then(|c| c.as_array())
        .map(|children| children.iter().filter_map(WorkItem::from_thing).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_listing_discriminates_by_kind() {
        let payload = json!({
            "kind": "Listing",
            "data": {
                "children": [
                    {"kind": "t3", "data": {"name": "t3_abc", "title": "Need a tool", "selftext": "", "author": "op", "subreddit": "rust", "permalink": "/r/rust/abc", "created_utc": 1700000000.0}},
                    {"kind": "t4", "data": {"name": "t4_msg", "author": "friend", "subject": "hi", "body": "hello there", "created_utc": 1700000100.0}},
                    {"kind": "more", "data": {}}
                ]
            }
        });
        let items = parse_listing(&payload);
        assert_eq!(items.len(), 2);
        match &items[0] {
            WorkItem::Lead(lead) => {
                assert_eq!(lead.id, "t3_abc");
                assert_eq!(lead.community, "rust");
                assert_eq!(lead.created_utc, 1_700_000_000);
            }
            other => panic!("expected lead, got {:?}", other),
        }
        match &items[1] {
            WorkItem::InboxMessage(msg) => {
                assert_eq!(msg.author, "friend");
                assert!(!msg.is_comment_reply);
            }
            other => panic!("expected inbox message, got {:?}", other),
        }
    }

    #[test]
    fn test_fullname_falls_back_to_kind_and_id() {
        let thing = json!({"kind": "t1", "data": {"id": "xyz", "author": "a", "body": "b"}});
        let item = WorkItem::from_thing(&thing).unwrap();
        assert_eq!(item.id(), "t1_xyz");
        assert!(matches!(item, WorkItem::InboxMessage(ref m) if m.is_comment_reply));
    }

    #[test]
    fn test_serialized_variant_carries_discriminant() {
        let item = WorkItem::Lead(Lead {
            id: "t3_1".to_string(),
            title: "t".to_string(),
            body: String::new(),
            author: "a".to_string(),
            community: "c".to_string(),
            permalink: "/p".to_string(),
            created_utc: 0,
        });
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["kind"], "lead");
        assert_eq!(item.text(), "t");
    }

    #[test]
    fn test_empty_payload_yields_no_items() {
        assert!(parse_listing(&json!({})).is_empty());
        assert!(parse_listing(&json!({"data": {"children": "nope"}})).is_empty());
    }
}
