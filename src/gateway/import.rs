use serde::Serialize;

use crate::models::NewCredential;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedLine {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ParsedImport {
    pub entries: Vec<NewCredential>,
    pub rejected: Vec<RejectedLine>,
}

/// Accepts a JSON array of credential objects, or one
/// `client_id:client_secret:username:password` per line.
pub fn parse_bulk(text: &str) -> ParsedImport {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        return parse_json_array(trimmed);
    }

    let mut parsed = ParsedImport::default();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        // Passwords may contain ':'.
        let parts: Vec<&str> = line.splitn(4, ':').collect();
        if parts.len() != 4 {
            parsed.rejected.push(RejectedLine {
                line: idx + 1,
                reason: "expected client_id:client_secret:username:password".to_string(),
            });
            continue;
        }
        let entry = NewCredential {
            client_id: parts[0].trim().to_string(),
            client_secret: parts[1].trim().to_string(),
            username: parts[2].trim().to_string(),
            password: parts[3].to_string(),
        };
        match entry.validate() {
            Ok(()) => parsed.entries.push(entry),
            Err(reason) => parsed.rejected.push(RejectedLine {
                line: idx + 1,
                reason,
            }),
        }
    }
    parsed
}

fn parse_json_array(text: &str) -> ParsedImport {
    let mut parsed = ParsedImport::default();
    let values: Vec<serde_json::Value> = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            parsed.rejected.push(RejectedLine {
                line: e.line(),
                reason: format!("invalid JSON: {}", e),
            });
            return parsed;
        }
    };
    for (idx, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<NewCredential>(value) {
            Ok(entry) => match entry.validate() {
                Ok(()) => parsed.entries.push(entry),
                Err(reason) => parsed.rejected.push(RejectedLine {
                    line: idx + 1,
                    reason,
                }),
            },
            Err(e) => parsed.rejected.push(RejectedLine {
                line: idx + 1,
                reason: e.to_string(),
            }),
        }
    }
    parsed
}
