//! Comment model. Comments belong to exactly one incident.

use serde::{Deserialize, Serialize};

/// Author recorded when a comment is posted without one.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";
/// Longest comment text accepted, in characters.
pub const MAX_COMMENT_CHARS: usize = 2000;

/// A comment on an incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub incident_id: String,
    pub text: String,
    pub author: String,
    pub timestamp: String,
}

/// Request body for posting a comment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
}

impl CreateCommentRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("Comment text is required".to_string());
        }
        if self.text.chars().count() > MAX_COMMENT_CHARS {
            return Err(format!(
                "Comment text must be at most {} characters",
                MAX_COMMENT_CHARS
            ));
        }
        Ok(())
    }

    /// The author to store: trimmed, or `Anonymous` when blank.
    pub fn author_or_anonymous(&self) -> String {
        self.author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(ANONYMOUS_AUTHOR)
            .to_string()
    }
}
