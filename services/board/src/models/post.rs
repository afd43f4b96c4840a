//! Post model and related payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One entry of the post listing
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub author_image: Option<String>,
    pub comment_count: i64,
    pub like_count: i64,
}

/// A single post with its author
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PostDetail {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: String,
    pub author_image: Option<String>,
}

/// Ownership facts needed before mutating a post
#[derive(Debug, Clone, FromRow)]
pub struct PostOwner {
    pub post_id: i64,
    pub user_id: i64,
    pub image: Option<String>,
}

/// New post creation payload
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
}

/// Partial post update; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
}

impl PostChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.image.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_changes_is_empty() {
        assert!(PostChanges::default().is_empty());
        assert!(
            !PostChanges {
                image: Some("1-a.png".to_string()),
                ..Default::default()
            }
            .is_empty()
        );
    }

    #[test]
    fn test_summary_survives_cache_encoding() {
        let summary = PostSummary {
            id: 3,
            title: "hello".to_string(),
            content: "world".to_string(),
            image: None,
            views: 12,
            created_at: Utc::now(),
            author: "kim".to_string(),
            author_image: None,
            comment_count: 2,
            like_count: 5,
        };

        let encoded = serde_json::to_string(&vec![summary.clone()]).unwrap();
        let decoded: Vec<PostSummary> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded[0].id, summary.id);
        assert_eq!(decoded[0].created_at, summary.created_at);
        assert_eq!(decoded[0].like_count, 5);
    }

    #[test]
    fn test_detail_exposes_author_id() {
        let detail = PostDetail {
            id: 4,
            author_id: 9,
            title: "hello".to_string(),
            content: "world".to_string(),
            image: Some("1-cat.png".to_string()),
            views: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            author: "kim".to_string(),
            author_image: None,
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["author_id"], 9);
        assert_eq!(json["author"], "kim");
    }
}
