//! JSON:API article models

use serde::{Deserialize, Serialize};

/// JSON:API resource type for articles
pub const ARTICLE_TYPE: &str = "node--article";

/// Formatted text field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextField {
    pub value: String,
    #[allow(dead_code)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Article attributes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleAttributes {
    pub title: String,
    #[serde(rename = "drupal_internal__nid", default)]
    pub nid: Option<u64>,
    #[serde(default)]
    pub body: Option<TextField>,
}

/// Article resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    #[allow(dead_code)]
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: ArticleAttributes,
}

/// Top-level JSON:API document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document<T> {
    pub data: T,
}

/// JSON:API error object
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub title: Option<String>,
    pub detail: Option<String>,
}

/// Error document
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDocument {
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

/// Title and body to create or update an article with
#[derive(Debug, Clone)]
pub struct ArticleDraft {
    pub title: String,
    pub body: String,
}

impl ArticleDraft {
    /// Request document; `id` is set when updating an existing article.
    pub fn to_document(&self, id: Option<&str>) -> serde_json::Value {
        let mut data = serde_json::json!({
            "type": ARTICLE_TYPE,
            "attributes": {
                "title": self.title,
                "body": {
                    "value": self.body,
                    "format": "plain_text",
                },
            },
        });
        if let Some(id) = id {
            data["id"] = serde_json::Value::from(id);
        }
        serde_json::json!({ "data": data })
    }
}
