//! Common types used throughout Easel

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Tag of the deferred task that persists an image captured while offline.
///
/// Both the save action and the sync handler refer to this constant.
pub const SAVE_IMAGE_TASK: &str = "save-image";

/// Identifier of a cache generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheVersion(String);

impl CacheVersion {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheVersion {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Normalized request key: upper-cased method plus the URL without its fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    method: String,
    url: String,
}

impl ResourceKey {
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.to_ascii_uppercase(),
            url: url.into(),
        }
    }

    pub fn get(url: &Url) -> Self {
        Self::new("GET", url)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A button attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// Notification payload: `{ title, body, icon, actions }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
}

impl NotificationPayload {
    /// Payload shown once a deferred image save completes.
    pub fn image_saved() -> Self {
        Self {
            title: "Image Saved".to_string(),
            body: "Your image has been successfully saved!".to_string(),
            icon: "/icons/icon-192x192.png".to_string(),
            actions: vec![NotificationAction {
                action: "open".to_string(),
                title: "Open App".to_string(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_key_normalization() {
        let a = Url::parse("https://paint.local/index.html#top").unwrap();
        let b = Url::parse("https://paint.local/index.html").unwrap();
        assert_eq!(ResourceKey::new("get", &a), ResourceKey::get(&b));
        assert_eq!(
            ResourceKey::get(&b).to_string(),
            "GET https://paint.local/index.html"
        );
    }

    #[test]
    fn test_resource_key_method_distinguishes() {
        let url = Url::parse("https://paint.local/api").unwrap();
        assert_ne!(ResourceKey::get(&url), ResourceKey::new("POST", &url));
    }

    #[test]
    fn test_image_saved_payload_serializes() {
        let json = serde_json::to_value(NotificationPayload::image_saved()).unwrap();
        assert_eq!(json["title"], "Image Saved");
        assert_eq!(json["actions"][0]["action"], "open");
        assert_eq!(json["actions"][0]["title"], "Open App");
    }
}
