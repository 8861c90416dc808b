//! Fixtures - seed data for the in-memory backends

use std::path::Path;

use contracts::{Article, Feed, Webhook};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::BackendError;

/// Feeds, webhooks and articles loaded from one JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub feeds: Vec<Feed>,
    #[serde(default)]
    pub webhooks: Vec<Webhook>,
    #[serde(default)]
    pub articles: Vec<Article>,
}

impl Fixtures {
    pub fn load(path: &Path) -> Result<Self, BackendError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BackendError::fixtures(path, e.to_string()))?;

        let fixtures: Self = serde_json::from_str(&content)
            .map_err(|e| BackendError::fixtures(path, e.to_string()))?;

        info!(
            path = %path.display(),
            feeds = fixtures.feeds.len(),
            webhooks = fixtures.webhooks.len(),
            articles = fixtures.articles.len(),
            "Fixtures loaded"
        );
        Ok(fixtures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_fixtures() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "feeds": [{{
                    "_id": "6c1bbf7e-54b1-4f51-9b1f-3a1f9e5d2a10",
                    "_rev": "1-a",
                    "name": "ransomware",
                    "type": "feed",
                    "webhooks": {{ "hooks": [], "last_article": "A100" }}
                }}],
                "articles": [{{ "id": "A100", "publish_date": "2024-03-01T00:00:00Z", "title": "t" }}]
            }}"#
        )
        .unwrap();

        let fixtures = Fixtures::load(file.path()).unwrap();
        assert_eq!(fixtures.feeds.len(), 1);
        assert_eq!(fixtures.feeds[0].cursor(), Some("A100"));
        assert!(fixtures.webhooks.is_empty());
        assert_eq!(fixtures.articles[0].id, "A100");
    }

    #[test]
    fn test_missing_file() {
        let err = Fixtures::load(Path::new("/nonexistent/fixtures.json")).unwrap_err();
        assert!(matches!(err, BackendError::Fixtures { .. }));
    }
}
