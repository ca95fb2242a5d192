//! npm registry search for yeoman generators.

use crate::http_client::HttpClient;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Keyword every yeoman generator package is tagged with.
pub const GENERATOR_KEYWORD: &str = "yeoman-generator";

pub const DEFAULT_SIZE: u32 = 20;
pub const MAX_SIZE: u32 = 250;

const UNKNOWN_AUTHOR: &str = "Unknown";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    objects: Vec<SearchObject>,
}

#[derive(Debug, Deserialize)]
struct SearchObject {
    package: Package,
    #[serde(default)]
    score: Option<Score>,
    #[serde(default)]
    downloads: Option<Downloads>,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    author: Option<Author>,
    #[serde(default)]
    publisher: Option<Publisher>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    links: Option<Links>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Publisher {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Links {
    #[serde(default)]
    npm: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Score {
    #[serde(rename = "final", default)]
    final_score: f64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Downloads {
    #[serde(default)]
    pub monthly: u64,
    #[serde(default)]
    pub weekly: u64,
}

/// One generator as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSummary {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    pub author: String,
    pub score: f64,
    pub downloads: Downloads,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

impl From<SearchObject> for TemplateSummary {
    fn from(object: SearchObject) -> Self {
        let package = object.package;
        let author = package
            .author
            .and_then(|a| a.name)
            .or_else(|| package.publisher.and_then(|p| p.username))
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
        let url = package
            .links
            .and_then(|l| l.npm)
            .unwrap_or_else(|| format!("https://www.npmjs.com/package/{}", package.name));

        Self {
            description: package.description.unwrap_or_default(),
            url,
            version: package.version,
            author,
            score: object.score.map(|s| s.final_score).unwrap_or_default(),
            downloads: object.downloads.unwrap_or_default(),
            license: package.license,
            name: package.name,
        }
    }
}

/// Comma-separated caller keywords, trimmed, empties dropped.
pub fn split_keywords(query: &str) -> Vec<&str> {
    query.split(',').map(str::trim).filter(|k| !k.is_empty()).collect()
}

pub struct RegistrySearch {
    client: Arc<dyn HttpClient>,
    url: String,
}

impl RegistrySearch {
    pub fn new(client: Arc<dyn HttpClient>, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }

    /// Generators matching `query`, at most `size` of them, in registry order.
    pub async fn search(&self, query: &str, size: u32) -> Result<Vec<TemplateSummary>> {
        let size = size.clamp(1, MAX_SIZE);
        let text = std::iter::once(format!("keywords:{}", GENERATOR_KEYWORD))
            .chain(split_keywords(query).into_iter().map(str::to_string))
            .collect::<Vec<_>>()
            .join(" ");
        let size_param = size.to_string();

        info!("Searching {} for '{}'", self.url, text);
        let body = self
            .client
            .get(&self.url, &[("text", text.as_str()), ("size", size_param.as_str())])
            .await?;

        let response: SearchResponse =
            serde_json::from_str(&body).context("Unexpected registry search response")?;
        let total = response.objects.len();

        let results: Vec<TemplateSummary> = response
            .objects
            .into_iter()
            .filter(|o| o.package.keywords.iter().any(|k| k == GENERATOR_KEYWORD))
            .take(size as usize)
            .map(TemplateSummary::from)
            .collect();

        debug!("Registry returned {} packages, {} are generators", total, results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::mock::MockHttpClient;

    fn object(name: &str, keywords: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "package": {
                "name": name,
                "version": "1.2.3",
                "description": format!("{} generator", name),
                "keywords": keywords,
                "links": { "npm": format!("https://www.npmjs.com/package/{}", name) },
                "author": { "name": "Ada" },
                "license": "MIT"
            },
            "score": { "final": 0.8, "detail": { "quality": 0.9 } },
            "downloads": { "monthly": 4000, "weekly": 1000 }
        })
    }

    fn response(objects: Vec<serde_json::Value>) -> String {
        serde_json::json!({ "objects": objects, "total": 99 }).to_string()
    }

    #[tokio::test]
    async fn test_search_filters_and_truncates() {
        let mut objects: Vec<_> = (0..8)
            .map(|i| object(&format!("generator-react-{}", i), &["yeoman-generator", "react"]))
            .collect();
        objects.insert(1, object("react-scripts", &["react", "typescript"]));
        let client = Arc::new(MockHttpClient::new(&response(objects)));
        let search = RegistrySearch::new(client.clone(), "http://registry/search");

        let results = search.search("react,typescript", 5).await.unwrap();

        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.name.starts_with("generator-react-")));
        assert_eq!(
            client.last_query("text").as_deref(),
            Some("keywords:yeoman-generator react typescript")
        );
        assert_eq!(client.last_query("size").as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_projection() {
        let client = Arc::new(MockHttpClient::new(&response(vec![object(
            "generator-webapp",
            &["yeoman-generator"],
        )])));
        let results = RegistrySearch::new(client, "http://registry/search")
            .search("webapp", 20)
            .await
            .unwrap();

        assert_eq!(
            results[0],
            TemplateSummary {
                name: "generator-webapp".to_string(),
                description: "generator-webapp generator".to_string(),
                url: "https://www.npmjs.com/package/generator-webapp".to_string(),
                version: "1.2.3".to_string(),
                author: "Ada".to_string(),
                score: 0.8,
                downloads: Downloads {
                    monthly: 4000,
                    weekly: 1000
                },
                license: Some("MIT".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_author_is_unknown() {
        let body = concat!(
            r#"{"objects":[{"package":{"name":"generator-bare","#,
            r#""keywords":["yeoman-generator"]}}]}"#,
        );
        let client = Arc::new(MockHttpClient::new(body));
        let results = RegistrySearch::new(client, "http://r").search("bare", 1).await.unwrap();

        assert_eq!(results[0].author, "Unknown");
        assert_eq!(results[0].url, "https://www.npmjs.com/package/generator-bare");
        assert_eq!(results[0].downloads, Downloads::default());
    }

    #[tokio::test]
    async fn test_size_is_clamped() {
        let client = Arc::new(MockHttpClient::new(&response(vec![])));
        let search = RegistrySearch::new(client.clone(), "http://r");

        search.search("x", 0).await.unwrap();
        assert_eq!(client.last_query("size").as_deref(), Some("1"));
        search.search("x", 10_000).await.unwrap();
        assert_eq!(client.last_query("size").as_deref(), Some("250"));
    }

    #[tokio::test]
    async fn test_bad_body_is_error() {
        let client = Arc::new(MockHttpClient::new("<html>"));
        let err = RegistrySearch::new(client, "http://r").search("x", 5).await.unwrap_err();
        assert!(err.to_string().contains("Unexpected registry search response"));
    }

    #[test]
    fn test_split_keywords() {
        assert_eq!(split_keywords(" react, ,typescript ,"), ["react", "typescript"]);
    }
}
