//! GitHub connector: public repos, stars, recency, account age.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

use super::{username_after, Connector};
use isnad_domain::{ConnectorMetrics, ConnectorResult, VerificationLevel};

const API_BASE: &str = "https://api.github.com";

pub struct GitHubConnector {
    client: reqwest::Client,
    token: Option<String>,
}

impl GitHubConnector {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .user_agent("isnad-scanner")
                .build()
                .expect("reqwest client"),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, String> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("GitHub API {}", response.status().as_u16()));
        }
        response.json().await.map_err(|e| e.to_string())
    }
}

impl Default for GitHubConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn days_since(timestamp: &str) -> Option<i64> {
    let parsed = DateTime::parse_from_rfc3339(timestamp).ok()?;
    Some((Utc::now() - parsed.with_timezone(&Utc)).num_days())
}

#[async_trait]
impl Connector for GitHubConnector {
    fn platform_name(&self) -> &'static str {
        "github"
    }

    async fn fetch(&self, url: &str) -> ConnectorResult {
        let username = match username_after(url, "github.com/") {
            Some(username) => username,
            None => {
                return ConnectorResult::dead(
                    "github",
                    url,
                    "cannot parse GitHub username from URL",
                )
            }
        };

        let user = match self.get_json(&format!("{}/users/{}", API_BASE, username)).await {
            Ok(user) => user,
            Err(e) => {
                warn!(url = %url, error = %e, "GitHub fetch failed");
                return ConnectorResult::dead("github", url, &e);
            }
        };

        let repos: Vec<Value> = self
            .get_json(&format!(
                "{}/users/{}/repos?per_page=100&sort=updated",
                API_BASE, username
            ))
            .await
            .ok()
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();

        let total_stars: u64 = repos
            .iter()
            .filter_map(|r| r["stargazers_count"].as_u64())
            .sum();
        let total_forks: u64 = repos
            .iter()
            .filter_map(|r| r["forks_count"].as_u64())
            .sum();
        let public_repos = repos.len();
        let languages: Vec<&str> = {
            let mut set: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
            for repo in &repos {
                if let Some(language) = repo["language"].as_str() {
                    set.insert(language);
                }
            }
            set.into_iter().collect()
        };

        // Activity decays with days since the most recent push.
        let mut activity_score = 0u8;
        let last_push_days = repos
            .iter()
            .filter_map(|r| r["pushed_at"].as_str())
            .filter_map(days_since)
            .min();
        if let Some(days) = last_push_days {
            let recency = (100 - days * 2).max(0) as f64;
            let repo_factor = (public_repos as f64 / 10.0).min(1.0) * 30.0;
            activity_score = ((recency * 0.7 + repo_factor) as u8).min(100);
        }

        // No stars, no reputation.
        let reputation_score = if total_stars == 0 {
            0
        } else {
            (((total_stars + 1) as f64).log2() * 10.0).min(100.0) as u8
        };

        let longevity_days = user["created_at"]
            .as_str()
            .and_then(days_since)
            .map(|d| d.max(0) as u32)
            .unwrap_or(0);

        let has_bio = user["bio"].as_str().map(|b| !b.is_empty()).unwrap_or(false);
        let has_email = user["email"].as_str().map(|e| !e.is_empty()).unwrap_or(false);
        let verification_level = if has_bio && has_email {
            VerificationLevel::Verified
        } else if has_bio || public_repos > 5 {
            VerificationLevel::Basic
        } else {
            VerificationLevel::None
        };

        // Each repo someone starred or forked is independent evidence.
        let evidence_count = repos
            .iter()
            .filter(|r| {
                r["stargazers_count"].as_u64().unwrap_or(0) > 0
                    || r["forks_count"].as_u64().unwrap_or(0) > 0
            })
            .count() as u32;

        ConnectorResult {
            platform: "github".to_string(),
            url: url.to_string(),
            alive: true,
            raw_data: json!({
                "username": user["login"],
                "name": user["name"],
                "bio": user["bio"],
                "followers": user["followers"],
                "following": user["following"],
                "public_repos": public_repos,
                "total_stars": total_stars,
                "total_forks": total_forks,
                "languages": languages,
                "created_at": user["created_at"],
                "updated_at": user["updated_at"],
            }),
            metrics: ConnectorMetrics {
                activity_score,
                reputation_score,
                longevity_days,
                verification_level,
                evidence_count,
            },
        }
    }
}
