//! ugig.net connector: profile, reviews, rating.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;

use super::{username_after, Connector};
use isnad_domain::{ConnectorMetrics, ConnectorResult, VerificationLevel};

const API_BASE: &str = "https://ugig.net/api";

pub struct UgigConnector {
    client: reqwest::Client,
}

impl UgigConnector {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .user_agent("isnad-scanner")
                .build()
                .expect("reqwest client"),
        }
    }
}

impl Default for UgigConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_username(url: &str) -> Option<String> {
    for marker in ["ugig.net/user/", "ugig.net/profile/", "ugig.net/u/"] {
        if let Some(username) = username_after(url, marker) {
            return Some(username);
        }
    }
    None
}

fn days_since(timestamp: &str) -> Option<i64> {
    let parsed = DateTime::parse_from_rfc3339(timestamp).ok()?;
    Some((Utc::now() - parsed.with_timezone(&Utc)).num_days())
}

#[async_trait]
impl Connector for UgigConnector {
    fn platform_name(&self) -> &'static str {
        "ugig"
    }

    async fn fetch(&self, url: &str) -> ConnectorResult {
        let username = match extract_username(url) {
            Some(username) => username,
            None => {
                return ConnectorResult::dead("ugig", url, "cannot parse ugig username from URL")
            }
        };

        let body = match self
            .client
            .get(format!("{}/users/{}", API_BASE, username))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                match response.json::<Value>().await {
                    Ok(body) => body,
                    Err(e) => return ConnectorResult::dead("ugig", url, &e.to_string()),
                }
            }
            Ok(response) => {
                return ConnectorResult::dead(
                    "ugig",
                    url,
                    &format!("ugig API {}", response.status().as_u16()),
                )
            }
            Err(e) => {
                warn!(url = %url, error = %e, "ugig fetch failed");
                return ConnectorResult::dead("ugig", url, &e.to_string());
            }
        };
        let profile = body.get("profile").unwrap_or(&body);

        // Reviews are optional; a missing endpoint just means no extra
        // evidence.
        let user_id = profile["id"]
            .as_str()
            .map(str::to_string)
            .or_else(|| profile["id"].as_u64().map(|n| n.to_string()));
        let mut reviews: Vec<Value> = Vec::new();
        if let Some(user_id) = user_id {
            if let Ok(response) = self
                .client
                .get(format!("{}/reviews?user_id={}", API_BASE, user_id))
                .send()
                .await
            {
                if response.status().is_success() {
                    if let Ok(body) = response.json::<Value>().await {
                        if let Some(data) = body["data"].as_array() {
                            reviews = data.clone();
                        }
                    }
                }
            }
        }

        let avg_rating = profile["average_rating"]
            .as_f64()
            .or_else(|| profile["average_rating"].as_str().and_then(|s| s.parse().ok()))
            .unwrap_or(0.0);
        let total_reviews = profile["total_reviews"].as_u64().unwrap_or(0);
        let skills: Vec<Value> = profile["skills"].as_array().cloned().unwrap_or_default();
        let profile_completed = profile["profile_completed"].as_bool().unwrap_or(false);

        let mut activity_score = 0u8;
        if let Some(days) = profile["updated_at"].as_str().and_then(days_since) {
            activity_score = ((100 - days * 3).max(0) as u8).min(100);
        }

        // No reviews, no reputation.
        let reputation_score = if total_reviews > 0 && avg_rating > 0.0 {
            ((avg_rating / 5.0 * 100.0) as u8).min(100)
        } else {
            0
        };

        let longevity_days = profile["created_at"]
            .as_str()
            .and_then(days_since)
            .map(|d| d.max(0) as u32)
            .unwrap_or(0);

        let verification_level = if profile_completed && total_reviews >= 3 {
            VerificationLevel::Verified
        } else if profile_completed || skills.len() >= 2 {
            VerificationLevel::Basic
        } else {
            VerificationLevel::None
        };

        let evidence_count = total_reviews as u32 + reviews.len() as u32;

        ConnectorResult {
            platform: "ugig".to_string(),
            url: url.to_string(),
            alive: true,
            raw_data: json!({
                "username": profile["username"],
                "average_rating": avg_rating,
                "total_reviews": total_reviews,
                "skills": skills,
                "profile_completed": profile_completed,
                "has_avatar": profile["avatar_url"].as_str().map(|s| !s.is_empty()).unwrap_or(false),
                "created_at": profile["created_at"],
                "updated_at": profile["updated_at"],
                "reviews_sample": reviews.iter().take(5).collect::<Vec<_>>(),
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
