use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum RobotsError {
    #[error("failed to fetch robots.txt: {0}")]
    FetchError(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    UrlError(String),
}

#[derive(Debug, Clone, Default)]
struct AgentRules {
    disallow: Vec<String>,
    allow: Vec<String>,
    crawl_delay: Option<f64>,
}

/// Parsed robots.txt policy, cached for the lifetime of a single scan.
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    rules: std::collections::HashMap<String, AgentRules>,
    pub sitemaps: Vec<String>,
    pub loaded: bool,
}

impl RobotsPolicy {
    /// Fetch and parse `<scheme>://<host>/robots.txt` with a 5s timeout,
    /// using the scheme and host of `seed_url`. On any fetch or non-2xx
    /// response the policy is open but unloaded.
    pub async fn fetch(seed_url: &str, user_agent: &str) -> Result<Self, RobotsError> {
        let parsed = Url::parse(seed_url)
            .map_err(|e| RobotsError::UrlError(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| RobotsError::UrlError("missing host".to_string()))?;
        let robots_url = match parsed.port() {
            Some(port) => format!("{}://{}:{}/robots.txt", parsed.scheme(), host, port),
            None => format!("{}://{}/robots.txt", parsed.scheme(), host),
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .user_agent(user_agent.to_string())
            .build()?;

        let response = match client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            _ => return Ok(RobotsPolicy::default()),
        };

        let body = response.text().await.unwrap_or_default();
        Ok(Self::from_content(&body))
    }

    /// Build a policy directly from robots.txt content (used by tests and the
    /// production path alike once the body has been fetched).
    pub fn from_content(content: &str) -> Self {
        let (rules, sitemaps) = parse(content);
        RobotsPolicy {
            rules,
            sitemaps,
            loaded: true,
        }
    }

    /// Longest-prefix match across `user_agent`'s rules falling back to `*`;
    /// `Allow` beats `Disallow` when both match with equal prefix length.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        let path = match Url::parse(url) {
            Ok(u) => {
                let mut p = u.path().to_string();
                if let Some(q) = u.query() {
                    p.push('?');
                    p.push_str(q);
                }
                p
            }
            Err(_) => return true,
        };

        let Some(rules) = self.match_agent(user_agent) else {
            return true;
        };

        let best_disallow = longest_match(&rules.disallow, &path);
        let best_allow = longest_match(&rules.allow, &path);

        match (best_disallow, best_allow) {
            (Some(d), Some(a)) => a >= d,
            (Some(_), None) => false,
            _ => true,
        }
    }

    /// Crawl delay in seconds for the project's own user agent, falling back to `default`.
    pub fn crawl_delay(&self, user_agent: &str, default: Duration) -> Duration {
        self.match_agent(user_agent)
            .and_then(|r| r.crawl_delay)
            .map(Duration::from_secs_f64)
            .unwrap_or(default)
    }

    /// Finds the rule group whose product token is contained in `user_agent`,
    /// preferring the longest (most specific) matching token, falling back to
    /// the wildcard `*` group. Robots.txt directives name a short product
    /// token (e.g. "GPTBot") rather than a full UA string, so containment
    /// rather than equality is the correct match.
    fn match_agent(&self, user_agent: &str) -> Option<&AgentRules> {
        let ua_lower = user_agent.to_lowercase();
        self.rules
            .iter()
            .filter(|(name, _)| name.as_str() != "*" && ua_lower.contains(name.as_str()))
            .max_by_key(|(name, _)| name.len())
            .map(|(_, rules)| rules)
            .or_else(|| self.rules.get("*"))
    }

}

/// Returns the length of the longest pattern in `patterns` that prefix-matches `path`,
/// or `None` if no pattern matches. An empty pattern never matches (an empty `Disallow:`
/// value means "allow all", so it contributes no rule).
fn longest_match(patterns: &[String], path: &str) -> Option<usize> {
    patterns
        .iter()
        .filter(|p| !p.is_empty() && path.starts_with(p.as_str()))
        .map(|p| p.len())
        .max()
}

fn parse(content: &str) -> (std::collections::HashMap<String, AgentRules>, Vec<String>) {
    let mut rules: std::collections::HashMap<String, AgentRules> =
        std::collections::HashMap::new();
    let mut sitemaps = Vec::new();
    let mut current_agents: Vec<String> = Vec::new();
    let mut group_open = false;

    for line in content.lines() {
        let line = line.trim();
        let line = match line.find('#') {
            Some(idx) => line[..idx].trim(),
            None => line,
        };

        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if group_open {
                    current_agents.clear();
                    group_open = false;
                }
                current_agents.push(value.to_lowercase());
            }
            "disallow" => {
                group_open = true;
                for agent in &current_agents {
                    rules
                        .entry(agent.clone())
                        .or_default()
                        .disallow
                        .push(value.to_string());
                }
            }
            "allow" => {
                group_open = true;
                for agent in &current_agents {
                    rules
                        .entry(agent.clone())
                        .or_default()
                        .allow
                        .push(value.to_string());
                }
            }
            "crawl-delay" => {
                group_open = true;
                if let Ok(secs) = value.parse::<f64>() {
                    for agent in &current_agents {
                        rules.entry(agent.clone()).or_default().crawl_delay = Some(secs);
                    }
                }
            }
            "sitemap" => {
                sitemaps.push(value.to_string());
            }
            _ => {}
        }
    }

    (rules, sitemaps)
}
