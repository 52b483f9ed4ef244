use std::collections::HashSet;
use std::time::Duration;

use regex::Regex;
use url::Url;

/// Paths tried when a project declares no sitemaps in robots.txt.
const WELL_KNOWN_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml", "/sitemap-index.xml"];

/// Result of fetching and parsing sitemaps for a domain.
#[derive(Debug, Clone)]
pub struct SitemapResult {
    /// Discovered URLs, filtered to `seed_domain` and deduplicated.
    pub urls: Vec<String>,
    /// Total `<loc>` entries seen before domain filtering.
    pub total_count: u32,
}

/// Discover and read sitemaps for `seed_domain`.
///
/// Tries every URL in `declared` (typically the `Sitemap:` lines from robots.txt)
/// plus the well-known fallback paths. A `<sitemapindex>` root is recursed into,
/// bounded by `max_sitemaps_to_process` child sitemaps; gzipped documents are
/// skipped. Fetch errors are swallowed — the seed still proceeds without them.
pub async fn discover(
    seed_url: &str,
    declared: &[String],
    max_sitemaps_to_process: usize,
) -> SitemapResult {
    let Ok(base) = Url::parse(seed_url) else {
        return SitemapResult {
            urls: vec![],
            total_count: 0,
        };
    };
    let Some(seed_domain) = base.host_str().map(|h| h.to_lowercase()) else {
        return SitemapResult {
            urls: vec![],
            total_count: 0,
        };
    };

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
    {
        Ok(c) => c,
        Err(_) => {
            return SitemapResult {
                urls: vec![],
                total_count: 0,
            }
        }
    };

    let mut candidates: Vec<String> = declared.to_vec();
    for path in WELL_KNOWN_PATHS {
        if let Ok(u) = base.join(path) {
            candidates.push(u.to_string());
        }
    }

    let loc_re = Regex::new(r"<loc>\s*(.*?)\s*</loc>").expect("valid regex");
    let mut all_urls: Vec<String> = Vec::new();
    let mut processed_children = 0usize;

    for sitemap_url in &candidates {
        if is_gzipped(sitemap_url) {
            continue;
        }
        let Some(xml) = fetch_xml(&client, sitemap_url).await else {
            continue;
        };

        if xml.contains("<sitemapindex") {
            let child_urls: Vec<String> = loc_re
                .captures_iter(&xml)
                .filter_map(|cap| cap.get(1).map(|m| unescape_xml(m.as_str())))
                .collect();

            for child_url in &child_urls {
                if processed_children >= max_sitemaps_to_process {
                    break;
                }
                if is_gzipped(child_url) {
                    continue;
                }
                if let Some(child_xml) = fetch_xml(&client, child_url).await {
                    extract_locs(&loc_re, &child_xml, &mut all_urls);
                }
                processed_children += 1;
            }
        } else {
            extract_locs(&loc_re, &xml, &mut all_urls);
        }
    }

    let total_count = all_urls.len() as u32;

    let mut seen = HashSet::new();
    let filtered: Vec<String> = all_urls
        .into_iter()
        .filter(|url| {
            Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
                .map(|h| h == seed_domain || h == format!("www.{}", seed_domain))
                .unwrap_or(false)
        })
        .filter(|url| seen.insert(url.clone()))
        .collect();

    SitemapResult {
        urls: filtered,
        total_count,
    }
}

fn is_gzipped(url: &str) -> bool {
    url.ends_with(".gz")
}

async fn fetch_xml(client: &reqwest::Client, url: &str) -> Option<String> {
    let resp = client.get(url).send().await.ok()?;
    if !resp.status().is_success() {
        return None;
    }
    if resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("gzip"))
        .unwrap_or(false)
    {
        return None;
    }
    resp.text().await.ok()
}

fn extract_locs(re: &Regex, xml: &str, out: &mut Vec<String>) {
    for cap in re.captures_iter(xml) {
        if let Some(m) = cap.get(1) {
            let url = unescape_xml(m.as_str().trim());
            if !url.is_empty() {
                out.push(url);
            }
        }
    }
}

fn unescape_xml(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_locs_from_standard_sitemap() {
        let re = Regex::new(r"<loc>\s*(.*?)\s*</loc>").unwrap();
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/</loc></url>
  <url><loc>https://example.com/about</loc></url>
  <url><loc>https://example.com/blog?a=1&amp;b=2</loc></url>
</urlset>"#;
        let mut urls = Vec::new();
        extract_locs(&re, xml, &mut urls);
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[2], "https://example.com/blog?a=1&b=2");
    }

    #[test]
    fn extracts_nothing_from_empty_urlset() {
        let re = Regex::new(r"<loc>\s*(.*?)\s*</loc>").unwrap();
        let mut urls = Vec::new();
        extract_locs(&re, "<urlset></urlset>", &mut urls);
        assert!(urls.is_empty());
    }

    #[test]
    fn extracts_nothing_from_invalid_xml() {
        let re = Regex::new(r"<loc>\s*(.*?)\s*</loc>").unwrap();
        let mut urls = Vec::new();
        extract_locs(&re, "this is not xml at all", &mut urls);
        assert!(urls.is_empty());
    }

    #[test]
    fn extracts_locs_with_surrounding_whitespace() {
        let re = Regex::new(r"<loc>\s*(.*?)\s*</loc>").unwrap();
        let xml = "<urlset>\n  <url><loc>\n    https://example.com/page\n  </loc></url>\n</urlset>";
        let mut urls = Vec::new();
        extract_locs(&re, xml, &mut urls);
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0], "https://example.com/page");
    }

    #[tokio::test]
    async fn discover_returns_empty_for_unreachable_domain() {
        let result = discover(
            "https://nonexistent.invalid/",
            &["https://nonexistent.invalid/sitemap.xml".to_string()],
            5,
        )
        .await;
        assert!(result.urls.is_empty());
        assert_eq!(result.total_count, 0);
    }

    #[test]
    fn detects_sitemap_index_root() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/sitemap-1.xml</loc></sitemap>
  <sitemap><loc>https://example.com/sitemap-2.xml</loc></sitemap>
</sitemapindex>"#;
        assert!(xml.contains("<sitemapindex"));
    }

    #[test]
    fn gzip_suffixed_urls_are_skipped() {
        assert!(is_gzipped("https://example.com/sitemap.xml.gz"));
        assert!(!is_gzipped("https://example.com/sitemap.xml"));
    }

    #[test]
    fn unescapes_common_xml_entities() {
        assert_eq!(unescape_xml("a&amp;b&lt;c&gt;d&quot;e&#39;f"), "a&b<c>d\"e'f");
    }
}
