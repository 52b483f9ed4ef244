use scraper::{Html, Selector};
use url::Url;

use crate::domain::{LinkType, TagMap};

/// A link discovered on a page, resolved to an absolute URL.
#[derive(Debug, Clone)]
pub struct ExtractedLink {
    pub url: String,
    pub anchor_text: Option<String>,
    pub link_type: LinkType,
    pub is_followed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Headings {
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
}

/// Complete SEO-relevant extraction from one HTML document.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical_url: Option<String>,
    pub headings: Headings,
    pub links: Vec<ExtractedLink>,
    pub image_count: u32,
    pub js_count: u32,
    pub css_count: u32,
    pub has_robots_noindex: bool,
    pub has_robots_nofollow: bool,
    pub open_graph: TagMap,
    pub twitter_card: TagMap,
    pub structured_data: Vec<serde_json::Value>,
}

pub struct Parser;

impl Parser {
    pub fn parse(html_content: &str, base_url: &str) -> ParsedPage {
        let document = Html::parse_document(html_content);
        let base = Url::parse(base_url).ok();

        let title = Self::extract_title(&document);
        let meta_description = Self::extract_meta_content(&document, "description");
        let canonical_url = Self::extract_canonical(&document);
        let headings = Self::extract_headings(&document);
        let mut links = Self::extract_anchor_links(&document, &base);
        links.extend(Self::extract_resource_links(&document, &base));
        let image_count = Self::count(&document, "img");
        let js_count = Self::count(&document, "script");
        let css_count = Self::count(&document, r#"link[rel="stylesheet"]"#);
        let (has_robots_noindex, has_robots_nofollow) = Self::extract_robots_meta(&document);
        let open_graph = Self::extract_prefixed_meta(&document, "property", "og:");
        let twitter_card = Self::extract_prefixed_meta(&document, "name", "twitter:");
        let structured_data = Self::extract_json_ld(&document);

        ParsedPage {
            title,
            meta_description,
            canonical_url,
            headings,
            links,
            image_count,
            js_count,
            css_count,
            has_robots_noindex,
            has_robots_nofollow,
            open_graph,
            twitter_card,
            structured_data,
        }
    }

    fn extract_title(document: &Html) -> Option<String> {
        let sel = Selector::parse("title").unwrap();
        document
            .select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn extract_meta_content(document: &Html, name: &str) -> Option<String> {
        let selector_str = format!(r#"meta[name="{}"]"#, name);
        let sel = Selector::parse(&selector_str).unwrap();
        document
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr("content").map(|s| s.to_string()))
            .filter(|s| !s.is_empty())
    }

    fn extract_canonical(document: &Html) -> Option<String> {
        let sel = Selector::parse(r#"link[rel="canonical"]"#).unwrap();
        document
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr("href").map(|s| s.to_string()))
            .filter(|s| !s.is_empty())
    }

    fn extract_headings(document: &Html) -> Headings {
        let mut headings = Headings::default();
        for (tag, vec) in [
            ("h1", &mut headings.h1),
            ("h2", &mut headings.h2),
            ("h3", &mut headings.h3),
        ] {
            let sel = Selector::parse(tag).unwrap();
            for el in document.select(&sel) {
                let text = el.text().collect::<String>().trim().to_string();
                if !text.is_empty() {
                    vec.push(text);
                }
            }
        }
        headings
    }

    fn extract_anchor_links(document: &Html, base: &Option<Url>) -> Vec<ExtractedLink> {
        let sel = Selector::parse("a[href]").unwrap();
        let base_host = base.as_ref().and_then(|u| u.host_str().map(|h| h.to_lowercase()));
        let mut links = Vec::new();

        for el in document.select(&sel) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            let resolved = match base {
                Some(base) => base.join(href).ok(),
                None => Url::parse(href).ok(),
            };
            let Some(resolved_url) = resolved else {
                continue;
            };
            if resolved_url.scheme() != "http" && resolved_url.scheme() != "https" {
                continue;
            }

            let link_host = resolved_url.host_str().map(|h| h.to_lowercase());
            let link_type = if link_host == base_host {
                LinkType::Internal
            } else {
                LinkType::External
            };

            let rel = el.value().attr("rel").unwrap_or("");
            let anchor_text = el
                .text()
                .collect::<String>()
                .trim()
                .to_string();

            links.push(ExtractedLink {
                url: resolved_url.to_string(),
                anchor_text: if anchor_text.is_empty() {
                    None
                } else {
                    Some(anchor_text)
                },
                link_type,
                is_followed: !rel.contains("nofollow"),
            });
        }

        links
    }

    fn extract_resource_links(document: &Html, base: &Option<Url>) -> Vec<ExtractedLink> {
        let specs: &[(&str, &str)] = &[
            (r#"link[href]"#, "href"),
            (r#"script[src]"#, "src"),
            (r#"img[src]"#, "src"),
        ];
        let mut links = Vec::new();

        for (selector_str, attr) in specs {
            let sel = Selector::parse(selector_str).unwrap();
            for el in document.select(&sel) {
                let Some(raw) = el.value().attr(attr) else {
                    continue;
                };
                let resolved = match base {
                    Some(base) => base.join(raw).ok(),
                    None => Url::parse(raw).ok(),
                };
                let Some(resolved_url) = resolved else {
                    continue;
                };
                if resolved_url.scheme() != "http" && resolved_url.scheme() != "https" {
                    continue;
                }
                links.push(ExtractedLink {
                    url: resolved_url.to_string(),
                    anchor_text: None,
                    link_type: LinkType::Resource,
                    is_followed: true,
                });
            }
        }

        links
    }

    fn count(document: &Html, selector_str: &str) -> u32 {
        let sel = Selector::parse(selector_str).unwrap();
        document.select(&sel).count() as u32
    }

    fn extract_robots_meta(document: &Html) -> (bool, bool) {
        let sel = Selector::parse(r#"meta[name="robots"]"#).unwrap();
        let mut noindex = false;
        let mut nofollow = false;

        for el in document.select(&sel) {
            if let Some(content) = el.value().attr("content") {
                let lower = content.to_lowercase();
                if lower.contains("noindex") {
                    noindex = true;
                }
                if lower.contains("nofollow") {
                    nofollow = true;
                }
            }
        }

        (noindex, nofollow)
    }

    fn extract_prefixed_meta(document: &Html, attr_name: &str, prefix: &str) -> TagMap {
        let selector_str = format!(r#"meta[{}]"#, attr_name);
        let sel = Selector::parse(&selector_str).unwrap();
        let mut tags = TagMap::new();

        for el in document.select(&sel) {
            let Some(key) = el.value().attr(attr_name) else {
                continue;
            };
            let Some(stripped) = key.strip_prefix(prefix) else {
                continue;
            };
            if let Some(content) = el.value().attr("content") {
                if !content.is_empty() {
                    tags.insert(stripped.to_string(), content.to_string());
                }
            }
        }

        tags
    }

    fn extract_json_ld(document: &Html) -> Vec<serde_json::Value> {
        let sel = Selector::parse(r#"script[type="application/ld+json"]"#).unwrap();
        document
            .select(&sel)
            .map(|el| el.text().collect::<String>())
            .filter_map(|s| serde_json::from_str(s.trim()).ok())
            .collect()
    }
}
