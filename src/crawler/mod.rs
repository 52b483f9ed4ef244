pub mod fetcher;
pub mod headless;
pub mod parser;
pub mod queue;
pub mod robots;
pub mod sitemap;
pub mod url_canon;

pub use fetcher::PageFetcher;
pub use headless::HeadlessFetcher;
pub use parser::Parser;
pub use robots::RobotsPolicy;

use uuid::Uuid;

use crate::crawler::parser::ExtractedLink;
use crate::domain::Page;

/// A page that js-renders more than this many `<script>` tags is assumed to
/// rely on client-side rendering for its primary content and is re-fetched
/// headlessly. Fixed, not configurable, per the escalation rule.
const JS_ESCALATION_THRESHOLD: u32 = 5;

/// Outcome of crawling a single URL: the page record ready to persist, its
/// outbound links, and whether the fetch itself failed (transport-level,
/// distinct from a successful-but-non-HTML response).
pub struct PageCrawlResult {
    pub page: Page,
    pub links: Vec<ExtractedLink>,
    pub fetch_failed: bool,
}

/// Ties the HTTP fetcher, HTML parser, and headless escalation path together
/// into a single "crawl this URL" operation.
pub struct CrawlEngine {
    fetcher: PageFetcher,
    headless: HeadlessFetcher,
}

impl CrawlEngine {
    pub fn new(fetcher: PageFetcher, headless: HeadlessFetcher) -> Self {
        CrawlEngine { fetcher, headless }
    }

    pub async fn crawl(&self, project_id: Uuid, url: &str) -> PageCrawlResult {
        let fetched = match self.fetcher.fetch(url).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "fetch failed");
                return PageCrawlResult {
                    page: minimal_page(project_id, url, 0, None, None),
                    links: vec![],
                    fetch_failed: true,
                };
            }
        };

        let is_html = fetched
            .content_type
            .as_deref()
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);

        if !is_html {
            return PageCrawlResult {
                page: minimal_page(
                    project_id,
                    &fetched.final_url,
                    fetched.status_code,
                    fetched.content_type.clone(),
                    fetched.content_length,
                ),
                links: vec![],
                fetch_failed: false,
            };
        }

        let parsed = Parser::parse(&fetched.body, &fetched.final_url);

        if parsed.js_count > JS_ESCALATION_THRESHOLD {
            match self.headless.render(&fetched.final_url).await {
                Ok(rendered) => {
                    let redirect_url = if rendered.final_url != url {
                        Some(rendered.final_url.clone())
                    } else {
                        None
                    };
                    let page = Page {
                        id: Uuid::new_v4(),
                        project_id,
                        url: rendered.final_url.clone(),
                        title: rendered.title,
                        h1s: rendered.headings.h1,
                        h2s: rendered.headings.h2,
                        h3s: rendered.headings.h3,
                        meta_description: rendered.meta_description,
                        canonical_url: rendered.canonical_url,
                        http_status: rendered.status_code,
                        content_type: Some("text/html".to_string()),
                        content_length: None,
                        is_indexable: !rendered.has_robots_noindex,
                        has_robots_noindex: rendered.has_robots_noindex,
                        has_robots_nofollow: rendered.has_robots_nofollow,
                        redirect_url,
                        load_time_ms: fetched.load_time_ms,
                        first_byte_time_ms: Some(rendered.first_byte_time_ms),
                        size_bytes: None,
                        image_count: rendered.image_count,
                        js_count: rendered.js_count,
                        css_count: rendered.css_count,
                        open_graph: rendered.open_graph,
                        twitter_card: rendered.twitter_card,
                        structured_data: rendered.structured_data,
                    };
                    return PageCrawlResult {
                        page,
                        links: rendered.links,
                        fetch_failed: false,
                    };
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "headless escalation failed, keeping HTTP result");
                }
            }
        }

        let redirect_url = if fetched.final_url != url {
            Some(fetched.final_url.clone())
        } else {
            None
        };

        let page = Page {
            id: Uuid::new_v4(),
            project_id,
            url: fetched.final_url.clone(),
            title: parsed.title,
            h1s: parsed.headings.h1,
            h2s: parsed.headings.h2,
            h3s: parsed.headings.h3,
            meta_description: parsed.meta_description,
            canonical_url: parsed.canonical_url,
            http_status: fetched.status_code,
            content_type: fetched.content_type,
            content_length: fetched.content_length,
            is_indexable: !parsed.has_robots_noindex,
            has_robots_noindex: parsed.has_robots_noindex,
            has_robots_nofollow: parsed.has_robots_nofollow,
            redirect_url,
            load_time_ms: fetched.load_time_ms,
            first_byte_time_ms: Some(fetched.first_byte_time_ms),
            size_bytes: fetched.content_length,
            image_count: parsed.image_count,
            js_count: parsed.js_count,
            css_count: parsed.css_count,
            open_graph: parsed.open_graph,
            twitter_card: parsed.twitter_card,
            structured_data: parsed.structured_data,
        };

        PageCrawlResult {
            page,
            links: parsed.links,
            fetch_failed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine() -> CrawlEngine {
        let fetcher = PageFetcher::new(Duration::from_secs(5), "TestBot/1.0", 4);
        let headless = HeadlessFetcher::new(1, "/nonexistent/render-page.mjs".to_string(), "TestBot/1.0".to_string());
        CrawlEngine::new(fetcher, headless)
    }

    #[tokio::test]
    async fn non_html_response_skips_parsing_and_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "application/pdf").set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;

        let result = engine().crawl(Uuid::new_v4(), &format!("{}/doc.pdf", server.uri())).await;
        assert!(!result.fetch_failed);
        assert!(result.links.is_empty());
        assert_eq!(result.page.image_count, 0);
        assert_eq!(result.page.content_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn js_heavy_page_falls_back_to_http_result_when_headless_unavailable() {
        let server = MockServer::start().await;
        let scripts: String = (0..7).map(|i| format!("<script src=\"/s{i}.js\"></script>")).collect();
        let body = format!("<html><head><title>JS heavy</title></head><body>{scripts}</body></html>");
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        // The configured headless script path does not exist, so the subprocess
        // invocation fails and the engine keeps the HTTP-parsed result instead
        // of propagating the error.
        let result = engine().crawl(Uuid::new_v4(), &server.uri()).await;
        assert!(!result.fetch_failed);
        assert_eq!(result.page.title.as_deref(), Some("JS heavy"));
        assert_eq!(result.page.js_count, 7);
    }
}

fn minimal_page(
    project_id: Uuid,
    url: &str,
    http_status: u16,
    content_type: Option<String>,
    content_length: Option<u64>,
) -> Page {
    Page {
        id: Uuid::new_v4(),
        project_id,
        url: url.to_string(),
        title: None,
        h1s: vec![],
        h2s: vec![],
        h3s: vec![],
        meta_description: None,
        canonical_url: None,
        http_status,
        content_type,
        content_length,
        is_indexable: false,
        has_robots_noindex: false,
        has_robots_nofollow: false,
        redirect_url: None,
        load_time_ms: 0,
        first_byte_time_ms: None,
        size_bytes: content_length,
        image_count: 0,
        js_count: 0,
        css_count: 0,
        open_graph: Default::default(),
        twitter_card: Default::default(),
        structured_data: vec![],
    }
}
