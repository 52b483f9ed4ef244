//! Fixed-order issue detection rules run against a fetched and parsed page.

use uuid::Uuid;

use crate::domain::{Issue, Page, Severity};

/// Evaluate the fixed issue table against `page`, in table order.
///
/// `fetch_failed` covers transport-level failures the page itself cannot
/// express (a page that failed to fetch has no meaningful title/headings).
pub fn analyze(project_id: Uuid, scan_id: Uuid, page: &Page, fetch_failed: bool) -> Vec<Issue> {
    let mut issues = Vec::new();

    let mut push = |issue_type: &'static str, description: &str, severity: Severity| {
        issues.push(Issue {
            id: Uuid::new_v4(),
            project_id,
            scan_id,
            page_id: page.id,
            issue_type,
            description: description.to_string(),
            severity,
            is_fixed: false,
            details: None,
        });
    };

    let title_len = page.title.as_deref().unwrap_or("").len();
    let title_missing = page.title.is_none() || title_len == 0;

    if title_missing {
        push(
            "missing_title",
            "Page has no <title> element or it is empty",
            Severity::High,
        );
    } else if title_len < 10 || title_len > 70 {
        push(
            "title_length",
            "Title length is outside the recommended 10-70 character range",
            Severity::Medium,
        );
    }

    if page.meta_description.is_none() {
        push(
            "missing_meta_description",
            "Page has no meta description",
            Severity::Medium,
        );
    } else if let Some(desc) = &page.meta_description {
        if desc.len() < 50 || desc.len() > 160 {
            push(
                "meta_description_length",
                "Meta description length is outside the recommended 50-160 character range",
                Severity::Low,
            );
        }
    }

    if page.h1s.is_empty() {
        push("missing_h1", "Page has no <h1> element", Severity::Medium);
    } else if page.h1s.len() > 1 {
        push(
            "multiple_h1",
            "Page has more than one <h1> element",
            Severity::Medium,
        );
    }

    if fetch_failed {
        push(
            "error",
            "Page could not be fetched successfully",
            Severity::High,
        );
    }

    if let Some(ct) = &page.content_type {
        if !ct.contains("text/html") {
            push(
                "non_html_content",
                "Page content type is not text/html",
                Severity::Medium,
            );
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_page() -> Page {
        Page {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            url: "https://example.com/".to_string(),
            title: None,
            h1s: vec![],
            h2s: vec![],
            h3s: vec![],
            meta_description: None,
            canonical_url: None,
            http_status: 200,
            content_type: Some("text/html".to_string()),
            content_length: None,
            is_indexable: true,
            has_robots_noindex: false,
            has_robots_nofollow: false,
            redirect_url: None,
            load_time_ms: 0,
            first_byte_time_ms: None,
            size_bytes: None,
            image_count: 0,
            js_count: 0,
            css_count: 0,
            open_graph: Default::default(),
            twitter_card: Default::default(),
            structured_data: vec![],
        }
    }

    #[test]
    fn flags_missing_title() {
        let page = blank_page();
        let issues = analyze(Uuid::new_v4(), Uuid::new_v4(), &page, false);
        assert!(issues.iter().any(|i| i.issue_type == "missing_title"));
    }

    #[test]
    fn flags_short_title_instead_of_missing() {
        let mut page = blank_page();
        page.title = Some("Hi".to_string());
        let issues = analyze(Uuid::new_v4(), Uuid::new_v4(), &page, false);
        assert!(!issues.iter().any(|i| i.issue_type == "missing_title"));
        assert!(issues.iter().any(|i| i.issue_type == "title_length"));
    }

    #[test]
    fn good_title_raises_no_title_issue() {
        let mut page = blank_page();
        page.title = Some("A Properly Sized Page Title Here".to_string());
        let issues = analyze(Uuid::new_v4(), Uuid::new_v4(), &page, false);
        assert!(!issues.iter().any(|i| i.issue_type.starts_with("title")
            || i.issue_type == "missing_title"));
    }

    #[test]
    fn flags_missing_meta_description() {
        let page = blank_page();
        let issues = analyze(Uuid::new_v4(), Uuid::new_v4(), &page, false);
        assert!(issues
            .iter()
            .any(|i| i.issue_type == "missing_meta_description"));
    }

    #[test]
    fn flags_meta_description_length() {
        let mut page = blank_page();
        page.meta_description = Some("too short".to_string());
        let issues = analyze(Uuid::new_v4(), Uuid::new_v4(), &page, false);
        assert!(issues
            .iter()
            .any(|i| i.issue_type == "meta_description_length"));
    }

    #[test]
    fn flags_missing_and_multiple_h1() {
        let page = blank_page();
        let issues = analyze(Uuid::new_v4(), Uuid::new_v4(), &page, false);
        assert!(issues.iter().any(|i| i.issue_type == "missing_h1"));

        let mut page = blank_page();
        page.h1s = vec!["One".to_string(), "Two".to_string()];
        let issues = analyze(Uuid::new_v4(), Uuid::new_v4(), &page, false);
        assert!(issues.iter().any(|i| i.issue_type == "multiple_h1"));
    }

    #[test]
    fn flags_fetch_error() {
        let page = blank_page();
        let issues = analyze(Uuid::new_v4(), Uuid::new_v4(), &page, true);
        assert!(issues.iter().any(|i| i.issue_type == "error"));
    }

    #[test]
    fn flags_non_html_content() {
        let mut page = blank_page();
        page.content_type = Some("application/pdf".to_string());
        let issues = analyze(Uuid::new_v4(), Uuid::new_v4(), &page, false);
        assert!(issues.iter().any(|i| i.issue_type == "non_html_content"));
    }
}
