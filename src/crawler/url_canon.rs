use url::{Position, Url};

/// Query parameters stripped during canonicalization. Extensible set, not exhaustive.
const TRACKING_PARAMS: &[&str] = &["utm_source", "utm_medium", "utm_campaign"];

/// Normalize a URL for dedup and same-site comparisons.
///
/// Lowercases scheme/host (the `url` crate already does this on parse), strips
/// default ports, the fragment, and tracking query parameters, and collapses a
/// bare `/` path's trailing slash. On parse failure the input is returned unchanged.
pub fn canonicalize(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.to_string();
    };

    parsed.set_fragment(None);

    let default_port = match parsed.scheme() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    if parsed.port() == default_port {
        let _ = parsed.set_port(None);
    }

    if parsed.query().is_some() {
        let filtered: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if filtered.is_empty() {
            parsed.set_query(None);
        } else {
            let mut pairs = parsed.query_pairs_mut();
            pairs.clear();
            for (k, v) in &filtered {
                pairs.append_pair(k, v);
            }
            drop(pairs);
        }
    }

    // `Url::set_path("")` can't actually produce an empty path for a
    // special-scheme URL — the parser re-normalizes it straight back to
    // "/". Drop the root path by slicing it out of the serialization
    // instead, preserving whatever query string follows it.
    if &parsed[Position::BeforePath..Position::AfterPath] == "/" {
        let prefix = &parsed[Position::BeforeScheme..Position::BeforePath];
        let suffix = &parsed[Position::AfterPath..Position::AfterQuery];
        return format!("{prefix}{suffix}");
    }

    parsed.to_string()
}

/// Host used for same-site and per-domain gating comparisons.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}
