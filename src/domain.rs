/// Domain extraction and counting logic for Tab Organizer
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use url::Url;

/// Key returned for anything that cannot be parsed.
pub const UNKNOWN_DOMAIN: &str = "unknown";

static SCHEME_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*)://").expect("scheme pattern is valid")
});

/// Extract the grouping key for a URL
///
/// Algorithm:
/// 1. Empty input → "unknown"
/// 2. `scheme://...` with a scheme other than http/https → the scheme token,
///    so every internal page of one kind clusters together
/// 3. Parse the URL; failures → "unknown"
/// 4. Non-web schemes without "//" (about:, data:) → the scheme token
/// 5. http(s) → the hostname with one leading "www." removed
///
/// Examples:
/// - https://www.example.com/path → example.com
/// - chrome://extensions → chrome
/// - chrome-extension://abcdef/popup.html → chrome-extension
/// - not a url → unknown
///
/// Never panics; this is a pure function of the URL.
pub fn extract_domain(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return UNKNOWN_DOMAIN.to_string();
    }

    if let Some(caps) = SCHEME_PREFIX.captures(url) {
        let scheme = caps[1].to_lowercase();
        if !is_web_scheme(&scheme) {
            return scheme;
        }
    }

    match Url::parse(url) {
        Ok(parsed) if is_web_scheme(parsed.scheme()) => match parsed.host_str() {
            Some(host) if !host.is_empty() => strip_www(host).to_string(),
            _ => UNKNOWN_DOMAIN.to_string(),
        },
        Ok(parsed) => parsed.scheme().to_string(),
        Err(_) => UNKNOWN_DOMAIN.to_string(),
    }
}

fn is_web_scheme(scheme: &str) -> bool {
    matches!(scheme, "http" | "https")
}

fn strip_www(host: &str) -> &str {
    match host.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => rest,
        _ => host,
    }
}

/// Count domain occurrences from a list of URLs
pub fn count_domains<'a, I>(urls: I) -> HashMap<String, usize>
where
    I: IntoIterator<Item = &'a str>,
{
    urls.into_iter()
        .map(extract_domain)
        .fold(HashMap::new(), |mut counts, domain| {
            *counts.entry(domain).or_insert(0) += 1;
            counts
        })
}

/// Get the top N domains by count
pub fn get_top_domains(counts: &HashMap<String, usize>, n: usize) -> Vec<(String, usize)> {
    let mut domain_vec: Vec<(String, usize)> = counts
        .iter()
        .map(|(domain, count)| (domain.clone(), *count))
        .collect();

    // Sort by count descending, then by domain name ascending
    domain_vec.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    domain_vec.into_iter().take(n).collect()
}
