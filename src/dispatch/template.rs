//! Affiliate URL template resolution.
//!
//! Templates contain `{key}` placeholders resolved against a parameter
//! bag. Resolution is total: unresolved parameters are stripped, never
//! errors, and literal braces are treated as plain text.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::{Captures, Regex};

/// Query-string percent encoding: everything except unreserved chars.
const QUERY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_ENCODE).to_string()
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^}]+)\}").expect("placeholder regex is valid"))
}

/// Build the outbound URL from a template and a parameter bag.
///
/// Each `{key}` placeholder resolves in order: the parameter itself,
/// the `siteid` alias chain (`sub_id_1`, then `sub_id1`), then the
/// generic `sub_id` fallback. `type_ads`, `siteid`, and `sub_id*`
/// aliases never take the generic fallback; their placeholders stay
/// unresolved and the strip pass removes them from the query string.
/// Parameters the template never referenced are appended sorted by key.
pub fn build_url(template: &str, params: &HashMap<String, String>) -> String {
    let main_sub = params.get("sub_id").cloned().unwrap_or_default();

    let resolved = placeholder_re().replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        match resolve_value(key, params, &main_sub) {
            Some(value) => encode(&value),
            // Left in place for the strip pass below.
            None => caps[0].to_string(),
        }
    });

    let resolved = strip_unresolved_params(&resolved);

    let present = query_keys(&resolved);
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();

    let mut extra = Vec::new();
    for key in keys {
        let value = &params[key];
        if value.is_empty() {
            continue;
        }
        if template.contains(&format!("{{{key}}}")) {
            continue;
        }
        let encoded_key = encode(key);
        if present.contains(&encoded_key) {
            continue;
        }
        extra.push(format!("{encoded_key}={}", encode(value)));
    }

    if extra.is_empty() {
        return resolved;
    }
    let sep = if resolved.contains('?') { '&' } else { '?' };
    format!("{resolved}{sep}{}", extra.join("&"))
}

/// Resolve one placeholder key, or `None` to leave it unresolved.
fn resolve_value(key: &str, params: &HashMap<String, String>, main_sub: &str) -> Option<String> {
    if let Some(value) = params.get(key).filter(|v| !v.is_empty()) {
        return Some(value.clone());
    }
    if key == "siteid" {
        // Both alias styles are in the wild: sub_id_1 and sub_id1.
        return ["sub_id_1", "sub_id1"]
            .iter()
            .find_map(|alias| params.get(*alias).filter(|v| !v.is_empty()).cloned());
    }
    if key == "type_ads" {
        return None;
    }
    if key.starts_with("sub_id") && key != "sub_id" {
        return None;
    }
    // Generic fallback; may be empty, the strip pass drops it then.
    Some(main_sub.to_string())
}

/// Drop query parameters whose value is empty or still carries braces.
fn strip_unresolved_params(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    if query.is_empty() {
        return url.to_string();
    }

    let kept: Vec<&str> = query
        .split('&')
        .filter(|item| {
            if item.is_empty() {
                return false;
            }
            match item.split_once('=') {
                Some((_, value)) => {
                    !value.is_empty() && !value.contains('{') && !value.contains('}')
                }
                None => false,
            }
        })
        .collect();

    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", kept.join("&"))
    }
}

/// Keys already present in the URL's query string (encoded form).
fn query_keys(url: &str) -> HashSet<String> {
    let Some((_, query)) = url.split_once('?') else {
        return HashSet::new();
    };
    query
        .split('&')
        .filter(|item| !item.is_empty())
        .filter_map(|item| {
            let key = item.split('=').next().unwrap_or("");
            (!key.is_empty()).then(|| key.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_simple_substitution() {
        let url = build_url("https://x.com?a={k}", &params(&[("k", "v")]));
        assert_eq!(url, "https://x.com?a=v");
    }

    #[test]
    fn test_missing_parameter_is_dropped() {
        let url = build_url("https://x.com?a={missing}", &params(&[]));
        assert_eq!(url, "https://x.com");
    }

    #[test]
    fn test_generic_fallback_to_sub_id() {
        let url = build_url(
            "https://x.com?cid={clickid}",
            &params(&[("sub_id", "abc123")]),
        );
        assert_eq!(url, "https://x.com?cid=abc123&sub_id=abc123");
    }

    #[test]
    fn test_siteid_alias_chain() {
        let url = build_url(
            "https://x.com?site={siteid}",
            &params(&[("sub_id_1", "zone9")]),
        );
        assert_eq!(url, "https://x.com?site=zone9&sub_id_1=zone9");

        let url = build_url(
            "https://x.com?site={siteid}",
            &params(&[("sub_id1", "zone7")]),
        );
        assert_eq!(url, "https://x.com?site=zone7&sub_id1=zone7");
    }

    #[test]
    fn test_siteid_without_alias_not_defaulted() {
        let url = build_url(
            "https://x.com?site={siteid}",
            &params(&[("sub_id", "abc")]),
        );
        // siteid never takes the generic fallback.
        assert_eq!(url, "https://x.com?sub_id=abc");
    }

    #[test]
    fn test_type_ads_and_sub_id_aliases_not_defaulted() {
        let url = build_url(
            "https://x.com?t={type_ads}&s1={sub_id_1}",
            &params(&[("sub_id", "abc")]),
        );
        assert_eq!(url, "https://x.com?sub_id=abc");
    }

    #[test]
    fn test_values_percent_encoded() {
        let url = build_url(
            "https://x.com?q={term}",
            &params(&[("term", "a b&c")]),
        );
        assert_eq!(url, "https://x.com?q=a%20b%26c");
    }

    #[test]
    fn test_extra_params_sorted_and_appended() {
        let url = build_url(
            "https://x.com?cid={sub_id}",
            &params(&[("sub_id", "s"), ("payout", "1.5"), ("zone", "z1")]),
        );
        // sub_id was consumed by the template, only the rest appends.
        assert_eq!(url, "https://x.com?cid=s&payout=1.5&zone=z1");
    }

    #[test]
    fn test_extra_params_on_bare_url() {
        let url = build_url("https://x.com", &params(&[("b", "2"), ("a", "1")]));
        assert_eq!(url, "https://x.com?a=1&b=2");
    }

    #[test]
    fn test_no_duplicate_of_present_keys() {
        let url = build_url(
            "https://x.com?payout={payout}",
            &params(&[("payout", "2.0")]),
        );
        assert_eq!(url, "https://x.com?payout=2.0");
    }

    #[test]
    fn test_unbalanced_brace_is_plain_text_in_path() {
        let url = build_url("https://x.com/landing{v1", &params(&[]));
        assert_eq!(url, "https://x.com/landing{v1");
    }

    #[test]
    fn test_no_braces_survive_in_query() {
        let url = build_url(
            "https://x.com?a={k}&b={unclosed",
            &params(&[("k", "v")]),
        );
        assert!(!url.contains('{'));
        assert!(!url.contains('}'));
        assert_eq!(url, "https://x.com?a=v");
    }

    #[test]
    fn test_empty_explicit_value_falls_back() {
        let url = build_url(
            "https://x.com?cid={clickid}",
            &params(&[("clickid", ""), ("sub_id", "s1")]),
        );
        assert_eq!(url, "https://x.com?cid=s1&sub_id=s1");
    }
}
