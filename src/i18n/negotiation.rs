//! `Accept-Language` parsing and matching.

use crate::i18n::{primary_subtag, Locale};

/// One language range with its quality.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageRange<'a> {
    pub tag: &'a str,
    pub quality: f32,
}

/// Parse a header value into ranges ordered by descending quality.
/// Ranges with equal quality keep header order; `q=0` ranges are dropped.
pub fn parse_accept_language(value: &str) -> Vec<LanguageRange<'_>> {
    let mut ranges: Vec<LanguageRange<'_>> = value
        .split(',')
        .filter_map(|item| {
            let mut parts = item.split(';');
            let tag = parts.next()?.trim();
            if tag.is_empty() {
                return None;
            }
            let quality = parts
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0)
                .clamp(0.0, 1.0);
            Some(LanguageRange { tag, quality })
        })
        .filter(|r| r.quality > 0.0)
        .collect();

    ranges.sort_by(|a, b| b.quality.total_cmp(&a.quality));
    ranges
}

/// Best supported locale for the header, or `None` if nothing matches.
///
/// Each range is tried in quality order: exact tag first, then any
/// supported locale sharing the primary language subtag. `*` matches
/// nothing so the caller's default applies.
pub fn negotiate(value: &str, supported: &[Locale]) -> Option<Locale> {
    for range in parse_accept_language(value) {
        if range.tag == "*" {
            return None;
        }
        let normalized = range.tag.replace('_', "-");
        if let Some(exact) = supported
            .iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(&normalized))
        {
            return Some(exact.clone());
        }
        let language = primary_subtag(range.tag);
        if let Some(partial) = supported.iter().find(|l| l.language() == language) {
            return Some(partial.clone());
        }
    }
    None
}
