//! Markdown splitting and link placeholders.
//!
//! Link URLs are swapped for small integer indices before a document goes to
//! the translation backend, which otherwise tends to rewrite or "translate"
//! them. The indices are swapped back after translation.

use regex::Regex;
use std::sync::OnceLock;

/// Prefix that starts a new section.
const SECTION_MARKER: &str = "## ";

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[(.+?)\]\((.+?)\)").expect("valid link regex"))
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[(.+?)\]\((\d+)\)").expect("valid placeholder regex"))
}

/// Original link URLs, indexed by placeholder number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkTable(Vec<String>);

impl LinkTable {
    /// Number of links recorded.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no links were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// URL for a placeholder index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    fn push(&mut self, url: &str) -> usize {
        self.0.push(url.to_string());
        self.0.len() - 1
    }
}

/// Split a document before every line that starts with `## `.
///
/// The first section is whatever precedes the first heading (possibly the
/// heading itself). Concatenating the sections gives back the input.
pub fn split_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0;

    for (newline, _) in text.match_indices('\n') {
        let line_start = newline + 1;
        if text[line_start..].starts_with(SECTION_MARKER) {
            sections.push(&text[start..line_start]);
            start = line_start;
        }
    }

    if start < text.len() {
        sections.push(&text[start..]);
    }

    sections
}

/// Replace every `[text](url)` with `[text](N)`, recording `url` at index `N`.
pub fn placeholder_links(text: &str) -> (String, LinkTable) {
    let mut links = LinkTable::default();
    let replaced = link_pattern().replace_all(text, |caps: &regex::Captures<'_>| {
        let index = links.push(&caps[2]);
        format!("[{}]({})", &caps[1], index)
    });
    (replaced.into_owned(), links)
}

/// Replace every `[text](N)` with the recorded URL for `N`.
///
/// Indices that are not in the table are left as they are.
pub fn restore_links(text: &str, links: &LinkTable) -> String {
    placeholder_pattern()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let url = caps[2].parse::<usize>().ok().and_then(|i| links.get(i));
            match url {
                Some(url) => format!("[{}]({})", &caps[1], url),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_split_before_level_two_headings() {
        let text = "# Title\nintro\n## One\nbody\n## Two\nmore\n";
        assert_eq!(
            split_sections(text),
            vec!["# Title\nintro\n", "## One\nbody\n", "## Two\nmore\n"]
        );
    }

    #[test]
    fn sections_starting_with_heading() {
        let text = "## One\na\n## Two\nb";
        assert_eq!(split_sections(text), vec!["## One\na\n", "## Two\nb"]);
    }

    #[test]
    fn deeper_headings_do_not_split() {
        let text = "## One\n### Sub\n#### Deep\n";
        assert_eq!(split_sections(text), vec![text]);
    }

    #[test]
    fn heading_marker_mid_line_does_not_split() {
        let text = "see ## not a heading\nok";
        assert_eq!(split_sections(text), vec![text]);
    }

    #[test]
    fn sections_concatenate_to_input() {
        let text = "a\n## b\n\n## c\n## d";
        assert_eq!(split_sections(text).concat(), text);
    }

    #[test]
    fn empty_text_has_no_sections() {
        assert!(split_sections("").is_empty());
    }

    #[test]
    fn placeholders_replace_urls_in_order() {
        let (out, links) =
            placeholder_links("[foo](http://x) and [bar](https://y/z?q=1) and ![img](a.png)");
        assert_eq!(out, "[foo](0) and [bar](1) and ![img](2)");
        assert_eq!(links.len(), 3);
        assert_eq!(links.get(0), Some("http://x"));
        assert_eq!(links.get(1), Some("https://y/z?q=1"));
        assert_eq!(links.get(2), Some("a.png"));
    }

    #[test]
    fn placeholders_do_not_span_lines() {
        let (out, links) = placeholder_links("[foo\n](http://x)");
        assert_eq!(out, "[foo\n](http://x)");
        assert!(links.is_empty());
    }

    #[test]
    fn restore_puts_urls_back() {
        let (out, links) = placeholder_links("[foo](http://x)");
        assert_eq!(restore_links(&out.replace("foo", "フー"), &links), "[フー](http://x)");
    }

    #[test]
    fn restore_leaves_unknown_indices() {
        let links = LinkTable::default();
        assert_eq!(restore_links("[a](7)", &links), "[a](7)");
    }

    #[test]
    fn text_without_links_is_unchanged() {
        let (out, links) = placeholder_links("no links here");
        assert_eq!(out, "no links here");
        assert!(links.is_empty());
        assert_eq!(restore_links(&out, &links), out);
    }
}
