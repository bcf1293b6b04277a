use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};

pub const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "blockquote", "code", "em", "i", "li", "ol", "strong", "ul",
    "br", "p", "span", "h1", "h2", "h3", "h4",
];
pub const GENERIC_ATTRIBUTES: &[&str] = &["class", "style", "aria-hidden"];
pub const ALLOWED_STYLES: &[&str] = &["font-size", "color"];
const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

// `>` is optional: a tag cut off by the end of input or by the next `<` is escaped too.
const TAG_PATTERN: &str = r"<\s*/?\s*([A-Za-z][A-Za-z0-9]*)[^<>]*(>)?";

/// Message content cleaner. Tags outside the allow-list, and tags that are never closed,
/// are escaped into text, then ammonia strips disallowed attributes and style properties.
pub struct HtmlSanitizer {
    cleaner: ammonia::Builder<'static>,
    tag_pattern: Regex,
}

impl HtmlSanitizer {
    pub fn new() -> Self {
        let mut cleaner = ammonia::Builder::empty();
        cleaner
            .tags(ALLOWED_TAGS.iter().copied().collect())
            .tag_attributes(HashMap::from([
                ("a", HashSet::from(["href", "title"])),
                ("abbr", HashSet::from(["title"])),
                ("acronym", HashSet::from(["title"])),
            ]))
            .generic_attributes(GENERIC_ATTRIBUTES.iter().copied().collect())
            .filter_style_properties(ALLOWED_STYLES.iter().copied().collect())
            .url_schemes(URL_SCHEMES.iter().copied().collect())
            .link_rel(None)
            .strip_comments(true);
        let tag_pattern = Regex::new(TAG_PATTERN).expect("tag pattern is valid");
        Self {
            cleaner,
            tag_pattern,
        }
    }

    pub fn clean(&self, html: &str) -> String {
        let escaped = self.tag_pattern.replace_all(html, |caps: &Captures| {
            let name = caps[1].to_ascii_lowercase();
            if caps.get(2).is_some() && ALLOWED_TAGS.contains(&name.as_str()) {
                caps[0].to_owned()
            } else {
                caps[0].replace('<', "&lt;").replace('>', "&gt;")
            }
        });
        self.cleaner.clean(&escaped).to_string()
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}
