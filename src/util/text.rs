use std::borrow::Cow;

/// Collapses runs of whitespace (including newlines from markup indentation)
/// into single spaces and trims both ends.
///
/// Scraped element text carries the formatting whitespace of the page source;
/// titles and categories are single-line values in the feed.
///
/// # Examples
///
/// ```
/// use gadio_feed::util::collapse_whitespace;
///
/// assert_eq!(collapse_whitespace("\n    Hello\n    World  "), "Hello World");
/// ```
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Removes characters that are not allowed anywhere in an XML 1.0 document.
///
/// XML 1.0 permits tab, newline, carriage return, and code points from
/// U+0020 upward except the surrogate block (which Rust strings cannot hold)
/// and U+FFFE/U+FFFF. Anything else, mostly C0 control characters pasted
/// into show notes, would make the whole feed unparseable.
///
/// Returns `Cow::Borrowed` when nothing needs removing (the common case).
pub fn strip_invalid_xml_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| !is_xml_char(c)) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| is_xml_char(c)).collect())
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}
