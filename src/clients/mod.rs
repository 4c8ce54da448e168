pub mod anidb;
pub mod anilist;
pub mod jikan;
pub mod omdb;
pub mod tmdb;
pub mod tvmaze;

use regex::Regex;
use std::sync::OnceLock;

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("static pattern"))
}

/// Strip markup from a provider synopsis: drop tags, decode entities,
/// collapse whitespace. Returns `None` when nothing readable remains.
pub(crate) fn strip_html(raw: &str) -> Option<String> {
    let without_tags = tag_pattern().replace_all(raw, " ");
    let decoded = html_escape::decode_html_entities(&without_tags);
    let cleaned = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

/// Replace a credential with a placeholder anywhere it appears in an error
/// string. AniDB and OMDb both carry credentials in request URLs, which
/// reqwest errors echo back.
pub(crate) fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        text.to_string()
    } else {
        text.replace(secret, "[redacted]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_removes_tags_and_entities() {
        let raw = "<p><b>Winter</b> is coming &amp; so is war.</p>";
        assert_eq!(
            strip_html(raw).as_deref(),
            Some("Winter is coming & so is war.")
        );
    }

    #[test]
    fn strip_html_collapses_whitespace() {
        let raw = "Line one.<br>\n  Line two.";
        assert_eq!(strip_html(raw).as_deref(), Some("Line one. Line two."));
    }

    #[test]
    fn strip_html_of_pure_markup_is_none() {
        assert_eq!(strip_html("<p><br/></p>"), None);
    }

    #[test]
    fn redact_hides_credentials() {
        let message = "request to http://api.example/?apikey=sekret123 failed";
        assert_eq!(
            redact(message, "sekret123"),
            "request to http://api.example/?apikey=[redacted] failed"
        );
        assert_eq!(redact(message, ""), message);
    }
}
