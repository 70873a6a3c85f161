use ammonia::Builder;
use comrak::{markdown_to_html, Options};
use std::collections::HashSet;

/// Render post/comment Markdown to sanitized HTML.
///
/// comrak handles GFM parsing; ammonia strips anything that could run script.
pub fn render_markdown(raw: &str) -> String {
    sanitize_html(&markdown_to_html(raw, &markdown_options()))
}

/// Plain-text preview for list views, cut at `max_chars` characters.
pub fn excerpt(raw: &str, max_chars: usize) -> String {
    let html = markdown_to_html(raw, &markdown_options());
    let text = Builder::empty().clean(&html).to_string();
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

fn markdown_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.render.unsafe_ = true; // ammonia sanitizes afterwards
    options
}

fn sanitize_html(html: &str) -> String {
    let extra_tags: HashSet<&str> = [
        "h1", "h2", "h3", "h4", "h5", "h6", "pre", "code", "blockquote", "hr", "table", "thead",
        "tbody", "tr", "th", "td", "img", "input", "del", "s", "sup", "sub",
    ]
    .into_iter()
    .collect();

    let url_schemes: HashSet<&str> = ["http", "https", "mailto"].into_iter().collect();

    let mut builder = Builder::default();
    builder
        .add_tags(&extra_tags)
        .add_tag_attributes("a", &["href", "title"])
        .add_tag_attributes("img", &["src", "alt", "title"])
        .add_tag_attributes("code", &["class"])
        .add_tag_attributes("input", &["type", "checked", "disabled"])
        .url_schemes(url_schemes)
        .link_rel(Some("noopener noreferrer"));

    builder.clean(html).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_basic_markdown() {
        let html = render_markdown("# 公告\n\nThis is **bold**.");
        assert!(html.contains("<h1>公告</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
    }

    #[test]
    fn strips_script_and_handlers() {
        let html = render_markdown("<script>alert('xss')</script><img src=x onerror=alert(1)>");
        assert!(!html.contains("<script>"));
        assert!(!html.contains("onerror"));
    }

    #[test]
    fn strips_javascript_links() {
        let html = render_markdown("[click](javascript:alert(1))");
        assert!(!html.contains("javascript:"));
    }

    #[test]
    fn excerpt_is_plain_text() {
        assert_eq!(excerpt("**Exam** notes\n\n- one", 100), "Exam notes one");
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let out = excerpt("数据结构复习资料", 4);
        assert_eq!(out, "数据结构…");
    }
}
