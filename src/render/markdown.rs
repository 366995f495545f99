use anyhow::Result;
use regex::Regex;

use super::escape_html;

/// Converts the small Markdown subset a narrative may use into HTML.
///
/// Input is escaped first, so only the markup produced here reaches the
/// document: paragraphs, `-`/`*` bullets, `#`..`###` headings, `**bold**`
/// and `[text](http...)` links.
pub struct NarrativeMarkdown {
    bold: Regex,
    link: Regex,
}

enum Block {
    Paragraph(Vec<String>),
    List(Vec<String>),
}

impl NarrativeMarkdown {
    pub fn new() -> Result<Self> {
        Ok(Self {
            bold: Regex::new(r"\*\*([^*]+?)\*\*")?,
            link: Regex::new(r"\[([^\]\[]+)\]\((https?://[^\s()]+)\)")?,
        })
    }

    pub fn to_html(&self, text: &str) -> String {
        let mut html = String::new();
        let mut block: Option<Block> = None;

        for raw in text.lines() {
            let line = raw.trim();

            if line.is_empty() {
                flush(&mut html, block.take());
                continue;
            }

            if let Some((level, heading)) = heading(line) {
                flush(&mut html, block.take());
                let tag = if level <= 2 { "h3" } else { "h4" };
                html.push_str(&format!("<{tag}>{}</{tag}>\n", self.inline(heading)));
                continue;
            }

            if let Some(item) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
                let item = self.inline(item.trim());
                match block.as_mut() {
                    Some(Block::List(items)) => items.push(item),
                    _ => {
                        flush(&mut html, block.take());
                        block = Some(Block::List(vec![item]));
                    }
                }
                continue;
            }

            let content = self.inline(line);
            match block.as_mut() {
                Some(Block::Paragraph(lines)) => lines.push(content),
                _ => {
                    flush(&mut html, block.take());
                    block = Some(Block::Paragraph(vec![content]));
                }
            }
        }

        flush(&mut html, block.take());
        html
    }

    fn inline(&self, text: &str) -> String {
        let escaped = escape_html(text);
        let mut html = String::with_capacity(escaped.len());
        let mut last = 0;

        // Bold applies to text and link labels, never inside an href.
        for caps in self.link.captures_iter(&escaped) {
            let (Some(whole), Some(label), Some(url)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            html.push_str(&self.emphasize(&escaped[last..whole.start()]));
            html.push_str(&format!(
                r#"<a href="{}">{}</a>"#,
                url.as_str(),
                self.emphasize(label.as_str())
            ));
            last = whole.end();
        }
        html.push_str(&self.emphasize(&escaped[last..]));
        html
    }

    fn emphasize(&self, text: &str) -> String {
        self.bold
            .replace_all(text, "<strong>$1</strong>")
            .into_owned()
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if !(1..=3).contains(&level) {
        return None;
    }
    line[level..]
        .strip_prefix(' ')
        .map(|rest| (level, rest.trim()))
}

fn flush(html: &mut String, block: Option<Block>) {
    match block {
        Some(Block::Paragraph(lines)) => {
            html.push_str(&format!("<p>{}</p>\n", lines.join("<br>\n")));
        }
        Some(Block::List(items)) => {
            html.push_str("<ul>\n");
            for item in items {
                html.push_str(&format!("<li>{}</li>\n", item));
            }
            html.push_str("</ul>\n");
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(text: &str) -> String {
        NarrativeMarkdown::new().unwrap().to_html(text)
    }

    #[test]
    fn test_paragraphs_and_line_breaks() {
        assert_eq!(
            md("First line\nsecond line\n\nNext paragraph"),
            "<p>First line<br>\nsecond line</p>\n<p>Next paragraph</p>\n"
        );
    }

    #[test]
    fn test_headings_bullets_and_bold() {
        let html = md("## Priorities\n- **Footballco**: £2.2M ARR\n- Instacart\nClosing note");
        assert_eq!(
            html,
            "<h3>Priorities</h3>\n<ul>\n<li><strong>Footballco</strong>: £2.2M ARR</li>\n<li>Instacart</li>\n</ul>\n<p>Closing note</p>\n"
        );
    }

    #[test]
    fn test_markup_in_text_is_escaped() {
        let html = md("Watch <script>alert('x')</script> & **<b>bold</b>**");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&amp;"));
        assert!(html.contains("<strong>&lt;b&gt;bold&lt;/b&gt;</strong>"));
    }

    #[test]
    fn test_only_http_links_become_anchors() {
        let html = md("[notes](https://notes.example.com/a?b=1&c=2) and [bad](javascript:alert(1))");
        assert!(html.contains(r#"<a href="https://notes.example.com/a?b=1&amp;c=2">notes</a>"#));
        assert!(!html.contains("javascript:alert(1)\""));
        assert!(html.contains("[bad](javascript:alert(1))"));
    }

    #[test]
    fn test_bold_markers_inside_urls_are_left_alone() {
        assert_eq!(
            md("[a](https://x/**y**)"),
            "<p><a href=\"https://x/**y**\">a</a></p>\n"
        );
        assert_eq!(
            md("**Urgent**: see [**Q3** plan](https://p.example.com)"),
            "<p><strong>Urgent</strong>: see <a href=\"https://p.example.com\"><strong>Q3</strong> plan</a></p>\n"
        );
    }

    #[test]
    fn test_hash_without_space_is_text() {
        assert_eq!(md("#hashtag"), "<p>#hashtag</p>\n");
        assert_eq!(md("#### deep"), "<p>#### deep</p>\n");
    }
}
