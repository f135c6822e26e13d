
use std::sync::OnceLock;

use fancy_regex::Regex;
use pulldown_cmark::{Event, Options, Parser as MarkdownParser, TagEnd};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Marker opening a frontmatter comment at the top of a course document.
const FRONTMATTER_OPEN: &str = "[//]: # (";

/// Slug assigned to units that appear before any `##` heading.
pub const IMPLICIT_NANO_SLUG: &str = "general";
const IMPLICIT_NANO_TITLE: &str = "General";

/// A fully parsed course document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCourse {
    pub title: Option<String>,
    pub frontmatter: Option<serde_json::Value>,
    pub nanos: Vec<Nano>,
}

/// A second-level topic grouping (`##` heading) and its units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nano {
    pub slug: String,
    pub title: String,
    pub units: Vec<Unit>,
}

/// A third-level teaching item (`###` heading), the unit of chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub slug: String,
    pub title: String,
    /// Kept markdown lines joined with single newlines (blank lines dropped).
    pub content: String,
    /// Markdown-stripped visible text; this is what gets chunked and embedded.
    pub content_plain: String,
    pub assets: Vec<AssetRef>,
}

/// A non-text resource referenced within a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub url: String,
    pub kind: AssetKind,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Audio,
    Other,
}

impl AssetKind {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match *self {
            AssetKind::Image => "image",
            AssetKind::Audio => "audio",
            AssetKind::Other => "other",
        }
    }

    #[inline]
    pub fn from_str_or_other(value: &str) -> Self {
        match value {
            "image" => AssetKind::Image,
            "audio" => AssetKind::Audio,
            _ => AssetKind::Other,
        }
    }

    /// Infer the asset kind from a URL's file extension.
    fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let extension = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
        match extension.as_str() {
            "mp3" | "wav" | "ogg" => AssetKind::Audio,
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" => AssetKind::Image,
            _ => AssetKind::Other,
        }
    }
}

fn inline_image_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"!\[([^\]]*)\]\(([^)\s]+)\)").expect("inline image regex is valid")
    })
}

/// Derive a URL-safe slug from a heading title: lowercase, keep only
/// `[a-z0-9\s-]`, collapse whitespace runs to single hyphens, collapse
/// repeated hyphens, and trim leading/trailing hyphens.
#[inline]
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let filtered: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();

    let mut slug = String::with_capacity(filtered.len());
    let mut last_was_hyphen = false;
    for ch in filtered.chars() {
        if ch.is_whitespace() || ch == '-' {
            if !last_was_hyphen {
                slug.push('-');
                last_was_hyphen = true;
            }
        } else {
            slug.push(ch);
            last_was_hyphen = false;
        }
    }

    slug.trim_matches('-').to_string()
}

/// Accumulator for the unit currently being scanned.
struct OpenUnit {
    slug: String,
    title: String,
    lines: Vec<String>,
    assets: Vec<AssetRef>,
}

impl OpenUnit {
    fn new(title: &str) -> Self {
        Self {
            slug: slugify(title),
            title: title.to_string(),
            lines: Vec::new(),
            assets: Vec::new(),
        }
    }

    fn finish(self) -> Unit {
        let content = self.lines.join("\n");
        let content_plain = strip_markdown(&content);
        Unit {
            slug: self.slug,
            title: self.title,
            content,
            content_plain,
            assets: self.assets,
        }
    }
}

struct OpenNano {
    slug: String,
    title: String,
    units: Vec<Unit>,
}

impl OpenNano {
    fn new(slug: String, title: String) -> Self {
        Self {
            slug,
            title,
            units: Vec::new(),
        }
    }

    fn finish(self) -> Nano {
        Nano {
            slug: self.slug,
            title: self.title,
            units: self.units,
        }
    }
}

/// Parse a course markdown document into its nano/unit tree.
///
/// Single left-to-right scan. Never fails: malformed frontmatter degrades
/// to `None` with a warning, and a unit heading with no enclosing nano is
/// assigned to a synthesized implicit nano rather than rejected.
#[inline]
pub fn parse(markdown: &str) -> ParsedCourse {
    let mut title: Option<String> = None;
    let mut frontmatter: Option<serde_json::Value> = None;
    let mut nanos: Vec<Nano> = Vec::new();
    let mut current_nano: Option<OpenNano> = None;
    let mut current_unit: Option<OpenUnit> = None;

    // Frontmatter accumulation state: Some while inside the comment.
    let mut frontmatter_buffer: Option<String> = None;

    for line in markdown.lines() {
        if let Some(buffer) = frontmatter_buffer.as_mut() {
            if let Some(end) = line.rfind(')') {
                buffer.push_str(&line[..end]);
                frontmatter = parse_frontmatter(buffer);
                frontmatter_buffer = None;
            } else {
                buffer.push_str(line);
                buffer.push('\n');
            }
            continue;
        }

        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix(FRONTMATTER_OPEN) {
            if let Some(end) = rest.rfind(')') {
                frontmatter = parse_frontmatter(&rest[..end]);
            } else {
                let mut buffer = String::from(rest);
                buffer.push('\n');
                frontmatter_buffer = Some(buffer);
            }
            continue;
        }

        if let Some(heading) = heading_text(line, "## ") {
            if let Some(unit) = current_unit.take() {
                if let Some(nano) = current_nano.as_mut() {
                    nano.units.push(unit.finish());
                }
            }
            if let Some(nano) = current_nano.take() {
                nanos.push(nano.finish());
            }
            current_nano = Some(OpenNano::new(slugify(heading), heading.to_string()));
            continue;
        }

        if let Some(heading) = heading_text(line, "### ") {
            if let Some(unit) = current_unit.take() {
                if let Some(nano) = current_nano.as_mut() {
                    nano.units.push(unit.finish());
                }
            }
            if current_nano.is_none() {
                // Unit before any nano: synthesize an implicit grouping
                // instead of propagating a dangling reference.
                warn!("unit heading {:?} appears before any nano heading", heading);
                current_nano = Some(OpenNano::new(
                    IMPLICIT_NANO_SLUG.to_string(),
                    IMPLICIT_NANO_TITLE.to_string(),
                ));
            }
            current_unit = Some(OpenUnit::new(heading));
            continue;
        }

        if let Some(heading) = heading_text(line, "# ") {
            if title.is_none() {
                title = Some(heading.to_string());
                continue;
            }
            // Later top-level headings fall through as regular content.
        }

        if trimmed.is_empty() {
            continue;
        }

        let Some(unit) = current_unit.as_mut() else {
            // Content outside any unit has no owner; the accumulators reset
            // at the next unit heading anyway.
            continue;
        };

        if let Some(url) = bare_asset_url(trimmed) {
            unit.assets.push(AssetRef {
                url: url.to_string(),
                kind: AssetKind::from_url(url),
                alt: None,
            });
            continue;
        }

        for capture in inline_image_regex().captures_iter(trimmed).flatten() {
            let alt = capture.get(1).map(|m| m.as_str()).unwrap_or("");
            let Some(url) = capture.get(2).map(|m| m.as_str()) else {
                continue;
            };
            unit.assets.push(AssetRef {
                url: url.to_string(),
                kind: AssetKind::Image,
                alt: if alt.is_empty() {
                    None
                } else {
                    Some(alt.to_string())
                },
            });
        }

        unit.lines.push(line.to_string());
    }

    if let Some(unit) = current_unit.take() {
        if let Some(nano) = current_nano.as_mut() {
            nano.units.push(unit.finish());
        }
    }
    if let Some(nano) = current_nano.take() {
        nanos.push(nano.finish());
    }

    ParsedCourse {
        title,
        frontmatter,
        nanos,
    }
}

fn parse_frontmatter(raw: &str) -> Option<serde_json::Value> {
    match serde_json::from_str(raw.trim()) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("ignoring malformed frontmatter JSON: {}", err);
            None
        }
    }
}

/// Heading text for an exact level prefix: `## ` matches but `### ` does
/// not match the `## ` prefix check (`###` starts with `##` followed by
/// another `#`, not a space).
fn heading_text<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(prefix)?;
    Some(rest.trim())
}

/// A line that is nothing but a URL with one of the accepted schemes and no
/// embedded whitespace. A URL followed by prose is deliberately not an
/// asset line.
fn bare_asset_url(trimmed: &str) -> Option<&str> {
    let has_scheme = trimmed.starts_with("http://")
        || trimmed.starts_with("https://")
        || trimmed.starts_with("//");
    if has_scheme && !trimmed.contains(char::is_whitespace) {
        Some(trimmed)
    } else {
        None
    }
}

/// Reduce markdown to its visible text: images become their alt text,
/// links their link text; emphasis/code markers and blockquote/list
/// markers are dropped. Lines are trimmed, blanks removed, and the result
/// joined with single newlines.
#[inline]
pub fn strip_markdown(markdown: &str) -> String {
    let parser = MarkdownParser::new_ext(markdown, Options::empty());
    let mut text = String::with_capacity(markdown.len());

    for event in parser {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Item) | Event::End(TagEnd::Heading(_)) => {
                if !text.ends_with('\n') {
                    text.push('\n');
                }
            }
            _ => {}
        }
    }

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines.join("\n")
}
