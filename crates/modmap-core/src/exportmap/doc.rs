//! Documentation comments attached to exports.

use crate::config::DocStyle;
use serde::Serialize;
use swc_common::comments::{Comment, CommentKind};

/// One `@tag` of a doc comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocTag {
    pub title: String,
    pub description: String,
}

/// Parsed documentation comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct DocSummary {
    pub description: String,
    pub tags: Vec<DocTag>,
}

impl DocSummary {
    /// Whether a `@deprecated` (or tomdoc `Deprecated:`) tag is present.
    #[must_use]
    pub fn is_deprecated(&self) -> bool {
        self.has_tag("deprecated")
    }

    #[must_use]
    pub fn has_tag(&self, title: &str) -> bool {
        self.tags.iter().any(|t| t.title == title)
    }

    /// Description of the first tag named `title`.
    #[must_use]
    pub fn tag(&self, title: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.title == title)
            .map(|t| t.description.as_str())
    }
}

/// Pick a doc from the comments leading a node, trying each style in order.
#[must_use]
pub fn capture_doc(leading: &[Comment], styles: &[DocStyle]) -> Option<DocSummary> {
    styles.iter().find_map(|style| match style {
        DocStyle::Jsdoc => capture_jsdoc(leading),
        DocStyle::Tomdoc => capture_tomdoc(leading),
    })
}

/// The last `/** ... */` block.
fn capture_jsdoc(leading: &[Comment]) -> Option<DocSummary> {
    leading
        .iter()
        .rev()
        .find(|c| c.kind == CommentKind::Block && c.text.starts_with('*'))
        .map(|c| parse_jsdoc(&c.text))
}

/// Trailing run of line comments reading `Public: ...`, `Internal: ...`
/// or `Deprecated: ...`.
fn capture_tomdoc(leading: &[Comment]) -> Option<DocSummary> {
    let run: Vec<&str> = leading
        .iter()
        .rev()
        .take_while(|c| c.kind == CommentKind::Line)
        .map(|c| c.text.trim())
        .collect();
    if run.is_empty() {
        return None;
    }
    let text = run.into_iter().rev().collect::<Vec<_>>().join("\n");

    ["Public", "Internal", "Deprecated"].iter().find_map(|kind| {
        let rest = text.strip_prefix(kind)?.strip_prefix(':')?;
        let description = rest.trim().to_string();
        if description.is_empty() {
            return None;
        }
        Some(DocSummary {
            description: description.clone(),
            tags: vec![DocTag {
                title: kind.to_ascii_lowercase(),
                description,
            }],
        })
    })
}

/// Parse the body of a `/** ... */` comment (without the delimiters).
#[must_use]
pub fn parse_jsdoc(text: &str) -> DocSummary {
    let mut doc = DocSummary::default();
    let mut description_lines = Vec::new();

    for raw in text.lines() {
        let line = raw.trim_start();
        let line = line.strip_prefix('*').unwrap_or(line);
        let line = line.strip_prefix(' ').unwrap_or(line).trim_end();

        if let Some(tag) = line.strip_prefix('@') {
            let (title, rest) = tag.split_once(char::is_whitespace).unwrap_or((tag, ""));
            doc.tags.push(DocTag {
                title: title.to_string(),
                description: rest.trim().to_string(),
            });
        } else if let Some(last) = doc.tags.last_mut() {
            if !line.is_empty() {
                if !last.description.is_empty() {
                    last.description.push(' ');
                }
                last.description.push_str(line.trim());
            }
        } else {
            description_lines.push(line);
        }
    }

    doc.description = description_lines.join("\n").trim().to_string();
    doc
}
