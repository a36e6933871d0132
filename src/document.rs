//! Atlassian Document Format (ADF) trees.
//!
//! Jira Cloud returns long-text fields (descriptions, comment bodies) as a
//! typed tree of content nodes rather than plain strings. This module
//! models the tree, builds the single-paragraph form the SDK submits, and
//! renders a tree back to readable plain text.

use serde::{Deserialize, Serialize};

/// An ADF document: the root of a content tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub version: u32,
    #[serde(default)]
    pub content: Vec<Node>,
}

/// One node in an ADF content tree.
///
/// Container nodes (paragraph, heading, lists, ...) carry children in
/// `content`; leaf `text` nodes carry the actual characters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Node {
    /// A leaf text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            node_type: "text".to_string(),
            content: Vec::new(),
            text: Some(text.into()),
        }
    }

    /// A paragraph wrapping the given children.
    pub fn paragraph(content: Vec<Node>) -> Self {
        Self {
            node_type: "paragraph".to_string(),
            content,
            text: None,
        }
    }
}

impl Document {
    /// Build the single-paragraph document used for descriptions and
    /// comment bodies.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            doc_type: "doc".to_string(),
            version: 1,
            content: vec![Node::paragraph(vec![Node::text(text)])],
        }
    }

    /// Render the document to plain text with a depth-first walk.
    ///
    /// Headings are prefixed with `# `, list items with `• `, blockquotes
    /// with `> `, and code blocks are fenced. Unknown node types render
    /// their children unchanged.
    #[must_use]
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        for node in &self.content {
            render_node(node, &mut out, 0);
        }
        out.trim().to_string()
    }
}

fn render_node(node: &Node, out: &mut String, indent: usize) {
    let pad = "  ".repeat(indent);

    match node.node_type.to_ascii_lowercase().as_str() {
        "paragraph" => {
            if !node.content.is_empty() {
                for child in &node.content {
                    render_node(child, out, indent);
                }
                out.push('\n');
            }
        }
        "text" => {
            if let Some(text) = &node.text {
                out.push_str(&pad);
                out.push_str(text);
            }
        }
        "heading" => {
            if !node.content.is_empty() {
                out.push_str(&pad);
                out.push_str("# ");
                for child in &node.content {
                    render_node(child, out, 0);
                }
                out.push_str("\n\n");
            }
        }
        "bulletlist" | "orderedlist" => {
            if !node.content.is_empty() {
                for item in &node.content {
                    render_node(item, out, indent);
                }
                out.push('\n');
            }
        }
        "listitem" => {
            out.push_str(&pad);
            out.push_str("• ");
            for child in &node.content {
                render_node(child, out, 0);
            }
            out.push('\n');
        }
        "codeblock" => {
            out.push_str(&pad);
            out.push_str("```\n");
            for child in &node.content {
                render_node(child, out, indent + 1);
            }
            out.push('\n');
            out.push_str(&pad);
            out.push_str("```\n");
        }
        "blockquote" => {
            out.push_str(&pad);
            out.push_str("> ");
            for child in &node.content {
                render_node(child, out, 0);
            }
            out.push('\n');
        }
        _ => {
            if !node.content.is_empty() {
                for child in &node.content {
                    render_node(child, out, indent);
                }
            } else if let Some(text) = &node.text {
                out.push_str(&pad);
                out.push_str(text);
            }
        }
    }
}

/// A long-text field the server may return as an ADF document, a plain
/// string (older API versions), or some other shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Body {
    Document(Document),
    Text(String),
    Other(serde_json::Value),
}

impl Body {
    /// Render the body as plain text regardless of its wire shape.
    #[must_use]
    pub fn to_plain_text(&self) -> String {
        match self {
            Body::Document(document) => document.to_plain_text(),
            Body::Text(text) => text.clone(),
            Body::Other(value) => value.to_string(),
        }
    }
}
