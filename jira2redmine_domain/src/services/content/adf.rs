// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # ADF → Markdown Converter
//!
//! Walks an Atlassian Document Format tree and renders Markdown. The walk
//! uses an explicit enter/exit event stack instead of recursion so that a
//! pathological document cannot overflow the call stack.
//!
//! Nodes that wrap their children in a rendered frame (blockquotes, panels,
//! code blocks, list items, table cells) get a buffer of their own; the
//! buffer is popped and decorated on the exit event. Unknown node types are
//! transparent: their children are rendered, the wrapper is dropped.
//!
//! Mentions resolve against the user lookup (`user#{id}` for ready users,
//! display text otherwise) and media nodes emit `attachment:` tokens that
//! the reference rules finalize.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::MigrationError;

use super::RewriteContext;

static NEWLINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

enum Event<'a> {
    Enter(&'a Value),
    Exit(&'a Value),
}

struct ListFrame {
    ordered: bool,
    index: u64,
}

/// Converts an ADF document to Markdown.
pub fn adf_to_markdown(doc: &Value, ctx: &RewriteContext) -> Result<String, MigrationError> {
    if !doc.is_object() {
        return Err(MigrationError::ContentError(
            "ADF root is not a JSON object".to_string(),
        ));
    }

    let mut events: Vec<Event<'_>> = vec![Event::Enter(doc)];
    let mut buffers: Vec<String> = vec![String::new()];
    let mut lists: Vec<ListFrame> = Vec::new();

    while let Some(event) = events.pop() {
        match event {
            Event::Enter(node) => {
                let Some(obj) = node.as_object() else { continue };
                let node_type = obj.get("type").and_then(Value::as_str).unwrap_or("");

                match node_type {
                    "text" => push_str(&mut buffers, &render_text(node)),
                    "hardBreak" => push_str(&mut buffers, "\n"),
                    "rule" => push_str(&mut buffers, "---\n\n"),
                    "mention" => push_str(&mut buffers, &render_mention(node, ctx)),
                    "emoji" => push_str(&mut buffers, &render_emoji(node)),
                    "inlineCard" => {
                        if let Some(url) = node.pointer("/attrs/url").and_then(Value::as_str) {
                            push_str(&mut buffers, &format!("[{}]({})", url, url));
                        }
                    }
                    "media" => push_str(&mut buffers, &render_media(node, ctx)),
                    "heading" => {
                        let level = node
                            .pointer("/attrs/level")
                            .and_then(Value::as_u64)
                            .unwrap_or(1)
                            .clamp(1, 6) as usize;
                        push_str(&mut buffers, &format!("{} ", "#".repeat(level)));
                        events.push(Event::Exit(node));
                        push_children(&mut events, node);
                    }
                    "codeBlock" | "blockquote" | "panel" | "listItem" | "table" | "tableRow"
                    | "tableCell" | "tableHeader" => {
                        buffers.push(String::new());
                        if node_type == "listItem" {
                            if let Some(frame) = lists.last_mut() {
                                frame.index += 1;
                            }
                        }
                        events.push(Event::Exit(node));
                        push_children(&mut events, node);
                    }
                    "bulletList" => {
                        lists.push(ListFrame { ordered: false, index: 0 });
                        events.push(Event::Exit(node));
                        push_children(&mut events, node);
                    }
                    "orderedList" => {
                        let start = node.pointer("/attrs/order").and_then(Value::as_u64).unwrap_or(1);
                        lists.push(ListFrame {
                            ordered: true,
                            index: start.saturating_sub(1),
                        });
                        events.push(Event::Exit(node));
                        push_children(&mut events, node);
                    }
                    // Transparent containers and anything unknown: render the
                    // children, drop the wrapper.
                    _ => {
                        events.push(Event::Exit(node));
                        push_children(&mut events, node);
                    }
                }
            }
            Event::Exit(node) => {
                let node_type = node.get("type").and_then(Value::as_str).unwrap_or("");
                match node_type {
                    "paragraph" | "heading" | "mediaSingle" | "mediaGroup" => {
                        push_str(&mut buffers, "\n\n");
                    }
                    "codeBlock" => {
                        let content = pop_buffer(&mut buffers);
                        let language = node
                            .pointer("/attrs/language")
                            .and_then(Value::as_str)
                            .unwrap_or("");
                        push_str(
                            &mut buffers,
                            &format!("```{}\n{}\n```\n\n", language, content.trim_end()),
                        );
                    }
                    "blockquote" | "panel" => {
                        let content = pop_buffer(&mut buffers);
                        let mut quoted = String::new();
                        for line in content.trim_end().lines() {
                            if line.is_empty() {
                                quoted.push_str(">\n");
                            } else {
                                quoted.push_str("> ");
                                quoted.push_str(line);
                                quoted.push('\n');
                            }
                        }
                        quoted.push('\n');
                        push_str(&mut buffers, &quoted);
                    }
                    "listItem" => {
                        let content = pop_buffer(&mut buffers);
                        let marker = match lists.last() {
                            Some(frame) if frame.ordered => format!("{}. ", frame.index),
                            _ => "- ".to_string(),
                        };
                        let mut compact = content.trim_end().to_string();
                        while compact.contains("\n\n") {
                            compact = compact.replace("\n\n", "\n");
                        }
                        let mut rendered = String::new();
                        for (i, line) in compact.lines().enumerate() {
                            if i == 0 {
                                rendered.push_str(&marker);
                                rendered.push_str(line);
                            } else {
                                rendered.push_str("  ");
                                rendered.push_str(line);
                            }
                            rendered.push('\n');
                        }
                        if rendered.is_empty() {
                            rendered = format!("{}\n", marker.trim_end());
                        }
                        push_str(&mut buffers, &rendered);
                    }
                    "bulletList" | "orderedList" => {
                        lists.pop();
                        push_str(&mut buffers, "\n");
                    }
                    "tableCell" | "tableHeader" => {
                        let content = pop_buffer(&mut buffers);
                        let inline = content.split_whitespace().collect::<Vec<_>>().join(" ");
                        push_str(&mut buffers, &format!("{} | ", inline));
                    }
                    "tableRow" => {
                        let content = pop_buffer(&mut buffers);
                        push_str(&mut buffers, &format!("| {}\n", content.trim_end()));
                    }
                    "table" => {
                        let content = pop_buffer(&mut buffers);
                        push_str(&mut buffers, &render_table(node, &content));
                    }
                    _ => {}
                }
            }
        }
    }

    let out = buffers.pop().unwrap_or_default();
    Ok(tidy(&out))
}

/// Lossy fallback: text content with paragraph breaks, hard breaks and list
/// item boundaries preserved. Never fails.
pub fn adf_to_plain_text(doc: &Value) -> String {
    let mut events: Vec<Event<'_>> = vec![Event::Enter(doc)];
    let mut out = String::new();

    while let Some(event) = events.pop() {
        match event {
            Event::Enter(node) => {
                let Some(obj) = node.as_object() else { continue };
                match obj.get("type").and_then(Value::as_str).unwrap_or("") {
                    "text" => out.push_str(obj.get("text").and_then(Value::as_str).unwrap_or("")),
                    "hardBreak" => out.push('\n'),
                    "mention" | "emoji" => {
                        if let Some(text) = node.pointer("/attrs/text").and_then(Value::as_str) {
                            out.push_str(text);
                        }
                    }
                    "listItem" => {
                        out.push_str("- ");
                        events.push(Event::Exit(node));
                        push_children(&mut events, node);
                    }
                    "paragraph" | "heading" => {
                        events.push(Event::Exit(node));
                        push_children(&mut events, node);
                    }
                    _ => push_children(&mut events, node),
                }
            }
            Event::Exit(node) => match node.get("type").and_then(Value::as_str).unwrap_or("") {
                "paragraph" | "heading" => out.push_str("\n\n"),
                "listItem" => out.push('\n'),
                _ => {}
            },
        }
    }

    tidy(&out)
}

fn push_children<'a>(events: &mut Vec<Event<'a>>, node: &'a Value) {
    if let Some(children) = node.get("content").and_then(Value::as_array) {
        for child in children.iter().rev() {
            events.push(Event::Enter(child));
        }
    }
}

fn push_str(buffers: &mut [String], s: &str) {
    if let Some(top) = buffers.last_mut() {
        top.push_str(s);
    }
}

fn pop_buffer(buffers: &mut Vec<String>) -> String {
    buffers.pop().unwrap_or_default()
}

fn render_text(node: &Value) -> String {
    let text = node.get("text").and_then(Value::as_str).unwrap_or("");
    let mut rendered = text.to_string();
    let Some(marks) = node.get("marks").and_then(Value::as_array) else {
        return rendered;
    };

    let mut link: Option<String> = None;
    for mark in marks {
        match mark.get("type").and_then(Value::as_str).unwrap_or("") {
            "code" => rendered = format!("`{}`", rendered),
            "strong" => rendered = format!("**{}**", rendered),
            "em" => rendered = format!("*{}*", rendered),
            "strike" => rendered = format!("~~{}~~", rendered),
            "link" => {
                link = mark
                    .pointer("/attrs/href")
                    .and_then(Value::as_str)
                    .map(String::from);
            }
            _ => {}
        }
    }
    if let Some(href) = link {
        rendered = format!("[{}]({})", rendered, href);
    }
    rendered
}

fn render_mention(node: &Value, ctx: &RewriteContext) -> String {
    let account_id = node.pointer("/attrs/id").and_then(Value::as_str).unwrap_or("");
    if let Some(user_id) = ctx.users.get(account_id) {
        return format!("user#{}", user_id);
    }
    node.pointer("/attrs/text")
        .and_then(Value::as_str)
        .map(|t| t.trim_start_matches('@').to_string())
        .unwrap_or_default()
}

fn render_emoji(node: &Value) -> String {
    node.pointer("/attrs/text")
        .or_else(|| node.pointer("/attrs/shortName"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn render_media(node: &Value, ctx: &RewriteContext) -> String {
    if let Some(alt) = node.pointer("/attrs/alt").and_then(Value::as_str) {
        if !alt.is_empty() {
            return format!("attachment:{}", alt);
        }
    }
    if let Some(id) = node.pointer("/attrs/id").and_then(Value::as_str) {
        if let Some(target) = ctx.attachments.resolve_id(id) {
            return target.render();
        }
    }
    String::new()
}

fn render_table(node: &Value, content: &str) -> String {
    let lines: Vec<&str> = content.trim_end().lines().collect();
    if lines.is_empty() {
        return String::new();
    }

    let has_header = node
        .pointer("/content/0/content/0/type")
        .and_then(Value::as_str)
        .map(|t| t == "tableHeader")
        .unwrap_or(false);
    let columns = lines[0].split('|').count().saturating_sub(2);

    let mut rendered = String::new();
    rendered.push_str(lines[0]);
    rendered.push('\n');
    if has_header && columns > 0 {
        rendered.push('|');
        for _ in 0..columns {
            rendered.push_str(" --- |");
        }
        rendered.push('\n');
    }
    for line in &lines[1..] {
        rendered.push_str(line);
        rendered.push('\n');
    }
    rendered.push('\n');
    rendered
}

fn tidy(out: &str) -> String {
    let collapsed = NEWLINE_RUNS.replace_all(out, "\n\n");
    collapsed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> RewriteContext {
        let mut ctx = RewriteContext::default();
        ctx.users.insert("acc-1".to_string(), 42);
        ctx
    }

    fn doc(content: Value) -> Value {
        json!({"type": "doc", "version": 1, "content": content})
    }

    #[test]
    fn test_paragraphs_and_marks() {
        let adf = doc(json!([
            {"type": "paragraph", "content": [
                {"type": "text", "text": "plain "},
                {"type": "text", "text": "bold", "marks": [{"type": "strong"}]},
                {"type": "text", "text": " and "},
                {"type": "text", "text": "code", "marks": [{"type": "code"}]}
            ]},
            {"type": "paragraph", "content": [{"type": "text", "text": "second"}]}
        ]));
        assert_eq!(
            adf_to_markdown(&adf, &ctx()).unwrap(),
            "plain **bold** and `code`\n\nsecond"
        );
    }

    #[test]
    fn test_heading_levels() {
        let adf = doc(json!([
            {"type": "heading", "attrs": {"level": 2}, "content": [{"type": "text", "text": "Title"}]}
        ]));
        assert_eq!(adf_to_markdown(&adf, &ctx()).unwrap(), "## Title");
    }

    #[test]
    fn test_link_mark() {
        let adf = doc(json!([
            {"type": "paragraph", "content": [
                {"type": "text", "text": "docs", "marks": [
                    {"type": "link", "attrs": {"href": "https://example.com/a"}}
                ]}
            ]}
        ]));
        assert_eq!(adf_to_markdown(&adf, &ctx()).unwrap(), "[docs](https://example.com/a)");
    }

    #[test]
    fn test_bullet_and_ordered_lists() {
        let adf = doc(json!([
            {"type": "bulletList", "content": [
                {"type": "listItem", "content": [
                    {"type": "paragraph", "content": [{"type": "text", "text": "one"}]}
                ]},
                {"type": "listItem", "content": [
                    {"type": "paragraph", "content": [{"type": "text", "text": "two"}]}
                ]}
            ]},
            {"type": "orderedList", "content": [
                {"type": "listItem", "content": [
                    {"type": "paragraph", "content": [{"type": "text", "text": "first"}]}
                ]},
                {"type": "listItem", "content": [
                    {"type": "paragraph", "content": [{"type": "text", "text": "second"}]}
                ]}
            ]}
        ]));
        assert_eq!(
            adf_to_markdown(&adf, &ctx()).unwrap(),
            "- one\n- two\n\n1. first\n2. second"
        );
    }

    #[test]
    fn test_nested_list_is_indented() {
        let adf = doc(json!([
            {"type": "bulletList", "content": [
                {"type": "listItem", "content": [
                    {"type": "paragraph", "content": [{"type": "text", "text": "outer"}]},
                    {"type": "bulletList", "content": [
                        {"type": "listItem", "content": [
                            {"type": "paragraph", "content": [{"type": "text", "text": "inner"}]}
                        ]}
                    ]}
                ]}
            ]}
        ]));
        assert_eq!(adf_to_markdown(&adf, &ctx()).unwrap(), "- outer\n  - inner");
    }

    #[test]
    fn test_code_block_with_language() {
        let adf = doc(json!([
            {"type": "codeBlock", "attrs": {"language": "rust"}, "content": [
                {"type": "text", "text": "fn main() {}"}
            ]}
        ]));
        assert_eq!(
            adf_to_markdown(&adf, &ctx()).unwrap(),
            "```rust\nfn main() {}\n```"
        );
    }

    #[test]
    fn test_blockquote() {
        let adf = doc(json!([
            {"type": "blockquote", "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "quoted"}]}
            ]}
        ]));
        assert_eq!(adf_to_markdown(&adf, &ctx()).unwrap(), "> quoted");
    }

    #[test]
    fn test_mention_resolution() {
        let adf = doc(json!([
            {"type": "paragraph", "content": [
                {"type": "mention", "attrs": {"id": "acc-1", "text": "@Alice"}},
                {"type": "text", "text": " and "},
                {"type": "mention", "attrs": {"id": "acc-unknown", "text": "@Bob"}}
            ]}
        ]));
        assert_eq!(adf_to_markdown(&adf, &ctx()).unwrap(), "user#42 and Bob");
    }

    #[test]
    fn test_table_rendering() {
        let adf = doc(json!([
            {"type": "table", "content": [
                {"type": "tableRow", "content": [
                    {"type": "tableHeader", "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "A"}]}
                    ]},
                    {"type": "tableHeader", "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "B"}]}
                    ]}
                ]},
                {"type": "tableRow", "content": [
                    {"type": "tableCell", "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "1"}]}
                    ]},
                    {"type": "tableCell", "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "2"}]}
                    ]}
                ]}
            ]}
        ]));
        assert_eq!(
            adf_to_markdown(&adf, &ctx()).unwrap(),
            "| A | B |\n| --- | --- |\n| 1 | 2 |"
        );
    }

    #[test]
    fn test_hard_break_and_rule() {
        let adf = doc(json!([
            {"type": "paragraph", "content": [
                {"type": "text", "text": "a"},
                {"type": "hardBreak"},
                {"type": "text", "text": "b"}
            ]},
            {"type": "rule"}
        ]));
        assert_eq!(adf_to_markdown(&adf, &ctx()).unwrap(), "a\nb\n\n---");
    }

    #[test]
    fn test_unknown_nodes_are_transparent() {
        let adf = doc(json!([
            {"type": "somethingNew", "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "inside"}]}
            ]}
        ]));
        assert_eq!(adf_to_markdown(&adf, &ctx()).unwrap(), "inside");
    }

    #[test]
    fn test_deeply_nested_document_does_not_overflow() {
        // 4000 nested blockquotes would blow a recursive converter off the
        // stack; the event walk handles it.
        let mut node = json!({"type": "paragraph", "content": [{"type": "text", "text": "deep"}]});
        for _ in 0..4000 {
            node = json!({"type": "blockquote", "content": [node]});
        }
        let adf = doc(json!([node]));
        let rendered = adf_to_markdown(&adf, &ctx()).unwrap();
        assert!(rendered.contains("deep"));
    }

    #[test]
    fn test_non_object_root_is_an_error() {
        assert!(adf_to_markdown(&json!("not a doc"), &ctx()).is_err());
    }

    #[test]
    fn test_plain_text_flattening() {
        let adf = doc(json!([
            {"type": "paragraph", "content": [{"type": "text", "text": "one"}]},
            {"type": "bulletList", "content": [
                {"type": "listItem", "content": [
                    {"type": "paragraph", "content": [{"type": "text", "text": "item"}]}
                ]}
            ]}
        ]));
        assert_eq!(adf_to_plain_text(&adf), "one\n\n- item");
    }
}
