// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Reference Rewrite Rules
//!
//! Post-processing applied to converted Markdown, in this order:
//!
//! 1. Attachment references: Markdown images/links and bare URLs pointing at
//!    `/rest/api/{v}/attachment/content/{id}` or `/secure/attachment/{id}`,
//!    plus `attachment:` tokens. They become the SharePoint link, the Redmine
//!    `attachment:{unique_filename}` token, or the bare unique filename.
//! 2. User profile links become `user#{redmine_user_id}` for ready users;
//!    unknown accounts keep their display text.
//! 3. Issue keys, plain or inside `/browse/{KEY}` / `?selectedIssue={KEY}`
//!    links, become `#{redmine_issue_id}` when the issue is mapped.
//! 4. Jira avatar images are removed.
//! 5. Whitespace around `#123` / `user#123` cross-references is normalized
//!    so Redmine parses them as links.
//!
//! Every rule leaves unmatched text untouched, so content without Jira
//! tokens passes through unchanged.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::RewriteContext;

static MD_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(([^()\s]+)\)").unwrap());
static ATTACHMENT_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:/rest/api/\d+/attachment/content/|/secure/attachment/)(\d+)").unwrap());
static BARE_ATTACHMENT_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://[^\s()<>]*(?:/rest/api/\d+/attachment/content/|/secure/attachment/)(\d+)[^\s()<>]*")
        .unwrap()
});
static ATTACHMENT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"attachment:([^\s\)\]]+)").unwrap());
static PROFILE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:/jira/people/|ViewProfile\.jspa\?accountId=)([0-9A-Za-z:_%-]+)").unwrap()
});
static BROWSE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://[^\s()<>]*(?:/browse/|[?&]selectedIssue=)([A-Z][A-Z0-9_]*-\d+)[^\s()<>]*").unwrap()
});
static ISSUE_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z][A-Z0-9_]*-\d+)\b").unwrap());
static AVATAR_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^()\s]*avatar[^()\s]*\)").unwrap());
static XREF: Lazy<Regex> = Lazy::new(|| Regex::new(r"user#[0-9]+|#[0-9]+").unwrap());

/// Applies rules 1-5 to converted Markdown.
pub fn apply_reference_rules(markdown: &str, ctx: &RewriteContext) -> String {
    let text = rewrite_attachments(markdown, ctx);
    let text = rewrite_users(&text, ctx);
    let text = rewrite_issue_keys(&text, ctx);
    let text = remove_avatars(&text);
    normalize_xrefs(&text)
}

fn rewrite_attachments(text: &str, ctx: &RewriteContext) -> String {
    // Markdown images and links whose URL points at a Jira attachment.
    let step1 = MD_LINK.replace_all(text, |caps: &Captures<'_>| {
        let url = &caps[3];
        match ATTACHMENT_URL
            .captures(url)
            .and_then(|m| ctx.attachments.resolve_id(&m[1]))
        {
            Some(target) => target.render(),
            None => caps[0].to_string(),
        }
    });

    // Bare attachment URLs outside Markdown syntax.
    let step2 = BARE_ATTACHMENT_URL.replace_all(&step1, |caps: &Captures<'_>| {
        match ctx.attachments.resolve_id(&caps[1]) {
            Some(target) => target.render(),
            None => caps[0].to_string(),
        }
    });

    // attachment:<name> tokens, e.g. emitted by the ADF media renderer.
    // Rendering a token that is already final reproduces it byte for byte.
    ATTACHMENT_TOKEN
        .replace_all(&step2, |caps: &Captures<'_>| {
            match ctx.attachments.resolve_name(&caps[1]) {
                Some(target) => target.render(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn rewrite_users(text: &str, ctx: &RewriteContext) -> String {
    // Profile links carry their display text; unknown accounts keep it.
    let step1 = MD_LINK.replace_all(text, |caps: &Captures<'_>| {
        let label = &caps[2];
        let url = &caps[3];
        match PROFILE_URL.captures(url) {
            Some(m) => match ctx.users.get(&m[1]) {
                Some(user_id) => format!("user#{}", user_id),
                None => label.to_string(),
            },
            None => caps[0].to_string(),
        }
    });

    // Bare profile URLs have no display text to fall back to; rewrite only
    // the ones that resolve.
    PROFILE_URL
        .replace_all(&step1, |caps: &Captures<'_>| match ctx.users.get(&caps[1]) {
            Some(user_id) => format!("user#{}", user_id),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn rewrite_issue_keys(text: &str, ctx: &RewriteContext) -> String {
    // Browse links (as Markdown links) collapse to the cross-reference.
    let step1 = MD_LINK.replace_all(text, |caps: &Captures<'_>| {
        let url = &caps[3];
        match BROWSE_URL.captures(url).and_then(|m| ctx.issues.get(&m[1])) {
            Some(issue_id) => format!("#{}", issue_id),
            None => caps[0].to_string(),
        }
    });

    // Bare browse / selectedIssue URLs.
    let step2 = BROWSE_URL.replace_all(&step1, |caps: &Captures<'_>| {
        match ctx.issues.get(&caps[1]) {
            Some(issue_id) => format!("#{}", issue_id),
            None => caps[0].to_string(),
        }
    });

    // Plain-text keys. Only mapped issues are rewritten, so keys inside
    // URLs that were left alone above stay intact.
    ISSUE_KEY
        .replace_all(&step2, |caps: &Captures<'_>| match ctx.issues.get(&caps[1]) {
            Some(issue_id) => format!("#{}", issue_id),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn remove_avatars(text: &str) -> String {
    AVATAR_IMAGE.replace_all(text, "").into_owned()
}

fn normalize_xrefs(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for m in XREF.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        let needs_space_before = text[..m.start()]
            .chars()
            .next_back()
            .map(|c| !c.is_whitespace() && c != '(' && c != '[')
            .unwrap_or(false);
        if needs_space_before {
            out.push(' ');
        }
        out.push_str(m.as_str());
        let needs_space_after = text[m.end()..]
            .chars()
            .next()
            .map(|c| c.is_alphanumeric() || c == '#')
            .unwrap_or(false);
        if needs_space_after {
            out.push(' ');
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::content::{AttachmentIndex, AttachmentTarget};

    fn ctx() -> RewriteContext {
        let mut attachments = AttachmentIndex::new();
        attachments.insert(
            "100",
            "shot.png",
            AttachmentTarget::Token {
                unique_filename: "100__shot.png".into(),
            },
        );
        attachments.insert(
            "200",
            "big.zip",
            AttachmentTarget::SharePoint {
                unique_filename: "200__big.zip".into(),
                url: "https://sp.example.com/big.zip".into(),
            },
        );
        attachments.insert(
            "300",
            "plain.txt",
            AttachmentTarget::NameOnly {
                unique_filename: "300__plain.txt".into(),
            },
        );

        let mut ctx = RewriteContext {
            attachments,
            ..Default::default()
        };
        ctx.users.insert("557058:aaaa".to_string(), 42);
        ctx.issues.insert("PROJ-1".to_string(), 123);
        ctx
    }

    #[test]
    fn test_markdown_image_becomes_token() {
        let out = apply_reference_rules(
            "![shot](https://x.atlassian.net/rest/api/3/attachment/content/100)",
            &ctx(),
        );
        assert_eq!(out, "attachment:100__shot.png");
    }

    #[test]
    fn test_secure_attachment_link_becomes_sharepoint_link() {
        let out = apply_reference_rules(
            "[big.zip](https://x.atlassian.net/secure/attachment/200/big.zip)",
            &ctx(),
        );
        assert_eq!(out, "[200__big.zip](https://sp.example.com/big.zip)");
    }

    #[test]
    fn test_unuploaded_attachment_leaves_name_text() {
        let out = apply_reference_rules(
            "see [plain.txt](https://x.atlassian.net/secure/attachment/300/plain.txt)",
            &ctx(),
        );
        assert_eq!(out, "see 300__plain.txt");
    }

    #[test]
    fn test_bare_attachment_url_is_rewritten() {
        let out = apply_reference_rules(
            "download https://x.atlassian.net/rest/api/3/attachment/content/100 now",
            &ctx(),
        );
        assert_eq!(out, "download attachment:100__shot.png now");
    }

    #[test]
    fn test_attachment_token_by_original_name() {
        let out = apply_reference_rules("attachment:shot.png", &ctx());
        assert_eq!(out, "attachment:100__shot.png");
    }

    #[test]
    fn test_unknown_attachment_is_untouched() {
        let text = "![x](https://x.atlassian.net/secure/attachment/999/x.png)";
        assert_eq!(apply_reference_rules(text, &ctx()), text);
    }

    #[test]
    fn test_profile_link_becomes_user_xref() {
        let out = apply_reference_rules(
            "[Alice](https://x.atlassian.net/jira/people/557058:aaaa)",
            &ctx(),
        );
        assert_eq!(out, "user#42");
    }

    #[test]
    fn test_unknown_profile_link_keeps_display_text() {
        let out = apply_reference_rules(
            "ping [Bob](https://x.atlassian.net/jira/people/557058:bbbb)",
            &ctx(),
        );
        assert_eq!(out, "ping Bob");
    }

    #[test]
    fn test_view_profile_jspa_variant() {
        let out = apply_reference_rules(
            "[Alice](https://x.example.com/secure/ViewProfile.jspa?accountId=557058:aaaa)",
            &ctx(),
        );
        assert_eq!(out, "user#42");
    }

    #[test]
    fn test_mapped_issue_key_plain_text() {
        assert_eq!(apply_reference_rules("fixes PROJ-1.", &ctx()), "fixes #123.");
    }

    #[test]
    fn test_unmapped_issue_key_is_left() {
        assert_eq!(apply_reference_rules("see OTHER-9", &ctx()), "see OTHER-9");
    }

    #[test]
    fn test_browse_link_collapses() {
        let out = apply_reference_rules(
            "[PROJ-1](https://x.atlassian.net/browse/PROJ-1) and https://x.atlassian.net/browse/PROJ-1",
            &ctx(),
        );
        assert_eq!(out, "#123 and #123");
    }

    #[test]
    fn test_selected_issue_query_parameter() {
        let out = apply_reference_rules(
            "https://x.atlassian.net/jira/software/projects/P/boards/1?selectedIssue=PROJ-1",
            &ctx(),
        );
        assert_eq!(out, "#123");
    }

    #[test]
    fn test_unmapped_browse_url_is_untouched() {
        let text = "https://x.atlassian.net/browse/OTHER-9";
        assert_eq!(apply_reference_rules(text, &ctx()), text);
    }

    #[test]
    fn test_avatar_images_are_removed() {
        let out = apply_reference_rules(
            "before ![](https://x.atlassian.net/universal_avatar/view/type/project/avatar/1?size=48) after",
            &ctx(),
        );
        assert_eq!(out, "before  after");
    }

    #[test]
    fn test_xref_whitespace_normalization() {
        assert_eq!(normalize_xrefs("see:#123next"), "see: #123 next");
        assert_eq!(normalize_xrefs("done(user#42)"), "done(user#42)");
        assert_eq!(normalize_xrefs("x#1"), "x #1");
        // A user xref never gets split between "user" and "#".
        assert_eq!(normalize_xrefs("user#42"), "user#42");
    }

    #[test]
    fn test_token_free_text_is_unchanged() {
        let text = "nothing to rewrite here, just *markdown*.";
        assert_eq!(apply_reference_rules(text, &ctx()), text);
    }
}
