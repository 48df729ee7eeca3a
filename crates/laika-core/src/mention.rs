// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `@(email)` mention syntax used in comment and reply content.

use std::sync::LazyLock;

use regex::Regex;

static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\(([^)\s]+)\)").unwrap());

/// E-mails mentioned in `content`, lower-cased, in first-seen order, without
/// duplicates.
pub fn parse_mentions(content: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for cap in MENTION_RE.captures_iter(content) {
        let email = cap[1].trim().to_lowercase();
        if !email.is_empty() && !out.contains(&email) {
            out.push(email);
        }
    }
    out
}

/// Replace every `@(email)` with `@Display Name` where `lookup` knows the
/// e-mail. Unknown e-mails are left as written.
pub fn rewrite_mentions<F>(content: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    MENTION_RE
        .replace_all(content, |cap: &regex::Captures<'_>| {
            match lookup(&cap[1].trim().to_lowercase()) {
                Some(name) => format!("@{name}"),
                None => cap[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_and_dedups() {
        let found = parse_mentions("Hi @(a@x.com) and @(B@x.com), again @(a@x.com)");
        assert_eq!(found, vec!["a@x.com".to_string(), "b@x.com".to_string()]);
    }

    #[test]
    fn ignores_bare_at_signs() {
        assert!(parse_mentions("mail me @ a@x.com or @()").is_empty());
    }

    #[test]
    fn rewrite_keeps_unknown_emails() {
        let out = rewrite_mentions("Hi @(a@x.com) and @(z@x.com)", |email| {
            (email == "a@x.com").then(|| "A Name".to_string())
        });
        assert_eq!(out, "Hi @A Name and @(z@x.com)");
    }

    proptest! {
        #[test]
        fn content_without_mentions_is_untouched(s in "[a-zA-Z0-9 .,!?]{0,64}") {
            prop_assert!(parse_mentions(&s).is_empty());
            prop_assert_eq!(rewrite_mentions(&s, |_| Some("X".into())), s);
        }
    }
}
