//! Token extraction from subjects, body lines, and chat command forms.

use std::sync::LazyLock;

use regex::Regex;

/// Bracketed subject tag: `[Name #TOKEN]`. The product name is 4–32 word
/// characters or hyphens; the token is exactly 8 alphanumerics, any case.
static SUBJECT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[A-Za-z0-9_-]{4,32}\s+#([A-Za-z0-9]{8})\]").unwrap()
});

/// Leading `Token XXXXXXXX` line, case-insensitive keyword.
static BODY_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*token\s+([A-Za-z0-9]{8})\b").unwrap());

/// Extract the token from an email subject tag, normalized to upper case.
pub fn from_subject(subject: &str) -> Option<String> {
    SUBJECT_TAG
        .captures(subject)
        .map(|c| c[1].to_ascii_uppercase())
}

/// Extract a token from a body whose first non-empty line leads with
/// `Token XXXXXXXX`. Returns the token and the remaining command text (the
/// rest of that line joined with all following lines).
pub fn from_leading_body_line(body: &str) -> Option<(String, String)> {
    let mut lines = body.lines();
    let first = loop {
        match lines.next() {
            Some(l) if l.trim().is_empty() => continue,
            Some(l) => break l,
            None => return None,
        }
    };

    let caps = BODY_TOKEN.captures(first)?;
    let token = caps.get(1)?.as_str().to_ascii_uppercase();
    let tail_of_first = first[caps.get(0)?.end()..].trim_start();

    let mut rest = String::from(tail_of_first);
    for line in lines {
        if !rest.is_empty() {
            rest.push('\n');
        }
        rest.push_str(line);
    }
    Some((token, rest))
}

/// Split a chat message in `/cmd TOKEN <command>` or `Token TOKEN <command>`
/// form. Returns the token and the remaining intent text.
pub fn from_chat_command(text: &str) -> Option<(String, String)> {
    let trimmed = text.trim_start();
    let mut words = trimmed.splitn(3, char::is_whitespace);
    let keyword = words.next()?;
    if !is_command_keyword(keyword) {
        return None;
    }

    let candidate = words.next()?;
    if candidate.len() != 8 || !candidate.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }

    let rest = words.next().unwrap_or("").to_string();
    Some((candidate.to_ascii_uppercase(), rest))
}

/// Does the message at least lead with a command keyword? Distinguishes a
/// malformed token (`UnknownTokenFormat`) from ordinary chatter (`NoToken`).
pub fn is_chat_command_form(text: &str) -> bool {
    text.trim_start()
        .split_whitespace()
        .next()
        .is_some_and(is_command_keyword)
}

fn is_command_keyword(word: &str) -> bool {
    word.eq_ignore_ascii_case("/cmd") || word.eq_ignore_ascii_case("token")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_tag_extracts_token() {
        assert_eq!(
            from_subject("Re: [Teleclaw #A1B2C3D4] build finished"),
            Some("A1B2C3D4".to_string())
        );
    }

    #[test]
    fn subject_tag_allows_hyphenated_product() {
        assert_eq!(
            from_subject("[my-relay_2 #ZZZZ9999]"),
            Some("ZZZZ9999".to_string())
        );
    }

    #[test]
    fn subject_without_tag_is_none() {
        assert_eq!(from_subject("Re: build finished"), None);
        // Token must be exactly 8 characters.
        assert_eq!(from_subject("[Teleclaw #ABC]"), None);
        // Product name shorter than 4 characters does not match.
        assert_eq!(from_subject("[ab #ABCDEFGH]"), None);
    }

    #[test]
    fn leading_body_line_skips_blank_lines() {
        let (tok, rest) = from_leading_body_line("\n\nToken ABCD1234 do it\nnow").unwrap();
        assert_eq!(tok, "ABCD1234");
        assert_eq!(rest, "do it\nnow");
    }

    #[test]
    fn body_line_not_leading_is_none() {
        assert!(from_leading_body_line("hello\nToken ABCD1234").is_none());
    }

    #[test]
    fn chat_rejects_wrong_token_length() {
        assert!(from_chat_command("/cmd ABC hello").is_none());
        assert!(from_chat_command("/cmd ABCDEFGHI hello").is_none());
    }

    #[test]
    fn chat_keyword_is_case_insensitive() {
        assert!(from_chat_command("TOKEN abcd1234 go").is_some());
        assert!(from_chat_command("/CMD abcd1234 go").is_some());
    }
}
