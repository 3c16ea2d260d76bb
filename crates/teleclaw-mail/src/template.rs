//! Plain-text notification template.
//!
//! The subject carries the bracketed token tag and the body ends with the
//! `Session ID:` line; the reply parser treats that line as a hard boundary,
//! so everything a client quotes below it is stripped.

use teleclaw_core::types::NotificationPayload;

/// Render the outbound notification for a finished/idle assistant.
pub fn render_notification(
    product: &str,
    token: &str,
    session_id: &str,
    project: &str,
    pane: &str,
    status_line: &str,
) -> NotificationPayload {
    let subject = format!("[{product} #{token}] {project}");
    let body = format!(
        "{status_line}\n\
         \n\
         Project: {project}\n\
         Pane: {pane}\n\
         \n\
         Reply to this message with your next command.\n\
         If your reply drops the subject, start it with: Token {token}\n\
         \n\
         Session ID: {session_id}\n"
    );

    NotificationPayload {
        subject,
        body,
        token: token.to_string(),
        session_id: session_id.to_string(),
        project: project.to_string(),
        actions: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> NotificationPayload {
        render_notification(
            "Teleclaw",
            "ABCDEFGH",
            "0a1b2c3d-1111-4e5f-8888-123456789abc",
            "my-project",
            "claw-main",
            "The assistant is idle and waiting for input.",
        )
    }

    #[test]
    fn subject_carries_the_token_tag() {
        assert_eq!(payload().subject, "[Teleclaw #ABCDEFGH] my-project");
    }

    #[test]
    fn body_carries_the_session_id_line() {
        let p = payload();
        assert!(p
            .body
            .contains("Session ID: 0a1b2c3d-1111-4e5f-8888-123456789abc"));
    }

    #[test]
    fn body_hints_the_token_fallback_form() {
        assert!(payload().body.contains("Token ABCDEFGH"));
    }

    // The template must survive its own parser: a straight reply above the
    // quoted notification yields exactly the command.
    #[test]
    fn rendered_body_quotes_cleanly() {
        let p = payload();
        let reply = format!("fix the tests\n\n> {}", p.body.replace('\n', "\n> "));
        let parsed = teleclaw_parser::parse_email(&format!("Re: {}", p.subject), &reply).unwrap();
        assert_eq!(parsed.token, "ABCDEFGH");
        assert_eq!(parsed.command, "fix the tests");
    }
}
