//! Prompt classification.
//!
//! A pure function over the captured pane tail — the confirmation loop's
//! whole decision surface, kept free of I/O so it unit-tests with canned
//! strings. The same captured tail always yields the same class.

/// What the pane tail is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptClass {
    /// "Do you want to proceed?" with numbered options, including a
    /// "don't ask again" variant.
    MultiOptionConsent,
    /// A single highlighted "1. Yes" option.
    SingleOptionConsent,
    /// A bare y/n question.
    YesNo,
    /// "Press Enter to continue" and friends.
    PressEnter,
    /// The assistant is computing; no input wanted.
    Working,
    /// A fresh input prompt — the command is done.
    Idle,
    /// The assistant printed an error.
    AssistantError,
    /// Nothing recognizable; wait and re-capture.
    Unknown,
}

const WORKING_MARKERS: &[&str] = &["Clauding…", "Waiting…", "Processing…", "Working…"];
const YES_NO_MARKERS: &[&str] = &["(y/n)", "[Y/n]", "[y/N]"];
const PRESS_ENTER_MARKERS: &[&str] = &["Press Enter to continue", "Enter to confirm", "Press Enter"];

/// Classify the pane tail. Checks run in precedence order: consent prompts
/// outrank the working indicator, which outranks the idle prompt, which
/// outranks error text (a completed command may legitimately mention
/// "error" in scrollback above a fresh prompt — but a prompt below error
/// text still wants an answer).
pub fn classify(tail: &str) -> PromptClass {
    let has_options = tail.contains("1. Yes") || tail.contains("2. Yes, and don't ask again");
    if tail.contains("Do you want to proceed?") && has_options {
        return PromptClass::MultiOptionConsent;
    }

    if tail.contains("❯ 1. Yes") || tail.contains("▷ 1. Yes") {
        return PromptClass::SingleOptionConsent;
    }

    if YES_NO_MARKERS.iter().any(|m| tail.contains(m)) {
        return PromptClass::YesNo;
    }

    if PRESS_ENTER_MARKERS.iter().any(|m| tail.contains(m)) {
        return PromptClass::PressEnter;
    }

    if WORKING_MARKERS.iter().any(|m| tail.contains(m)) {
        return PromptClass::Working;
    }

    if tail.contains("│ >") || tail.trim_end().ends_with('>') {
        return PromptClass::Idle;
    }

    if tail.contains("Error:") || tail.contains("error:") || tail.contains("failed") {
        return PromptClass::AssistantError;
    }

    PromptClass::Unknown
}
