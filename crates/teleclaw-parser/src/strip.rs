//! Quote and signature stripping.
//!
//! Mail clients append the conversation history below the reply; the
//! stripper keeps body lines until the first quote boundary or signature
//! delimiter. Boundaries cover the English and Chinese forms the outbound
//! template is known to round-trip through.

/// Literal markers a client inserts above quoted history.
const ORIGINAL_MESSAGE_MARKERS: &[&str] =
    &["-----Original Message-----", "--- Original Message ---"];

/// Returns `true` when `line` (already trimmed) starts quoted history.
fn is_quote_boundary(line: &str) -> bool {
    if line.starts_with('>') {
        return true;
    }
    if ORIGINAL_MESSAGE_MARKERS.contains(&line) {
        return true;
    }
    // English date-line: "On <date>, <sender> wrote:"
    if line.ends_with("wrote:") {
        return true;
    }
    // Chinese date-line: "在 <date>，<sender> 写道:"
    if line.starts_with('在') && (line.ends_with("写道:") || line.ends_with("写道：")) {
        return true;
    }
    // The outbound template's own marker — anything below it is our text.
    if line.starts_with("Session ID:") {
        return true;
    }
    false
}

/// Returns `true` when `line` (already trimmed) starts a signature block.
fn is_signature_delimiter(line: &str) -> bool {
    line == "--" || line.starts_with("Sent from") || line.starts_with("发自我的")
}

/// Keep body lines until the first quote boundary or signature delimiter,
/// then trim the result. Linear scan; no HTML parsing — the outbound
/// template is plain text.
pub fn extract_command_body(body: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for raw in body.lines() {
        let line = raw.trim();
        if is_quote_boundary(line) || is_signature_delimiter(line) {
            break;
        }
        kept.push(raw);
    }
    kept.join("\n").trim().to_string()
}
