use std::panic;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_MARKERS: [&str; 6] = [
    "token",
    "bearer",
    "authorization",
    "password",
    "secret",
    "apikey",
];

/// Drops every whitespace-separated chunk that looks like a credential.
/// A marker word also hides the chunk that follows it (`Bearer <token>`).
pub fn redact_text(input: &str) -> String {
    let mut hide_next = false;

    input
        .split_whitespace()
        .map(|chunk| {
            let lowered = chunk.to_ascii_lowercase();
            let marked = SENSITIVE_MARKERS
                .iter()
                .any(|marker| lowered.contains(marker));

            let redact = hide_next || marked || looks_like_secret_value(chunk);
            hide_next = marked && !chunk.contains('=') && !chunk.contains(':');

            if redact {
                REDACTED.to_owned()
            } else {
                chunk.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn install_panic_redaction_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic payload omitted".to_owned());

        let scrubbed = redact_text(&payload);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "support-chat panic: {} at {}:{}:{}",
                scrubbed,
                location.file(),
                location.line(),
                location.column()
            );
        } else {
            eprintln!("support-chat panic: {}", scrubbed);
        }
    }));
}

/// Long mixed alphanumeric runs (JWT segments, API keys).
fn looks_like_secret_value(value: &str) -> bool {
    let cleaned = value.trim_matches(|ch: char| !ch.is_ascii_alphanumeric());

    let has_mixed = cleaned.chars().any(|ch| ch.is_ascii_alphabetic())
        && cleaned.chars().any(|ch| ch.is_ascii_digit());

    cleaned.len() >= 20
        && has_mixed
        && cleaned
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'))
}
