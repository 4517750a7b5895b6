use unicode_width::UnicodeWidthChar;

/// Maximum display width of a conversation list preview line.
const PREVIEW_MAX_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: i64,
    pub counterparty_id: i64,
    pub counterparty_display_name: String,
    pub last_message_preview: Option<String>,
    pub last_message_at_ms: Option<i64>,
    /// Unread messages from the opposite role, as reported by the server.
    pub unread_count: u32,
}

impl Conversation {
    /// Returns the preview clipped to a single list row.
    pub fn preview_line(&self) -> String {
        self.last_message_preview
            .as_deref()
            .map(|preview| clip_to_width(first_line(preview), PREVIEW_MAX_WIDTH))
            .unwrap_or_default()
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

fn clip_to_width(text: &str, max_width: usize) -> String {
    let total: usize = text.chars().map(|ch| ch.width().unwrap_or(0)).sum();
    if total <= max_width {
        return text.to_owned();
    }

    let mut width = 0;
    let mut out = String::new();

    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > max_width.saturating_sub(1) {
            out.push('…');
            return out;
        }
        width += ch_width;
        out.push(ch);
    }

    out
}
