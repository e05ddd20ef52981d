//! Presentation fields derived from a thread's latest visible message.
//!
//! These helpers are pure: the caller supplies the message, the current
//! instant and the offset the viewer's clock runs in.

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::entity::Message;

pub const HIDDEN_PLACEHOLDER: &str = r#"<span style="visibility: hidden">NULL</span>"#;
pub const IMAGE_PLACEHOLDER: &str = r#"<span style="font-style: italic;">Image</span>"#;

/// Keycaps, the legacy BMP symbol blocks and the supplementary emoji planes,
/// each optionally followed by a variation selector.
static EMOJI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"([0-9#]\x{20E3})",
        r"|[\x{00ae}\x{00a9}\x{203C}\x{2047}\x{2048}\x{2049}\x{3030}\x{303D}\x{2139}\x{2122}\x{3297}\x{3299}][\x{FE00}-\x{FEFF}]?",
        r"|[\x{2190}-\x{21FF}][\x{FE00}-\x{FEFF}]?",
        r"|[\x{2300}-\x{23FF}][\x{FE00}-\x{FEFF}]?",
        r"|[\x{2460}-\x{24FF}][\x{FE00}-\x{FEFF}]?",
        r"|[\x{25A0}-\x{25FF}][\x{FE00}-\x{FEFF}]?",
        r"|[\x{2600}-\x{27BF}][\x{FE00}-\x{FEFF}]?",
        r"|[\x{2900}-\x{297F}][\x{FE00}-\x{FEFF}]?",
        r"|[\x{2B00}-\x{2BF0}][\x{FE00}-\x{FEFF}]?",
        r"|[\x{1F000}-\x{1F6FF}][\x{FE00}-\x{FEFF}]?",
    ))
    .unwrap()
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Removes markup tags after turning `&nbsp;` into plain spaces.
pub fn clean_text(input: &str) -> String {
    let spaced = input.replace("&nbsp;", " ");
    TAG_RE.replace_all(&spaced, "").into_owned()
}

fn italic(text: &str) -> String {
    format!(r#"<span style="font-style: italic;">{}</span>"#, text)
}

/// Preview line for the thread list.
pub fn last_message_text(last: Option<&Message>, deleted_sentinel: &str) -> String {
    let Some(msg) = last else {
        return HIDDEN_PLACEHOLDER.to_string();
    };

    if msg.body.is_empty() {
        let has_attachment = msg.attachment.as_deref().is_some_and(|a| !a.is_empty());
        if has_attachment {
            IMAGE_PLACEHOLDER.to_string()
        } else {
            italic(&clean_text(msg.file_name.as_deref().unwrap_or("")))
        }
    } else if msg.body == deleted_sentinel {
        italic(&clean_text(&msg.body))
    } else {
        format!("<span>{}</span>", clean_text(&msg.body))
    }
}

/// True only when the body is made of emoji and nothing else.
pub fn is_emoji_only(body: &str) -> bool {
    if !EMOJI_RE.is_match(body) {
        return false;
    }
    EMOJI_RE.replace_all(body, "").is_empty()
}

/// `HH:MM` for anything at or after today's midnight, `DD/MM/YYYY HH:MM` before it.
pub fn display_time(at: &DateTime<Utc>, now: &DateTime<Utc>, offset: &FixedOffset) -> String {
    let local_at = at.with_timezone(offset);
    let midnight = now
        .with_timezone(offset)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default();

    if local_at.naive_local() < midnight {
        local_at.format("%d/%m/%Y %H:%M").to_string()
    } else {
        local_at.format("%H:%M").to_string()
    }
}

/// Configured offset, or the server's own when none is set.
pub fn resolve_offset(utc_offset_seconds: Option<i32>) -> FixedOffset {
    match utc_offset_seconds {
        Some(secs) => FixedOffset::east_opt(secs).unwrap_or_else(|| Utc.fix()),
        None => Local::now().offset().fix(),
    }
}
