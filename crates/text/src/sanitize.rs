//! Text cleanup applied before synthesis

use once_cell::sync::Lazy;
use regex::Regex;

static THINKING_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

static EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "[\
        \u{1F600}-\u{1F64F}\
        \u{1F300}-\u{1F5FF}\
        \u{1F680}-\u{1F6FF}\
        \u{1F1E0}-\u{1F1FF}\
        \u{2702}-\u{27B0}\
        \u{24C2}-\u{1F251}\
        ]+",
    )
    .unwrap()
});

static EMPHASIS_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*[^*]*\*").unwrap());

/// Strip content that should not be spoken aloud
///
/// Removes, in order: thinking spans, emoji, and `*emphasis*` spans (stage
/// directions like `*smiles*`). Returns the trimmed remainder, which may be
/// empty.
pub fn sanitize_for_speech(text: &str) -> String {
    let text = THINKING_SPAN.replace_all(text, "");
    let text = EMOJI.replace_all(&text, "");
    let text = EMPHASIS_SPAN.replace_all(&text, "");
    text.trim().to_string()
}
