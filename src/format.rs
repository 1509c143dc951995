use std::sync::LazyLock;

use regex::Regex;

// Citation markers the assistant appends, e.g. 【4:0†source】
static CITATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"【.*?】").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());

/// Strip citation markers and convert Markdown bold to WhatsApp's `*bold*`.
pub fn process_text_for_whatsapp(text: &str) -> String {
    let text = CITATION.replace_all(text, "");
    BOLD.replace_all(text.trim(), "*${1}*").into_owned()
}
