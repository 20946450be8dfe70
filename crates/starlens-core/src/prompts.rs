//! Prompt text sent to the model endpoints, and parsing of the labelled
//! profile that comes back.

use crate::types::UNKNOWN;

/// Instruction sent alongside the image to the vision model.
pub const IDENTIFY_PROMPT: &str = "You are a celebrity recognition expert AI. \n\
Identify the person in the image. If known, respond in this format:\n\
\n\
- **Full Name**:\n\
- **Profession**:\n\
- **Nationality**:\n\
- **Famous For**:\n\
- **Top Achievements**:\n\
\n\
If unknown, return \"Unknown\".\n";

/// Line label (lowercased) that carries the name in an identification profile.
const NAME_LABEL: &str = "- **full name**:";

/// Render the question-answering prompt.
///
/// `name` and `question` are substituted verbatim. The identification profile
/// is deliberately not part of the prompt: answers come from the model's own
/// knowledge of `name`.
pub fn render_qa_prompt(name: &str, question: &str) -> String {
    format!(
        "\nYou are an AI assistant with extensive knowledge about celebrities.\n\
         You must answer questions about {name} concisely and accurately.\n\
         \n\
         Question: {question}\n"
    )
}

/// Pull the full name out of a labelled identification profile.
///
/// Scans for the first line starting (case-insensitively) with
/// `- **Full Name**:` and returns the text between the label's colon and the
/// next colon on that line, trimmed. Lines break on `\n`, `\r` or `\r\n`.
/// Returns `"Unknown"` when no such line exists.
pub fn extract_name(profile_text: &str) -> String {
    profile_text
        .split(['\n', '\r'])
        .find(|line| starts_with_ignore_ascii_case(line, NAME_LABEL))
        .map(|line| line.split(':').nth(1).unwrap_or_default().trim().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn starts_with_ignore_ascii_case(line: &str, prefix: &str) -> bool {
    line.as_bytes()
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()))
}
