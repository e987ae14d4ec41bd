use anyhow::Result;

use crate::error::PipelineError;

pub mod enhancer;
pub mod metadata;
pub mod remote;

pub use enhancer::{ContentEnhancer, EnhancedContent, LlmContentEnhancer};
pub use metadata::{LlmMetadataSynthesizer, MetadataSynthesizer, SynthesizedMetadata};

/// Core trait for chat-completion providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a system instruction + user message
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;
}

/// Request structure for LLM generation
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Wrap a provider failure (HTTP, status, timeout) with its full context chain.
pub(crate) fn provider_failure(err: anyhow::Error) -> PipelineError {
    PipelineError::Llm(format!("{:#}", err))
}

/// Helper to extract JSON from text that might contain markdown backticks or preamble
pub fn extract_json_from_text(text: &str) -> Option<String> {
    // 1. Try to find content between ```json and ```
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 2. Try to find content between ``` and ```
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 3. Try to find the first '{' and last '}'
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return Some(text[start..=end].to_string());
        }
    }

    None
}

/// Best-effort repair of near-valid JSON returned by a model.
///
/// Handles code fences and preamble, smart and single quotes, trailing commas,
/// raw newlines inside strings, and missing or extra closing braces/brackets.
/// Outside strings, `//` and `/* */` comments are dropped, bare keys are quoted,
/// `True`/`False`/`None` style literals become JSON ones and other bare words
/// become strings.
/// Anything after the first complete top-level value is dropped.
/// Returns `None` when no object or array start is found at all.
pub fn repair_json(text: &str) -> Option<String> {
    let fenced = extract_fenced(text).unwrap_or(text);
    let start = fenced.find(|c: char| c == '{' || c == '[')?;
    let src = &fenced[start..];

    let mut out = String::with_capacity(src.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    // Delimiter that closes the current string, if inside one
    let mut in_string: Option<char> = None;
    let mut chars = src.chars();

    while let Some(c) = chars.next() {
        if let Some(close) = in_string {
            match c {
                '\\' => match chars.next() {
                    Some('\'') => out.push('\''),
                    Some(next) => {
                        out.push('\\');
                        out.push(next);
                    }
                    None => {}
                },
                c if c == close => {
                    out.push('"');
                    in_string = None;
                }
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                '\r' => {}
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_string = Some('"');
                out.push('"');
            }
            '\'' => {
                in_string = Some('\'');
                out.push('"');
            }
            '\u{201C}' | '\u{201D}' => {
                in_string = Some('\u{201D}');
                out.push('"');
            }
            '{' => {
                stack.push('}');
                out.push(c);
            }
            '[' => {
                stack.push(']');
                out.push(c);
            }
            '}' | ']' => {
                // Unmatched closers are dropped; missing inner closers are inserted.
                if stack.contains(&c) {
                    while let Some(top) = stack.pop() {
                        drop_trailing_comma(&mut out);
                        out.push(top);
                        if top == c {
                            break;
                        }
                    }
                    if stack.is_empty() {
                        break;
                    }
                }
            }
            '/' if matches!(chars.clone().next(), Some('/') | Some('*')) => skip_comment(&mut chars),
            // Exponent letters stay part of their number.
            c if is_word_start(c) && !out.ends_with(|p: char| p.is_ascii_digit() || p == '.') => {
                let mut word = String::from(c);
                while let Some(next) = chars.clone().next().filter(|n| is_word_char(*n)) {
                    word.push(next);
                    chars.next();
                }
                let is_key = chars.clone().find(|n| !n.is_whitespace()) == Some(':');
                out.push_str(&bare_word(&word, is_key));
            }
            _ => out.push(c),
        }
    }

    if in_string.is_some() {
        out.push('"');
    }
    while let Some(top) = stack.pop() {
        drop_trailing_comma(&mut out);
        out.push(top);
    }

    Some(out)
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn bare_word(word: &str, is_key: bool) -> String {
    if is_key {
        return format!("\"{}\"", word);
    }
    match word {
        "true" | "True" | "TRUE" => "true".to_string(),
        "false" | "False" | "FALSE" => "false".to_string(),
        "null" | "None" | "NULL" | "undefined" | "NaN" => "null".to_string(),
        _ => format!("\"{}\"", word),
    }
}

/// Consumes a comment whose leading `/` was already read.
fn skip_comment(chars: &mut std::str::Chars<'_>) {
    match chars.next() {
        Some('/') => {
            for c in chars.by_ref() {
                if c == '\n' {
                    break;
                }
            }
        }
        Some('*') => {
            let mut prev = '\0';
            for c in chars.by_ref() {
                if prev == '*' && c == '/' {
                    break;
                }
                prev = c;
            }
        }
        _ => {}
    }
}

fn extract_fenced(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let rest = &text[start + 3..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    match rest.find("```") {
        Some(end) => Some(&rest[..end]),
        None => Some(rest),
    }
}

fn drop_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}
