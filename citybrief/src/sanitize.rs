//! Removal of model "reasoning" leakage from generated text.
//!
//! This is a best-effort textual filter, not a semantic guarantee: it removes
//! tagged think blocks and spans opened by a known lead-in phrase, so reasoning
//! phrased in a way the pattern list does not know passes through untouched.
//! Extend the lists through `[sanitizer]` in the config rather than here.
//!
//! Passes, in order (all case-insensitive):
//! 1. drop every `<tag>...</tag>` span for each configured think tag
//! 2. drop every span from a lead-in phrase up to the next paragraph break,
//!    heading marker, list marker, numbered item, or end of text
//! 3. collapse three or more consecutive newlines into one blank line
//! 4. trim
//!
//! Passes 1 and 2 repeat, together, until nothing matches, which makes
//! `clean` idempotent.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_THINK_TAGS: &[&str] = &["think", "thinking"];

pub const DEFAULT_LEAD_IN_PHRASES: &[&str] = &[
    "let me think about",
    "let me think",
    "based on the above",
    "first, i need to",
    "i will organize this",
    "now let me draft",
    "让我想想",
    "让我思考一下",
    "让我来分析",
    "根据以上信息",
    "基于以上信息",
    "基于天气和新闻",
    "现在构思具体内容",
    "我会把这些内容组织成",
    "首先，我需要",
    "首先我需要",
];

/// Where a lead-in span stops (exclusive): blank line, `#`, bullet or numbered item.
static SPAN_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\n[ \t]*\n|#|\n[ \t]*(?:[-*•+][ \t]|\d+[.、)）])").expect("span end regex")
});

static EXTRA_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("blank line regex"));

#[derive(Debug, Clone)]
pub struct ResponseSanitizer {
    think_blocks: Option<Regex>,
    lead_ins: Option<Regex>,
}

impl Default for ResponseSanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_THINK_TAGS, DEFAULT_LEAD_IN_PHRASES).expect("default sanitizer patterns")
    }
}

impl ResponseSanitizer {
    /// Build from tag names (without angle brackets) and literal lead-in phrases.
    /// Blank entries are ignored.
    pub fn new<T, P>(think_tags: &[T], lead_in_phrases: &[P]) -> Result<Self>
    where
        T: AsRef<str>,
        P: AsRef<str>,
    {
        let blocks: Vec<String> = think_tags
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .map(|t| {
                let t = regex::escape(t);
                format!(r"<\s*{t}\s*>.*?<\s*/\s*{t}\s*>")
            })
            .collect();
        let phrases: Vec<String> = lead_in_phrases
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .map(regex::escape)
            .collect();

        let think_blocks = if blocks.is_empty() {
            None
        } else {
            Some(
                Regex::new(&format!("(?is){}", blocks.join("|")))
                    .context("invalid think tag pattern")?,
            )
        };
        let lead_ins = if phrases.is_empty() {
            None
        } else {
            Some(
                Regex::new(&format!("(?i){}", phrases.join("|")))
                    .context("invalid lead-in phrase pattern")?,
            )
        };

        Ok(Self {
            think_blocks,
            lead_ins,
        })
    }

    /// Empty lists in the config fall back to the built-in defaults.
    pub fn from_config(cfg: Option<&common::SanitizerConfig>) -> Result<Self> {
        let tags: Vec<String> = match cfg {
            Some(c) if !c.think_tags.is_empty() => c.think_tags.clone(),
            _ => DEFAULT_THINK_TAGS.iter().map(|s| s.to_string()).collect(),
        };
        let phrases: Vec<String> = match cfg {
            Some(c) if !c.lead_in_phrases.is_empty() => c.lead_in_phrases.clone(),
            _ => DEFAULT_LEAD_IN_PHRASES.iter().map(|s| s.to_string()).collect(),
        };
        Self::new(&tags, &phrases)
    }

    pub fn clean(&self, text: &str) -> String {
        let mut text = text.to_string();

        // Dropping a lead-in span can splice a new think block together.
        loop {
            let before = text.len();
            self.strip_think_blocks(&mut text);
            self.strip_lead_ins(&mut text);
            if text.len() == before {
                break;
            }
        }

        EXTRA_BLANK_LINES
            .replace_all(&text, "\n\n")
            .trim()
            .to_string()
    }

    fn strip_think_blocks(&self, text: &mut String) {
        if let Some(re) = &self.think_blocks {
            while re.is_match(text) {
                *text = re.replace_all(text, "").into_owned();
            }
        }
    }

    fn strip_lead_ins(&self, text: &mut String) {
        if let Some(re) = &self.lead_ins {
            while let Some((start, after)) = re.find(text).map(|m| (m.start(), m.end())) {
                let end = SPAN_END
                    .find(&text[after..])
                    .map(|t| after + t.start())
                    .unwrap_or(text.len());
                text.replace_range(start..end, "");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_think_block_inline() {
        let s = ResponseSanitizer::default();
        assert_eq!(s.clean("A <think>B</think> C"), "A  C");
    }

    #[test]
    fn removes_multiline_long_form_tags() {
        let s = ResponseSanitizer::default();
        let text = "<THINKING>\nstep one\nstep two\n</Thinking>\n## 今日天气概况\n晴";
        assert_eq!(s.clean(text), "## 今日天气概况\n晴");
    }

    #[test]
    fn think_removal_is_non_greedy() {
        let s = ResponseSanitizer::default();
        assert_eq!(s.clean("<think>a</think>keep<think>b</think>"), "keep");
    }

    #[test]
    fn nested_leftovers_are_removed_until_stable() {
        let s = ResponseSanitizer::default();
        assert_eq!(s.clean("<thi<think>x</think>nk>y</think>z"), "z");
    }

    #[test]
    fn lead_in_runs_to_heading() {
        let s = ResponseSanitizer::default();
        let text = "根据以上信息，我来整理一份报告。## 今日天气概况\n北京晴。";
        assert_eq!(s.clean(text), "## 今日天气概况\n北京晴。");
    }

    #[test]
    fn lead_in_runs_to_paragraph_break() {
        let s = ResponseSanitizer::default();
        let text = "Let me think about the layout first\nand the tone.\n\nFinal answer.";
        assert_eq!(s.clean(text), "Final answer.");
    }

    #[test]
    fn lead_in_runs_to_list_or_numbered_item() {
        let s = ResponseSanitizer::default();
        assert_eq!(s.clean("Intro. Based on the above\n- item"), "Intro. \n- item");
        assert_eq!(s.clean("首先我需要列出要点\n1. 第一点"), "1. 第一点");
    }

    #[test]
    fn lead_in_at_end_consumes_rest() {
        let s = ResponseSanitizer::default();
        assert_eq!(s.clean("答案是晴天。让我想想还有什么"), "答案是晴天。");
    }

    #[test]
    fn collapses_blank_runs() {
        let s = ResponseSanitizer::default();
        assert_eq!(s.clean("a\n\n\n\nb\n \n\t\nc\n\nd"), "a\n\nb\n\nc\n\nd");
    }

    #[test]
    fn clean_text_is_unchanged() {
        let s = ResponseSanitizer::default();
        let text = "## 今日天气概况\n\n北京晴，气温18°C。";
        assert_eq!(s.clean(text), text);
    }

    #[test]
    fn custom_patterns_replace_defaults() {
        let s = ResponseSanitizer::new(&["reasoning"], &["hmm,"]).expect("patterns");
        assert_eq!(s.clean("<reasoning>x</reasoning>hmm, wait\n\nok"), "ok");
        // default tags are no longer active
        assert_eq!(s.clean("<think>x</think>"), "<think>x</think>");
    }

    #[test]
    fn unmatched_open_tag_is_left_alone() {
        let s = ResponseSanitizer::default();
        assert_eq!(s.clean("<think>never closed"), "<think>never closed");
    }

    #[test]
    fn novel_reasoning_phrasing_is_not_caught() {
        // Known limitation: only listed phrasings are removed.
        let s = ResponseSanitizer::default();
        let text = "Hmm, pondering the structure here.\n\n## 今日天气概况";
        assert_eq!(s.clean(text), text);
    }
}
