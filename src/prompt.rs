//! Story prompt construction.
//!
//! [`StoryPromptBuilder`] turns a [`ComicBrief`] into the single instruction
//! sent to the text-generation service. Templates use `{key}` placeholders;
//! `{{` and `}}` produce literal braces so the JSON shape can be written
//! inline.

use crate::types::{ComicBrief, PANEL_COUNT};
use std::collections::HashMap;

const STORY_TEMPLATE: &str = r#"Write a short, funny {panel_count}-panel comic strip story featuring these two characters.

Character 1: {character1}
Character 2: {character2}
Art style: {art_style}
{theme_line}
Rules:
- The story must have exactly {panel_count} panels.
- Only one character speaks in each panel.
- Describe the visual scene of each panel in detail, but do not describe speech bubbles or any text inside the image.
- Keep each line of dialogue short enough to fit in a speech bubble.

Respond with a JSON object in exactly this shape:
{{
  "title": "Comic title",
  "panels": [
    {{ "panelNumber": 1, "dialogueText": "What the speaking character says", "visualDescription": "What the panel shows" }}
  ]
}}

The "panels" array must contain exactly {panel_count} objects with panelNumber 1 to {panel_count}.
Return only the JSON object. Do not add any explanation before or after it and do not wrap it in markdown code fences."#;

/// Build a prompt string with variable substitution.
///
/// Replaces `{key}` placeholders in the template with values from `vars`.
/// Use `{{` to insert a literal `{` and `}}` to insert a literal `}`.
/// The template is scanned once, left to right; substituted values are
/// copied to the output and never scanned again, so braces inside a value
/// survive as written. Unknown placeholders are kept as-is.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use comic_pipeline::prompt::render;
///
/// let vars = HashMap::from([("name".to_string(), "Alice".to_string())]);
/// let result = render("Hello {name}, here is JSON: {{\"key\": \"val\"}}", &vars);
/// assert_eq!(result, r#"Hello Alice, here is JSON: {"key": "val"}"#);
/// ```
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(&['{', '}'][..]) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("{{") {
            out.push('{');
            rest = after;
            continue;
        }
        if let Some(after) = tail.strip_prefix("}}") {
            out.push('}');
            rest = after;
            continue;
        }
        if tail.starts_with('{') {
            let value = tail
                .find('}')
                .and_then(|end| vars.get(&tail[1..end]).map(|v| (end, v)));
            if let Some((end, value)) = value {
                out.push_str(value);
                rest = &tail[end + 1..];
                continue;
            }
        }

        // Lone brace: copy it through.
        out.push_str(&tail[..1]);
        rest = &tail[1..];
    }

    out.push_str(rest);
    out
}

/// Builds the story-generation instruction for a brief.
///
/// Total over its input: every brief produces a prompt, no I/O is done.
#[derive(Debug, Clone)]
pub struct StoryPromptBuilder {
    template: String,
}

impl StoryPromptBuilder {
    pub fn new() -> Self {
        Self {
            template: STORY_TEMPLATE.to_string(),
        }
    }

    /// Use a custom template. Recognised placeholders: `{character1}`,
    /// `{character2}`, `{art_style}`, `{theme_line}`, `{panel_count}`.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn build(&self, brief: &ComicBrief) -> String {
        render(&self.template, &Self::vars(brief))
    }

    fn vars(brief: &ComicBrief) -> HashMap<String, String> {
        // Brief fields go in exactly as submitted.
        let theme_line = brief
            .theme
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| format!("Theme: {}\n", t))
            .unwrap_or_default();

        HashMap::from([
            (
                "character1".to_string(),
                brief.character1_description.clone(),
            ),
            (
                "character2".to_string(),
                brief.character2_description.clone(),
            ),
            ("art_style".to_string(), brief.art_style.clone()),
            ("theme_line".to_string(), theme_line),
            ("panel_count".to_string(), PANEL_COUNT.to_string()),
        ])
    }
}

impl Default for StoryPromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief() -> ComicBrief {
        ComicBrief::new("A brave knight", "A wise wizard", "anime manga style")
    }

    #[test]
    fn test_render_basic() {
        let vars = HashMap::from([("name".to_string(), "Alice".to_string())]);
        assert_eq!(render("Hello {name}", &vars), "Hello Alice");
    }

    #[test]
    fn test_render_escaped_braces_no_substitution() {
        let result = render("Output format: {{\"result\": {{\"value\": 42}}}}", &HashMap::new());
        assert_eq!(result, r#"Output format: {"result": {"value": 42}}"#);
    }

    #[test]
    fn test_prompt_embeds_brief_verbatim() {
        let prompt = StoryPromptBuilder::new().build(&brief());
        assert!(prompt.contains("A brave knight"));
        assert!(prompt.contains("A wise wizard"));
        assert!(prompt.contains("anime manga style"));
    }

    #[test]
    fn test_prompt_includes_theme_when_present() {
        let prompt = StoryPromptBuilder::new().build(&brief().with_theme("medieval adventure"));
        assert!(prompt.contains("Theme: medieval adventure"));
    }

    #[test]
    fn test_prompt_without_theme_has_no_null_text() {
        let prompt = StoryPromptBuilder::new().build(&brief());
        assert!(!prompt.contains("Theme:"));
        assert!(!prompt.contains("null"));
        assert!(!prompt.contains("None"));
        assert!(!prompt.contains("undefined"));
    }

    #[test]
    fn test_prompt_demands_json_shape() {
        let prompt = StoryPromptBuilder::new().build(&brief());
        assert!(prompt.contains(r#""title""#));
        assert!(prompt.contains(r#""panels""#));
        assert!(prompt.contains(r#""panelNumber""#));
        assert!(prompt.contains(r#""dialogueText""#));
        assert!(prompt.contains(r#""visualDescription""#));
        assert!(prompt.contains("exactly 4 panels"));
        assert!(prompt.contains("Only one character speaks"));
        assert!(prompt.contains("do not describe speech bubbles"));
        assert!(prompt.contains("Return only the JSON object"));
        assert!(prompt.contains("markdown code fences"));
    }

    #[test]
    fn test_prompt_leaves_no_placeholders() {
        let prompt = StoryPromptBuilder::new().build(&brief().with_theme("space"));
        for key in ["{character1}", "{character2}", "{art_style}", "{theme_line}", "{panel_count}"] {
            assert!(!prompt.contains(key), "unrendered {key}");
        }
    }

    #[test]
    fn test_render_keeps_unknown_and_lone_braces() {
        let vars = HashMap::from([("a".to_string(), "1".to_string())]);
        assert_eq!(render("{a} {b} { } x}", &vars), "1 {b} { } x}");
    }

    #[test]
    fn test_placeholder_text_in_brief_is_not_expanded() {
        let brief = ComicBrief::new(
            "A robot whose catchphrase is {art_style}",
            "A cat who says {theme_line} and {{hi}}",
            "noir",
        )
        .with_theme("{character1}");
        let builder = StoryPromptBuilder::new();
        let first = builder.build(&brief);

        assert!(first.contains("Character 1: A robot whose catchphrase is {art_style}\n"));
        assert!(first.contains("Character 2: A cat who says {theme_line} and {{hi}}\n"));
        assert!(first.contains("Theme: {character1}\n"));
        assert!(first.contains("Art style: noir\n"));
        for _ in 0..50 {
            assert_eq!(builder.build(&brief), first);
        }
    }

    #[test]
    fn test_brief_whitespace_is_kept() {
        let brief = ComicBrief::new("  A brave knight ", "A wise wizard", " anime manga style")
            .with_theme("  medieval adventure");
        let prompt = StoryPromptBuilder::new().build(&brief);
        assert!(prompt.contains("Character 1:   A brave knight \n"));
        assert!(prompt.contains("Art style:  anime manga style\n"));
        assert!(prompt.contains("Theme:   medieval adventure\n"));
    }

    #[test]
    fn test_blank_theme_is_omitted() {
        let prompt = StoryPromptBuilder::new().build(&brief().with_theme("  \t "));
        assert!(!prompt.contains("Theme:"));
    }

    #[test]
    fn test_custom_template() {
        let prompt = StoryPromptBuilder::new()
            .with_template("{character1} vs {character2} in {art_style}")
            .build(&brief());
        assert_eq!(prompt, "A brave knight vs A wise wizard in anime manga style");
    }
}
