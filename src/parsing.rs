//! Defensive parsing of the story returned by the text-generation service.
//!
//! Upstream output is never trusted: fences are stripped, the JSON shape is
//! validated field by field, and panel numbers are rewritten from position.
//! Anything that does not validate is replaced by a fixed fallback story so
//! later stages always receive exactly four panels.

use crate::payload::StageOutcome;
use crate::types::{ComicPanel, ComicStory, PANEL_COUNT};
use serde_json::Value;

pub const DEFAULT_TITLE: &str = "Untitled Comic";
pub const DEFAULT_ART_STYLE: &str = "comic book style";
pub const FALLBACK_TITLE: &str = "Error Comic";

const FALLBACK_PANELS: [(&str, &str); PANEL_COUNT] = [
    (
        "Hmm, something went wrong with our story...",
        "A confused comic character scratching their head in front of a blank page",
    ),
    (
        "The storyteller seems to have lost the plot!",
        "A second character peeking into an empty storybook with a puzzled look",
    ),
    (
        "Maybe we should try again?",
        "Both characters looking at each other and shrugging",
    ),
    (
        "Let's give it another shot!",
        "Both characters giving a thumbs up, ready to start a new adventure",
    ),
];

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
pub fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Remove a single markdown code fence wrapping the text.
///
/// Recognizes `` ```json ``, `` ```JSON `` and bare `` ``` `` openers and a
/// trailing `` ``` `` closer, each independently.
///
/// # Example
///
/// ```
/// use comic_pipeline::parsing::strip_code_fence;
///
/// assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
/// assert_eq!(strip_code_fence("  {\"a\": 1}  "), "{\"a\": 1}");
/// ```
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

/// The fixed story substituted whenever upstream output cannot be used.
pub fn fallback_story() -> ComicStory {
    let mut number = 0u8;
    let panels = FALLBACK_PANELS.map(|(dialogue, visual)| {
        number += 1;
        ComicPanel {
            panel_number: number,
            dialogue_text: dialogue.to_string(),
            visual_description: visual.to_string(),
        }
    });
    ComicStory {
        title: FALLBACK_TITLE.to_string(),
        art_style: DEFAULT_ART_STYLE.to_string(),
        panels,
    }
}

/// Turns raw text-generation output into a [`ComicStory`].
///
/// Never fails: malformed input yields [`StageOutcome::Fallback`] carrying
/// [`fallback_story`] and the reason validation stopped.
#[derive(Debug, Clone)]
pub struct StoryResponseParser {
    default_art_style: String,
}

impl StoryResponseParser {
    pub fn new() -> Self {
        Self {
            default_art_style: DEFAULT_ART_STYLE.to_string(),
        }
    }

    /// Art style used when a valid story does not name one.
    ///
    /// Does not affect the fallback story, which always uses
    /// [`DEFAULT_ART_STYLE`].
    pub fn with_default_art_style(mut self, art_style: impl Into<String>) -> Self {
        let art_style = art_style.into();
        if !art_style.trim().is_empty() {
            self.default_art_style = art_style.trim().to_string();
        }
        self
    }

    pub fn parse(&self, raw: &str) -> StageOutcome<ComicStory> {
        match self.parse_strict(raw) {
            Ok(story) => StageOutcome::Complete(story),
            Err(reason) => StageOutcome::Fallback {
                value: fallback_story(),
                reason,
            },
        }
    }

    fn parse_strict(&self, raw: &str) -> Result<ComicStory, String> {
        let body = strip_code_fence(raw);
        let value: Value = serde_json::from_str(body).map_err(|e| {
            format!(
                "response is not valid JSON ({}). Raw text (truncated): {}",
                e,
                truncate(body, 200)
            )
        })?;

        let panels = value
            .get("panels")
            .ok_or_else(|| "missing 'panels' field".to_string())?
            .as_array()
            .ok_or_else(|| "'panels' is not an array".to_string())?;

        if panels.len() != PANEL_COUNT {
            return Err(format!(
                "expected {} panels, got {}",
                PANEL_COUNT,
                panels.len()
            ));
        }

        let panels = panels
            .iter()
            .enumerate()
            .map(|(idx, panel)| Self::parse_panel(idx, panel))
            .collect::<Result<Vec<_>, _>>()?;
        let panels: [ComicPanel; PANEL_COUNT] = panels
            .try_into()
            .map_err(|_| "panel count changed during validation".to_string())?;

        Ok(ComicStory {
            title: non_blank_str(&value, "title")
                .unwrap_or(DEFAULT_TITLE)
                .to_string(),
            art_style: non_blank_str(&value, "artStyle")
                .unwrap_or(&self.default_art_style)
                .to_string(),
            panels,
        })
    }

    /// Validate one panel. The panel number always comes from `idx`.
    fn parse_panel(idx: usize, panel: &Value) -> Result<ComicPanel, String> {
        let position = idx + 1;
        let dialogue = match panel.get("dialogueText") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => {
                return Err(format!("panel {} has no dialogueText", position))
            }
            Some(_) => return Err(format!("panel {} dialogueText is not a string", position)),
        };
        let visual = panel
            .get("visualDescription")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("panel {} has no visualDescription", position))?;

        Ok(ComicPanel {
            panel_number: position as u8,
            dialogue_text: dialogue,
            visual_description: visual.to_string(),
        })
    }
}

impl Default for StoryResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

fn non_blank_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
