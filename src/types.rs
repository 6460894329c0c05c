use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// Every comic has exactly this many panels.
pub const PANEL_COUNT: usize = 4;

/// User-supplied description of the comic to generate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicBrief {
    pub character1_description: String,
    pub character2_description: String,
    pub art_style: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl ComicBrief {
    pub fn new(
        character1: impl Into<String>,
        character2: impl Into<String>,
        art_style: impl Into<String>,
    ) -> Self {
        Self {
            character1_description: character1.into(),
            character2_description: character2.into(),
            art_style: art_style.into(),
            theme: None,
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    /// Theme text if it carries anything besides whitespace.
    pub fn theme(&self) -> Option<&str> {
        self.theme
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Reject briefs with missing required fields.
    ///
    /// Runs before a request is admitted, so a rejected brief never
    /// allocates a ledger entry.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("character1Description", &self.character1_description),
            ("character2Description", &self.character2_description),
            ("artStyle", &self.art_style),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// One panel of the story, as produced by the story stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicPanel {
    pub panel_number: u8,
    pub dialogue_text: String,
    pub visual_description: String,
}

/// A validated four-panel story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicStory {
    pub title: String,
    pub art_style: String,
    pub panels: [ComicPanel; PANEL_COUNT],
}

/// A story panel together with its generated image.
///
/// An empty `image_url` marks a panel whose generation failed after all
/// attempts were exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicImagePanel {
    pub panel_number: u8,
    pub dialogue_text: String,
    pub visual_description: String,
    pub image_url: String,
}

impl ComicImagePanel {
    pub fn new(panel: ComicPanel, image_url: impl Into<String>) -> Self {
        Self {
            panel_number: panel.panel_number,
            dialogue_text: panel.dialogue_text,
            visual_description: panel.visual_description,
            image_url: image_url.into(),
        }
    }

    pub fn has_image(&self) -> bool {
        !self.image_url.is_empty()
    }
}

/// The finished comic. Always four panels, each independently successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicResult {
    pub title: String,
    pub art_style: String,
    pub panels: [ComicImagePanel; PANEL_COUNT],
}

impl ComicResult {
    /// Number of panels that received an image.
    pub fn success_count(&self) -> usize {
        self.panels.iter().filter(|p| p.has_image()).count()
    }
}

/// Lifecycle state of a tracked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    GeneratingStory,
    GeneratingImages,
    Completed,
    Error,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::GeneratingStory => "generating_story",
            RequestStatus::GeneratingImages => "generating_images",
            RequestStatus::Completed => "completed",
            RequestStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Error)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Transitions only move forward; `Error` is reachable from every
    /// non-terminal state and terminal states accept nothing.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        match (self, next) {
            (Pending, GeneratingStory) => true,
            (GeneratingStory, GeneratingImages) => true,
            (GeneratingImages, Completed) => true,
            (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of a tracked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RequestId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| PipelineError::NotFound(s.to_string()))
    }
}

/// A request as recorded by the [`RequestLedger`](crate::ledger::RequestLedger).
///
/// `result` is only set once the request is `Completed` and `error` only once
/// it is `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedRequest {
    pub id: RequestId,
    pub brief: ComicBrief,
    pub status: RequestStatus,
    pub result: Option<ComicResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TrackedRequest {
    pub(crate) fn new(brief: ComicBrief, created_at: DateTime<Utc>) -> Self {
        Self {
            id: RequestId::new(),
            brief,
            status: RequestStatus::Pending,
            result: None,
            error: None,
            created_at,
        }
    }
}
