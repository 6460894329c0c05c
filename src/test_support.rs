//! Shared fixtures for unit tests.

use crate::types::ComicBrief;

pub(crate) fn knight_wizard_brief() -> ComicBrief {
    ComicBrief::new("A brave knight", "A wise wizard", "anime manga style")
        .with_theme("medieval adventure")
}

/// A well-formed story reply, wrapped the way models often wrap it.
pub(crate) fn story_reply() -> String {
    r#"```json
{
  "title": "The Quest Begins",
  "panels": [
    {"panelNumber": 1, "dialogueText": "Who goes there?", "visualDescription": "The knight stands guard at a castle gate."},
    {"panelNumber": 2, "dialogueText": "A friend, with a map.", "visualDescription": "The wizard unrolls a glowing map."},
    {"panelNumber": 3, "dialogueText": "", "visualDescription": "Both lean over the map by torchlight."},
    {"panelNumber": 4, "dialogueText": "Then we ride at dawn!", "visualDescription": "The pair ride toward the sunrise."}
  ]
}
```"#
        .to_string()
}
