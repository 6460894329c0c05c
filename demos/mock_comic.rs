//! Runs the whole pipeline against mock backends, no network needed.
//!
//! One panel fails twice before succeeding, so the retry path shows up in
//! the event output.
//!
//! Run with `cargo run --example mock_comic`.

use comic_pipeline::events::{Event, FnEventHandler};
use comic_pipeline::{
    ComicBrief, ComicPipeline, ExecCtx, MockBackend, MockImageBackend, RequestLedger,
};
use std::sync::Arc;

const STORY: &str = r#"```json
{
  "title": "The Map at Midnight",
  "panels": [
    {"panelNumber": 1, "dialogueText": "Halt! Who wanders the keep at this hour?", "visualDescription": "A knight in shining armor raises a lantern in a dark castle corridor."},
    {"panelNumber": 2, "dialogueText": "Only an old friend with an older map.", "visualDescription": "A bearded wizard steps out of the shadows holding a glowing scroll."},
    {"panelNumber": 3, "dialogueText": "", "visualDescription": "The two lean over the map spread across a stone table."},
    {"panelNumber": 4, "dialogueText": "Then we leave at dawn.", "visualDescription": "Knight and wizard stride across the drawbridge as the sun rises."}
  ]
}
```"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let handler = Arc::new(FnEventHandler(|event: Event| match event {
        Event::StatusChanged { from, to, .. } => println!("  status: {} -> {}", from, to),
        Event::PanelRetry {
            panel,
            attempt,
            delay_ms,
            reason,
        } => println!(
            "  panel {}: retry #{} in {}ms ({})",
            panel, attempt, delay_ms, reason
        ),
        Event::PanelFinished { panel, ok, attempts } => {
            println!("  panel {}: ok={} after {} attempt(s)", panel, ok, attempts)
        }
        _ => {}
    }));

    let ctx = ExecCtx::builder("http://localhost")
        .backend(Arc::new(MockBackend::fixed(STORY)))
        .image_backend(Arc::new(MockImageBackend::new().fail_first("glowing scroll", 2)))
        .event_handler(handler)
        .build()?;
    let pipeline = ComicPipeline::new(ctx, Arc::new(RequestLedger::new()));

    let brief = ComicBrief::new(
        "A brave knight in shining armor",
        "A wise old wizard with a long beard",
        "classic comic book",
    )
    .with_theme("an unexpected quest");

    println!("Submitting comic request...");
    let submission = pipeline.submit(brief).await?;
    let status = submission.handle.await?;

    let tracked = pipeline
        .ledger()
        .get(submission.id)
        .await
        .ok_or("request vanished from the ledger")?;
    println!("\nRequest {} finished as {}", tracked.id, status);

    if let Some(result) = tracked.result {
        println!("Title: {} ({})", result.title, result.art_style);
        for panel in &result.panels {
            let image = if panel.has_image() { panel.image_url.as_str() } else { "<no image>" };
            println!(
                "  [{}] {:?} -> {}",
                panel.panel_number, panel.dialogue_text, image
            );
        }
        println!("{}/4 panels illustrated", result.success_count());
    }
    if let Some(error) = tracked.error {
        println!("Error: {}", error);
    }

    Ok(())
}
