//! Decision request assembly.

use visicrawl_protocols::{ScreenId, Screenshot, StuckState, MAX_BATCH_ACTIONS};

use crate::grounding::GroundedElement;
use crate::journal::JournalEntry;

/// Everything the decision provider sees for one step.
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub step: u32,
    pub goal: String,
    pub target_app: String,
    pub screen_id: Option<ScreenId>,
    pub elements: Vec<GroundedElement>,
    pub journal: Vec<JournalEntry>,
    pub stuck: Option<StuckState>,
    /// Annotated overlay, or the raw capture when nothing was grounded.
    pub image: Screenshot,
}

impl DecisionRequest {
    /// One-line description for events and logs.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "step {}: {} elements, {} journal entries",
            self.step,
            self.elements.len(),
            self.journal.len()
        );
        if let Some(screen) = self.screen_id {
            out.push_str(&format!(", screen {}", screen));
        }
        if self.stuck.is_some() {
            out.push_str(", stuck");
        }
        out
    }

    /// Render the text prompt sent alongside the image.
    pub fn render_prompt(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        parts.push(format!(
            "You are exploring the application `{}` on a device.\nGoal: {}\nStep: {}",
            self.target_app, self.goal, self.step
        ));

        if self.elements.is_empty() {
            parts.push(
                "## Labelled elements\n\nNo text was detected. Target actions with a point or bounds."
                    .to_string(),
            );
        } else {
            let lines: Vec<String> = self
                .elements
                .iter()
                .map(|e| format!("- #{} \"{}\" at {}", e.label, e.text, e.center))
                .collect();
            parts.push(format!("## Labelled elements\n\n{}", lines.join("\n")));
        }

        if !self.journal.is_empty() {
            let lines: Vec<String> = self.journal.iter().map(|e| format!("- {}", e)).collect();
            parts.push(format!("## Recent steps\n\n{}", lines.join("\n")));
        }

        if let Some(stuck) = &self.stuck {
            parts.push(format!(
                "## Warning\n\nYou appear to be stuck: {}. Try a different element or go back.",
                stuck.reason
            ));
        }

        parts.push(response_format());
        parts.join("\n\n")
    }
}

fn response_format() -> String {
    format!(
        "## Response format\n\n\
         Reply with one JSON object:\n\
         {{\"actions\": [{{\"kind\": \"tap\", \"target\": {{\"label\": 3}}, \"rationale\": \"...\"}}], \
         \"goal_completed\": false, \"reasoning\": \"...\"}}\n\
         Kinds: tap, long_press, type_text, scroll_up, scroll_down, swipe_left, swipe_right, back.\n\
         Targets: {{\"label\": n}}, {{\"point\": {{\"x\": 0, \"y\": 0}}}} or \
         {{\"bounds\": {{\"x\": 0, \"y\": 0, \"width\": 0, \"height\": 0}}}}.\n\
         type_text needs \"text\". Return between 1 and {} actions.",
        MAX_BATCH_ACTIONS
    )
}
