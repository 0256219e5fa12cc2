//! Summary variants, their prompts and sampling parameters.

use serde::{Deserialize, Serialize};

use crate::upstream::GenerationParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryKind {
    Brief,
    Detailed,
    ActionItems,
}

impl SummaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryKind::Brief => "brief",
            SummaryKind::Detailed => "detailed",
            SummaryKind::ActionItems => "action-items",
        }
    }

    fn instructions(&self) -> &'static str {
        match self {
            SummaryKind::Brief => {
                "Summarize the following email in two or three sentences. \
                 Keep only the main point and any decision or request."
            }
            SummaryKind::Detailed => {
                "Write a detailed summary of the following email. Cover the \
                 context, every key point, decisions, dates and people involved. \
                 Use short paragraphs."
            }
            SummaryKind::ActionItems => {
                "List the action items in the following email as a Markdown \
                 bullet list. Include the owner and deadline when stated. If \
                 there are no action items, reply with \"No action items.\""
            }
        }
    }

    pub fn prompt(&self, content: &str) -> String {
        format!("{}\n\nEmail:\n\"\"\"\n{}\n\"\"\"", self.instructions(), content)
    }

    pub fn generation_params(&self) -> GenerationParams {
        let (temperature, max_output_tokens) = match self {
            SummaryKind::Brief => (0.3, 256),
            SummaryKind::Detailed => (0.4, 1024),
            SummaryKind::ActionItems => (0.2, 512),
        };
        GenerationParams {
            temperature,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens,
        }
    }
}
