use std::fmt::Write;

use crate::domain::entities::AlertRequest;
use crate::domain::value_objects::AlertCategory;

pub struct PromptBuilder;

impl PromptBuilder {
    /// Builds the enrichment prompt for one alert.
    #[must_use]
    pub fn build(request: &AlertRequest) -> String {
        let mut prompt = String::with_capacity(512);

        let _ = writeln!(
            prompt,
            "A Linux host monitor raised a {} {} alert: {}.",
            request.severity.as_str(),
            request.category.as_str(),
            request.title,
        );
        let _ = writeln!(prompt, "Details: {}", request.message);
        if !request.ai_context.is_empty() {
            let _ = writeln!(prompt, "Context: {}", request.ai_context);
        }
        prompt.push('\n');
        prompt.push_str(Self::instruction(request.category));
        prompt.push_str(" Answer in 2-3 sentences, no preamble.");
        prompt
    }

    const fn instruction(category: AlertCategory) -> &'static str {
        match category {
            AlertCategory::Disk => {
                "Suggest the most likely causes of the disk usage and safe commands to reclaim space."
            }
            AlertCategory::Memory => {
                "Explain what usually drives memory pressure like this and how to find the culprit."
            }
            AlertCategory::Apt | AlertCategory::Cve => {
                "Explain the risk of leaving these updates pending and how to apply them safely."
            }
            AlertCategory::Cpu => "Explain how to identify what is saturating the CPU.",
            AlertCategory::Service | AlertCategory::System => {
                "Explain the likely cause and the first diagnostic step."
            }
        }
    }
}
