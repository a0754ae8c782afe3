use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditMode {
    Style,
    BackgroundCleaning,
    QualityImprovement,
}

impl EditMode {
    pub const ALL: [EditMode; 3] = [
        EditMode::Style,
        EditMode::BackgroundCleaning,
        EditMode::QualityImprovement,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EditMode::Style => "style",
            EditMode::BackgroundCleaning => "background-cleaning",
            EditMode::QualityImprovement => "quality-improvement",
        }
    }

    pub fn from_label(raw: &str) -> Option<EditMode> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        EditMode::ALL
            .into_iter()
            .find(|mode| mode.label() == normalized)
    }

    pub fn requires_source_image(&self) -> bool {
        !matches!(self, EditMode::Style)
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}
