use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::edits::EditMode;

pub const RECEIPT_SCHEMA_VERSION: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReceipt {
    pub schema_version: u64,
    pub created_at: String,
    pub mode: EditMode,
    pub model: String,
    pub food: Option<String>,
    pub prompt: Option<String>,
    pub source_image: Option<String>,
    pub artifact_path: String,
    pub alt_text: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(default)]
    pub offline: bool,
}

pub fn write_receipt(path: &Path, receipt: &RunReceipt) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(receipt)?)?;
    Ok(())
}

pub fn now_utc_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{now_utc_iso, write_receipt, RunReceipt, RECEIPT_SCHEMA_VERSION};
    use crate::edits::EditMode;

    #[test]
    fn receipt_round_trips_through_disk() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let receipt_path = temp.path().join("run").join("receipt-1.json");
        let receipt = RunReceipt {
            schema_version: RECEIPT_SCHEMA_VERSION,
            created_at: now_utc_iso(),
            mode: EditMode::BackgroundCleaning,
            model: "nvidia/segformer-b0-finetuned-ade-512-512".to_string(),
            food: Some("Pizza".to_string()),
            prompt: None,
            source_image: Some("/tmp/pizza.jpg".to_string()),
            artifact_path: "/tmp/out/artifact-1-aa.png".to_string(),
            alt_text: "Foreground mask for Pizza".to_string(),
            width: Some(512),
            height: Some(512),
            offline: false,
        };

        write_receipt(&receipt_path, &receipt)?;

        let raw = std::fs::read_to_string(&receipt_path)?;
        let parsed: Value = serde_json::from_str(&raw)?;
        assert_eq!(parsed["schema_version"], Value::from(RECEIPT_SCHEMA_VERSION));
        assert_eq!(parsed["mode"], Value::from("background-cleaning"));
        assert_eq!(parsed["alt_text"], Value::from("Foreground mask for Pizza"));

        let reread: RunReceipt = serde_json::from_str(&raw)?;
        assert_eq!(reread, receipt);
        Ok(())
    }

    #[test]
    fn created_at_is_utc_rfc3339() {
        let stamp = now_utc_iso();
        assert!(stamp.ends_with("+00:00"));
        assert!(stamp.contains('T'));
    }
}
