use indexmap::IndexMap;

use crate::edits::EditMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    JsonPrompt,
    JsonBase64Image,
    RawImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    ImageBytes,
    SegmentationJson,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescriptor {
    pub mode: EditMode,
    pub model: String,
    pub accept: String,
    pub body: BodyKind,
    pub response: ResponseKind,
    pub failure_hint: String,
}

#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    endpoints: IndexMap<EditMode, EndpointDescriptor>,
}

impl EndpointRegistry {
    pub fn new(endpoints: Option<IndexMap<EditMode, EndpointDescriptor>>) -> Self {
        Self {
            endpoints: endpoints
                .filter(|table| !table.is_empty())
                .unwrap_or_else(default_endpoints),
        }
    }

    pub fn get(&self, mode: EditMode) -> Option<&EndpointDescriptor> {
        self.endpoints.get(&mode)
    }

    /// Never fails: a mode absent from the table resolves to the Style
    /// entry, and a table without a Style entry resolves to its first entry.
    pub fn resolve(&self, mode: EditMode) -> &EndpointDescriptor {
        self.endpoints
            .get(&mode)
            .or_else(|| self.endpoints.get(&EditMode::Style))
            .unwrap_or_else(|| {
                self.endpoints
                    .first()
                    .map(|(_, descriptor)| descriptor)
                    .expect("endpoint table is never empty")
            })
    }

    pub fn resolve_label(&self, raw: &str) -> &EndpointDescriptor {
        match EditMode::from_label(raw) {
            Some(mode) => self.resolve(mode),
            None => self.resolve(EditMode::Style),
        }
    }

    pub fn list(&self) -> impl Iterator<Item = &EndpointDescriptor> {
        self.endpoints.values()
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

fn default_endpoints() -> IndexMap<EditMode, EndpointDescriptor> {
    let mut map = IndexMap::new();

    let mut insert = |mode: EditMode,
                      model: &str,
                      accept: &str,
                      body: BodyKind,
                      response: ResponseKind,
                      failure_hint: &str| {
        map.insert(
            mode,
            EndpointDescriptor {
                mode,
                model: model.to_string(),
                accept: accept.to_string(),
                body,
                response,
                failure_hint: failure_hint.to_string(),
            },
        );
    };

    insert(
        EditMode::Style,
        "stabilityai/stable-diffusion-xl-base-1.0",
        "image/png",
        BodyKind::JsonPrompt,
        ResponseKind::ImageBytes,
        "Image generation failed.",
    );
    insert(
        EditMode::BackgroundCleaning,
        "nvidia/segformer-b0-finetuned-ade-512-512",
        "application/json",
        BodyKind::JsonBase64Image,
        ResponseKind::SegmentationJson,
        "Background cleanup failed.",
    );
    insert(
        EditMode::QualityImprovement,
        "caidas/swin2SR-classical-sr-x2-64",
        "image/png",
        BodyKind::RawImage,
        ResponseKind::ImageBytes,
        "Quality enhancement failed.",
    );

    map
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{BodyKind, EndpointDescriptor, EndpointRegistry, ResponseKind};
    use crate::edits::EditMode;

    fn descriptor(mode: EditMode, model: &str) -> EndpointDescriptor {
        EndpointDescriptor {
            mode,
            model: model.to_string(),
            accept: "image/png".to_string(),
            body: BodyKind::JsonPrompt,
            response: ResponseKind::ImageBytes,
            failure_hint: "Request failed.".to_string(),
        }
    }

    #[test]
    fn default_table_has_one_entry_per_mode() {
        let registry = EndpointRegistry::default();
        assert_eq!(registry.list().count(), 3);
        assert_eq!(
            registry.resolve(EditMode::Style).model,
            "stabilityai/stable-diffusion-xl-base-1.0"
        );
        assert_eq!(
            registry.resolve(EditMode::BackgroundCleaning).response,
            ResponseKind::SegmentationJson
        );
        assert_eq!(
            registry.resolve(EditMode::QualityImprovement).body,
            BodyKind::RawImage
        );
    }

    #[test]
    fn unknown_labels_resolve_to_the_style_entry() {
        let registry = EndpointRegistry::default();
        assert_eq!(registry.resolve_label("sepia").mode, EditMode::Style);
        assert_eq!(registry.resolve_label("").mode, EditMode::Style);
        assert_eq!(
            registry.resolve_label("Background_Cleaning").mode,
            EditMode::BackgroundCleaning
        );
    }

    #[test]
    fn missing_mode_falls_back_to_the_style_entry() {
        let mut table = IndexMap::new();
        table.insert(EditMode::Style, descriptor(EditMode::Style, "style-model"));
        let registry = EndpointRegistry::new(Some(table));
        assert_eq!(
            registry.resolve(EditMode::QualityImprovement).model,
            "style-model"
        );
    }

    #[test]
    fn table_without_style_falls_back_to_its_first_entry() {
        let mut table = IndexMap::new();
        table.insert(
            EditMode::QualityImprovement,
            descriptor(EditMode::QualityImprovement, "upscale-model"),
        );
        let registry = EndpointRegistry::new(Some(table));
        assert_eq!(registry.resolve(EditMode::Style).model, "upscale-model");
    }

    #[test]
    fn empty_custom_table_keeps_the_defaults() {
        let registry = EndpointRegistry::new(Some(IndexMap::new()));
        assert_eq!(registry.list().count(), 3);
    }
}
