use serde::{Deserialize, Serialize};

use paneldeck_core_types::{shallow_merge, ContentType, JsonMap, PanelId, Position, Size};

use crate::store::ShallowMerge;

/// Registration record for one panel in the layout.
///
/// The store never interprets `content_type`; it only keys records by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelDescriptor {
    pub id: PanelId,
    pub content_type: ContentType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default)]
    pub state: JsonMap,
}

impl PanelDescriptor {
    pub fn new(
        id: impl Into<PanelId>,
        content_type: impl Into<ContentType>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content_type: content_type.into(),
            title: title.into(),
            position: None,
            size: None,
            state: JsonMap::new(),
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_state(mut self, state: JsonMap) -> Self {
        self.state = state;
        self
    }
}

/// Partial descriptor; `None` fields leave the current value alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelDescriptorPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    /// Shallow-merged into the existing state object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<JsonMap>,
}

impl PanelDescriptorPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn position(position: Position) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn size(size: Size) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    pub fn state(state: JsonMap) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }
}

impl ShallowMerge for PanelDescriptor {
    type Patch = PanelDescriptorPatch;

    fn apply_patch(&mut self, patch: PanelDescriptorPatch) {
        if let Some(content_type) = patch.content_type {
            self.content_type = content_type;
        }
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(position) = patch.position {
            self.position = Some(position);
        }
        if let Some(size) = patch.size {
            self.size = Some(size);
        }
        if let Some(state) = patch.state {
            shallow_merge(&mut self.state, &state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KeyedStore;
    use serde_json::json;

    fn object(value: serde_json::Value) -> JsonMap {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn descriptor_patch_merges_state_and_keeps_other_fields() {
        let store = KeyedStore::new();
        store.register(
            "map",
            PanelDescriptor::new("map", ContentType::Map, "Map")
                .with_position(Position::new(0.0, 0.0))
                .with_state(object(json!({"zoom": 4, "center": [1, 2]}))),
        );

        let mapping = store.update(
            "map",
            PanelDescriptorPatch {
                size: Some(Size::new(640.0, 480.0)),
                state: Some(object(json!({"zoom": 6}))),
                ..PanelDescriptorPatch::default()
            },
        );

        let panel = &mapping["map"];
        assert_eq!(panel.title, "Map");
        assert_eq!(panel.position, Some(Position::new(0.0, 0.0)));
        assert_eq!(panel.size, Some(Size::new(640.0, 480.0)));
        assert_eq!(
            serde_json::Value::Object(panel.state.clone()),
            json!({"zoom": 6, "center": [1, 2]})
        );
    }

    #[test]
    fn descriptor_serializes_camel_case() {
        let descriptor = PanelDescriptor::new("stats", "stats", "Stats");
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            value,
            json!({"id": "stats", "contentType": "stats", "title": "Stats", "state": {}})
        );
    }
}
