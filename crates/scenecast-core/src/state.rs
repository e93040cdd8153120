use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Name of a scene. Never empty.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SceneName(String);

impl SceneName {
    /// Returns `None` for an empty name.
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        (!name.is_empty()).then_some(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SceneName {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).ok_or("scene name must not be empty")
    }
}

impl From<SceneName> for String {
    fn from(value: SceneName) -> Self {
        value.0
    }
}

impl fmt::Display for SceneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last reported transform of a player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub x: f64,
    pub y: f64,
    pub anim: String,
    #[serde(rename = "flipX")]
    pub flip_x: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            x: 400.0,
            y: 300.0,
            anim: "idle".into(),
            flip_x: false,
        }
    }
}

/// Partial transform update sent with `playerMovement`.
///
/// Decoding is lenient: any subset of fields may be present, and a field
/// with the wrong JSON type is skipped instead of failing the whole patch.
/// A `scene` key is never read; scene changes only go through `set_scene`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MovementPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub anim: Option<String>,
    pub flip_x: Option<bool>,
}

impl MovementPatch {
    /// Extract the well-typed fields of a JSON object. Non-objects yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            x: obj.get("x").and_then(Value::as_f64),
            y: obj.get("y").and_then(Value::as_f64),
            anim: obj.get("anim").and_then(Value::as_str).map(str::to_owned),
            flip_x: obj.get("flipX").and_then(Value::as_bool),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.anim.is_none() && self.flip_x.is_none()
    }

    /// Shallow merge: present fields replace, absent fields are kept.
    pub fn apply(&self, state: &mut PlayerState) {
        if let Some(x) = self.x {
            state.x = x;
        }
        if let Some(y) = self.y {
            state.y = y;
        }
        if let Some(anim) = &self.anim {
            state.anim.clone_from(anim);
        }
        if let Some(flip_x) = self.flip_x {
            state.flip_x = flip_x;
        }
    }
}
