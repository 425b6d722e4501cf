use serde::{Deserialize, Serialize};

/// The `type` attribute of an input, reduced to what collection cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InputKind {
    Checkbox,
    Radio,
    Other(String),
}

impl Default for InputKind {
    fn default() -> Self {
        InputKind::Other("text".to_string())
    }
}

impl From<&str> for InputKind {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "checkbox" => InputKind::Checkbox,
            "radio" => InputKind::Radio,
            other => InputKind::Other(other.to_string()),
        }
    }
}

impl From<String> for InputKind {
    fn from(value: String) -> Self {
        InputKind::from(value.as_str())
    }
}

impl From<InputKind> for String {
    fn from(kind: InputKind) -> Self {
        kind.to_string()
    }
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputKind::Checkbox => write!(f, "checkbox"),
            InputKind::Radio => write!(f, "radio"),
            InputKind::Other(kind) => write!(f, "{}", kind),
        }
    }
}

/// Snapshot of one named form control
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputElement {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: InputKind,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub required: bool,
}

impl InputElement {
    pub fn new(name: &str, kind: impl Into<InputKind>, value: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.into(),
            value: value.to_string(),
            ..Default::default()
        }
    }

    pub fn text(name: &str, value: &str) -> Self {
        Self::new(name, "text", value)
    }

    pub fn checkbox(name: &str, value: &str, checked: bool) -> Self {
        Self::new(name, InputKind::Checkbox, value).checked(checked)
    }

    pub fn radio(name: &str, value: &str, checked: bool) -> Self {
        Self::new(name, InputKind::Radio, value).checked(checked)
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}
