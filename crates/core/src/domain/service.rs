use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Lamination,
    Extension,
}

impl Service {
    pub const ALL: [Service; 2] = [Service::Lamination, Service::Extension];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lamination => "lamination",
            Self::Extension => "extension",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lamination" => Some(Self::Lamination),
            "extension" => Some(Self::Extension),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Lamination => "Lash lamination",
            Self::Extension => "Lash extension",
        }
    }

    /// Only extensions ask the client for a style before picking a date.
    pub fn requires_style(&self) -> bool {
        matches!(self, Self::Extension)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionStyle {
    Classic,
    TwoD,
    ThreeD,
}

impl ExtensionStyle {
    pub const ALL: [ExtensionStyle; 3] =
        [ExtensionStyle::Classic, ExtensionStyle::TwoD, ExtensionStyle::ThreeD];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::TwoD => "2d",
            Self::ThreeD => "3d",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "classic" => Some(Self::Classic),
            "2d" => Some(Self::TwoD),
            "3d" => Some(Self::ThreeD),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Classic => "Classic",
            Self::TwoD => "2D",
            Self::ThreeD => "3D",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSelection {
    pub service: Service,
    pub style: Option<ExtensionStyle>,
}

impl ServiceSelection {
    pub fn label(&self) -> String {
        match self.style {
            Some(style) => format!("{} ({})", self.service.label(), style.label()),
            None => self.service.label().to_owned(),
        }
    }
}
