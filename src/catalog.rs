//! Static catalog of optimization contexts.
//!
//! Contexts influence copy and labels only; none of them changes what the
//! pipeline does. The catalog is fixed at compile time and rendered in the
//! order defined here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a usage context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextId {
    Ecommerce,
    Instagram,
    Web,
    General,
}

impl ContextId {
    /// All context ids in catalog order.
    pub const ALL: [Self; 4] = [Self::Ecommerce, Self::Instagram, Self::Web, Self::General];

    /// Stable lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ecommerce => "ecommerce",
            Self::Instagram => "instagram",
            Self::Web => "web",
            Self::General => "general",
        }
    }

    /// Catalog entry for this id.
    #[must_use]
    pub fn entry(self) -> &'static ContextEntry {
        let idx = Self::ALL
            .iter()
            .position(|id| *id == self)
            .unwrap_or_default();
        &CATALOG[idx]
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ecommerce" => Ok(Self::Ecommerce),
            "instagram" => Ok(Self::Instagram),
            "web" => Ok(Self::Web),
            "general" => Ok(Self::General),
            other => Err(format!(
                "unknown context {other:?} (expected one of: ecommerce, instagram, web, general)"
            )),
        }
    }
}

/// One selectable usage context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContextEntry {
    pub id: ContextId,
    pub label: &'static str,
    pub description: &'static str,
    /// Short optimization-hint strings shown on the selection card.
    pub hints: [&'static str; 3],
}

/// The full catalog in render order.
pub static CATALOG: [ContextEntry; 4] = [
    ContextEntry {
        id: ContextId::Ecommerce,
        label: "E-commerce",
        description: "Tuned for online stores and marketplaces",
        hints: ["High quality", "Balanced compression", "Preserved details"],
    },
    ContextEntry {
        id: ContextId::Instagram,
        label: "Instagram",
        description: "Perfect for feeds and stories",
        hints: ["1:1 or 9:16 aspect", "Vibrant colors", "Optimized size"],
    },
    ContextEntry {
        id: ContextId::Web,
        label: "Website",
        description: "For sites and landing pages",
        hints: ["Fast loading", "SEO friendly", "Responsive"],
    },
    ContextEntry {
        id: ContextId::General,
        label: "General",
        description: "Versatile, balanced use",
        hints: ["High quality", "Efficient compression", "Compatible"],
    },
];
