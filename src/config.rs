//! # Walk Configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Options of one dependency walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Skip dependency analysis and emit in raw walk order. Used when
    /// generating the foundational types the scheduler itself relies on.
    pub bootstrap: bool,
}

impl WalkConfig {
    pub fn bootstrap() -> Self {
        Self { bootstrap: true }
    }

    /// Read the options from generator attributes. `bootstrap` is only
    /// enabled by the exact value `"true"`.
    pub fn from_attributes(attributes: &HashMap<String, String>) -> Self {
        Self {
            bootstrap: attributes.get("bootstrap").map(|v| v == "true").unwrap_or(false),
        }
    }
}
