use serde::{Deserialize, Serialize};
use std::fmt;

/// Abstract request kinds used to pick eligible providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestCategory {
    Reasoning,
    Search,
    Generation,
    Analysis,
    FactCheck,
}

impl RequestCategory {
    pub const ALL: [RequestCategory; 5] = [
        RequestCategory::Reasoning,
        RequestCategory::Search,
        RequestCategory::Generation,
        RequestCategory::Analysis,
        RequestCategory::FactCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestCategory::Reasoning => "reasoning",
            RequestCategory::Search => "search",
            RequestCategory::Generation => "generation",
            RequestCategory::Analysis => "analysis",
            RequestCategory::FactCheck => "fact_check",
        }
    }
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reasoning" => Ok(RequestCategory::Reasoning),
            "search" => Ok(RequestCategory::Search),
            "generation" => Ok(RequestCategory::Generation),
            "analysis" => Ok(RequestCategory::Analysis),
            "fact_check" | "factcheck" => Ok(RequestCategory::FactCheck),
            other => Err(format!("unknown request category '{other}'")),
        }
    }
}
