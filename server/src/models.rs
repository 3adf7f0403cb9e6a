use std::sync::Arc;

use msgbridge_protocol::client::ModelCard;
use msgbridge_protocol::client::ModelList;

use crate::error::GatewayError;
use crate::error::Result;

const DEFAULT_MODELS: &[&str] = &[
    "claude-3-haiku-20240307",
    "claude-3-sonnet-20240229",
    "claude-3-opus-20240229",
    "claude-3-5-sonnet-20240620",
];

/// Ordered set of model ids the gateway forwards. The first entry is the
/// fallback for unknown or missing model names.
///
/// Built once at startup; cloning shares the same list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAllowlist {
    models: Arc<[String]>,
}

impl ModelAllowlist {
    pub fn new<I, S>(models: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for model in models {
            let model: String = model.into();
            let model = model.trim();
            if model.is_empty() || unique.iter().any(|m| m == model) {
                continue;
            }
            unique.push(model.to_string());
        }
        if unique.is_empty() {
            return Err(GatewayError::Configuration(
                "model allowlist must contain at least one model".to_string(),
            ));
        }
        Ok(Self {
            models: unique.into(),
        })
    }

    pub fn default_model(&self) -> &str {
        // `new` guarantees at least one entry.
        self.models.first().map(String::as_str).unwrap_or_default()
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    /// Maps the requested model onto the allowlist.
    pub fn resolve<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(model) if self.contains(model) => model,
            _ => self.default_model(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(String::as_str)
    }

    pub fn to_model_list(&self) -> ModelList {
        ModelList {
            object: "list".to_string(),
            data: self
                .iter()
                .map(|id| ModelCard {
                    id: id.to_string(),
                    object: "model".to_string(),
                    owned_by: "user".to_string(),
                })
                .collect(),
        }
    }
}

impl Default for ModelAllowlist {
    fn default() -> Self {
        Self {
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }
}
