use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use super::{
    DevCycleUser, EvaluationContext, Feature, FeatureProvider, ProviderError, ProviderMetadata,
    Variable,
};

// On-disk layout of a local flag file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlagFile {
    variables: HashMap<String, Value>,
    features: HashMap<String, Feature>,
}

/// Serves fixed variable values and features from memory.
/// Every user gets the same answers.
#[derive(Debug, Default, Clone)]
pub struct LocalProvider {
    variables: HashMap<String, Value>,
    features: HashMap<String, Feature>,
}

impl LocalProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load variables and features from a JSON file shaped like
    /// `{ "variables": { "key": value }, "features": { "key": { ... } } }`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ProviderError> {
        let file: FlagFile = serde_json::from_str(raw)?;

        // Features in the file may omit their own key
        let features = file
            .features
            .into_iter()
            .map(|(key, mut feature)| {
                if feature.key.is_empty() {
                    feature.key = key.clone();
                }
                (key, feature)
            })
            .collect();

        Ok(Self {
            variables: file.variables,
            features,
        })
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: Value) -> Self {
        self.variables.insert(key.into(), value);
        self
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.insert(feature.key.clone(), feature);
        self
    }

    fn variable(&self, key: &str) -> Option<Variable> {
        self.variables.get(key).map(|value| Variable {
            id: String::new(),
            key: key.to_string(),
            variable_type: variable_type(value).to_string(),
            value: value.clone(),
            is_defaulted: false,
            eval_reason: None,
        })
    }
}

fn variable_type(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "String",
        Value::Bool(_) => "Boolean",
        Value::Number(_) => "Number",
        _ => "JSON",
    }
}

impl FeatureProvider for LocalProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata { name: "local" }
    }

    async fn resolve_variable(
        &self,
        key: &str,
        context: &EvaluationContext,
    ) -> Result<Variable, ProviderError> {
        DevCycleUser::try_from(context)?;

        self.variable(key)
            .ok_or_else(|| ProviderError::FlagNotFound(key.to_string()))
    }

    async fn all_variables(
        &self,
        context: &EvaluationContext,
    ) -> Result<HashMap<String, Variable>, ProviderError> {
        DevCycleUser::try_from(context)?;

        Ok(self
            .variables
            .keys()
            .filter_map(|key| self.variable(key).map(|v| (key.clone(), v)))
            .collect())
    }

    async fn all_features(
        &self,
        context: &EvaluationContext,
    ) -> Result<HashMap<String, Feature>, ProviderError> {
        DevCycleUser::try_from(context)?;

        Ok(self.features.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FLAG_FILE: &str = r#"
    {
        "variables": {
            "togglebot-speed": "fast",
            "togglebot-wink": true
        },
        "features": {
            "hello-togglebot": {
                "_id": "6216420c2ea68943c8833c09",
                "type": "release",
                "_variation": "6216420c2ea68943c8833c0b",
                "variationKey": "variation-on",
                "variationName": "Variation On"
            }
        }
    }
    "#;

    #[tokio::test]
    async fn test_from_json() {
        let provider = LocalProvider::from_json(FLAG_FILE).unwrap();
        let context = EvaluationContext::new("my-user");

        let speed = provider
            .resolve_variable("togglebot-speed", &context)
            .await
            .unwrap();
        assert_eq!(speed.value, json!("fast"));
        assert_eq!(speed.variable_type, "String");

        let features = provider.all_features(&context).await.unwrap();
        let feature = &features["hello-togglebot"];
        assert_eq!(feature.key, "hello-togglebot");
        assert_eq!(feature.variation_name, "Variation On");

        let variables = provider.all_variables(&context).await.unwrap();
        assert_eq!(variables.len(), 2);
        assert_eq!(variables["togglebot-wink"].variable_type, "Boolean");
    }

    #[tokio::test]
    async fn test_unknown_variable() {
        let provider = LocalProvider::new();
        let context = EvaluationContext::new("my-user");

        let result = provider.resolve_variable("togglebot-speed", &context).await;
        assert!(matches!(result, Err(ProviderError::FlagNotFound(key)) if key == "togglebot-speed"));
    }

    #[tokio::test]
    async fn test_example_flag_file() {
        let provider = LocalProvider::from_json(include_str!("../../flags.example.json")).unwrap();
        let context = EvaluationContext::new("my-user");

        let features = provider.all_features(&context).await.unwrap();
        assert_eq!(features["hello-togglebot"].key, "hello-togglebot");
        assert!(provider.resolve_variable("example-text", &context).await.is_ok());
    }

    #[test]
    fn test_malformed_file() {
        let result = LocalProvider::from_json("{ \"variables\": [] }");
        assert!(matches!(result, Err(ProviderError::Decode(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = LocalProvider::from_file("does/not/exist.json");
        assert!(matches!(result, Err(ProviderError::Io(_))));
    }
}
