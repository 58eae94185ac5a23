pub mod devcycle;
pub mod local;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

pub use devcycle::DevCycleProvider;
pub use local::LocalProvider;

// Attribute names shared between the evaluation context and the DevCycle user
const EMAIL: &str = "email";
const NAME: &str = "name";
const LANGUAGE: &str = "language";
const COUNTRY: &str = "country";
const APP_VERSION: &str = "appVersion";
const APP_BUILD: &str = "appBuild";
const CUSTOM_DATA: &str = "customData";
const PRIVATE_CUSTOM_DATA: &str = "privateCustomData";

// User identity sent to the bucketing service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevCycleUser {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "appVersion", skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(rename = "appBuild", skip_serializing_if = "Option::is_none")]
    pub app_build: Option<String>,
    #[serde(rename = "customData", default, skip_serializing_if = "Map::is_empty")]
    pub custom_data: Map<String, Value>,
    #[serde(
        rename = "privateCustomData",
        default,
        skip_serializing_if = "Map::is_empty"
    )]
    pub private_custom_data: Map<String, Value>,
}

impl DevCycleUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

/// Attributes used to personalize an evaluation.
/// `targeting_key` identifies the user; everything else is free-form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationContext {
    pub targeting_key: Option<String>,
    pub attributes: HashMap<String, Value>,
}

impl EvaluationContext {
    pub fn new(targeting_key: impl Into<String>) -> Self {
        Self {
            targeting_key: Some(targeting_key.into()),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl From<&DevCycleUser> for EvaluationContext {
    fn from(user: &DevCycleUser) -> Self {
        let mut context = EvaluationContext::new(user.user_id.clone());

        let named = [
            (EMAIL, &user.email),
            (NAME, &user.name),
            (LANGUAGE, &user.language),
            (COUNTRY, &user.country),
            (APP_VERSION, &user.app_version),
            (APP_BUILD, &user.app_build),
        ];
        for (key, value) in named {
            if let Some(value) = value {
                context
                    .attributes
                    .insert(key.to_string(), Value::String(value.clone()));
            }
        }

        if !user.custom_data.is_empty() {
            context.attributes.insert(
                CUSTOM_DATA.to_string(),
                Value::Object(user.custom_data.clone()),
            );
        }

        if !user.private_custom_data.is_empty() {
            context.attributes.insert(
                PRIVATE_CUSTOM_DATA.to_string(),
                Value::Object(user.private_custom_data.clone()),
            );
        }

        context
    }
}

impl TryFrom<&EvaluationContext> for DevCycleUser {
    type Error = ProviderError;

    fn try_from(context: &EvaluationContext) -> Result<Self, Self::Error> {
        let user_id = context
            .targeting_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ProviderError::TargetingKeyMissing)?;

        let mut user = DevCycleUser::new(user_id);
        let mut loose = Map::new();

        for (key, value) in &context.attributes {
            match (key.as_str(), value) {
                (EMAIL, Value::String(s)) => user.email = Some(s.clone()),
                (NAME, Value::String(s)) => user.name = Some(s.clone()),
                (LANGUAGE, Value::String(s)) => user.language = Some(s.clone()),
                (COUNTRY, Value::String(s)) => user.country = Some(s.clone()),
                (APP_VERSION, Value::String(s)) => user.app_version = Some(s.clone()),
                (APP_BUILD, Value::String(s)) => user.app_build = Some(s.clone()),
                (CUSTOM_DATA, Value::Object(data)) => {
                    user.custom_data
                        .extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                (PRIVATE_CUSTOM_DATA, Value::Object(data)) => {
                    user.private_custom_data
                        .extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                _ => {
                    loose.insert(key.clone(), value.clone());
                }
            }
        }

        // Entries under customData win over loose attributes of the same name
        for (key, value) in loose {
            user.custom_data.entry(key).or_insert(value);
        }

        Ok(user)
    }
}

// A feature as bucketed for a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    #[serde(rename = "_id")]
    pub id: String,
    pub key: String,
    #[serde(rename = "type")]
    pub feature_type: String,
    #[serde(rename = "_variation")]
    pub variation: String,
    #[serde(rename = "variationKey")]
    pub variation_key: String,
    #[serde(rename = "variationName")]
    pub variation_name: String,
    #[serde(rename = "evalReason", skip_serializing_if = "Option::is_none")]
    pub eval_reason: Option<Value>,
}

impl Feature {
    /// True when the feature carries no identifying data at all
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
            && self.key.is_empty()
            && self.variation.is_empty()
            && self.variation_key.is_empty()
            && self.variation_name.is_empty()
    }
}

// A variable value as bucketed for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub key: String,
    #[serde(rename = "type", default)]
    pub variable_type: String,
    pub value: Value,
    #[serde(rename = "isDefaulted", default)]
    pub is_defaulted: bool,
    #[serde(rename = "evalReason", default, skip_serializing_if = "Option::is_none")]
    pub eval_reason: Option<Value>,
}

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("flag not found: {0}")]
    FlagNotFound(String),
    #[error("flag {key} is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
    #[error("evaluation context has no targeting key")]
    TargetingKeyMissing,
    #[error("bucketing api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request to bucketing api failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode flag data: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to read flag file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    FlagNotFound,
    TypeMismatch,
    TargetingKeyMissing,
    ParseError,
    General,
}

impl From<&ProviderError> for ErrorCode {
    fn from(error: &ProviderError) -> Self {
        match error {
            ProviderError::FlagNotFound(_) => ErrorCode::FlagNotFound,
            ProviderError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            ProviderError::TargetingKeyMissing => ErrorCode::TargetingKeyMissing,
            ProviderError::Decode(_) => ErrorCode::ParseError,
            _ => ErrorCode::General,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    TargetingMatch,
    Default,
    Error,
}

// Outcome of a typed flag lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionDetails<T> {
    pub flag_key: String,
    pub value: T,
    pub reason: Reason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl<T> ResolutionDetails<T> {
    fn from_error(flag_key: &str, default: T, error: &ProviderError) -> Self {
        Self {
            flag_key: flag_key.to_string(),
            value: default,
            reason: Reason::Error,
            error_code: Some(ErrorCode::from(error)),
            error_message: Some(error.to_string()),
        }
    }
}

/// Conversion from a raw variable value into the type a caller asked for
pub trait FlagValue: Sized {
    const TYPE_NAME: &'static str;

    fn from_json(value: &Value) -> Option<Self>;
}

impl FlagValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_json(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FlagValue for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn from_json(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FlagValue for f64 {
    const TYPE_NAME: &'static str = "number";

    fn from_json(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FlagValue for Value {
    const TYPE_NAME: &'static str = "json";

    fn from_json(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

// Descriptive information about a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderMetadata {
    pub name: &'static str,
}

/// A source of bucketed variables and features
pub trait FeatureProvider {
    fn metadata(&self) -> ProviderMetadata;

    fn resolve_variable(
        &self,
        key: &str,
        context: &EvaluationContext,
    ) -> impl Future<Output = Result<Variable, ProviderError>> + Send;

    fn all_variables(
        &self,
        context: &EvaluationContext,
    ) -> impl Future<Output = Result<HashMap<String, Variable>, ProviderError>> + Send;

    fn all_features(
        &self,
        context: &EvaluationContext,
    ) -> impl Future<Output = Result<HashMap<String, Feature>, ProviderError>> + Send;
}

#[derive(Debug)]
pub enum FlagProvider {
    DevCycle(DevCycleProvider),
    Local(LocalProvider),
}

impl FeatureProvider for FlagProvider {
    fn metadata(&self) -> ProviderMetadata {
        match self {
            FlagProvider::DevCycle(provider) => provider.metadata(),
            FlagProvider::Local(provider) => provider.metadata(),
        }
    }

    async fn resolve_variable(
        &self,
        key: &str,
        context: &EvaluationContext,
    ) -> Result<Variable, ProviderError> {
        match self {
            FlagProvider::DevCycle(provider) => provider.resolve_variable(key, context).await,
            FlagProvider::Local(provider) => provider.resolve_variable(key, context).await,
        }
    }

    async fn all_variables(
        &self,
        context: &EvaluationContext,
    ) -> Result<HashMap<String, Variable>, ProviderError> {
        match self {
            FlagProvider::DevCycle(provider) => provider.all_variables(context).await,
            FlagProvider::Local(provider) => provider.all_variables(context).await,
        }
    }

    async fn all_features(
        &self,
        context: &EvaluationContext,
    ) -> Result<HashMap<String, Feature>, ProviderError> {
        match self {
            FlagProvider::DevCycle(provider) => provider.all_features(context).await,
            FlagProvider::Local(provider) => provider.all_features(context).await,
        }
    }
}

/// Typed flag lookups over a provider. Lookups never fail: any provider
/// error or type mismatch yields the caller's default.
#[derive(Debug, Clone)]
pub struct FlagClient {
    provider: Arc<FlagProvider>,
}

impl FlagClient {
    pub fn new(provider: FlagProvider) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.metadata().name
    }

    pub async fn get_details<T: FlagValue>(
        &self,
        key: &str,
        default: T,
        context: &EvaluationContext,
    ) -> ResolutionDetails<T> {
        let variable = match self.provider.resolve_variable(key, context).await {
            Ok(variable) => variable,
            Err(e) => {
                warn!(flag = key, error = %e, "Flag evaluation failed, using default");
                return ResolutionDetails::from_error(key, default, &e);
            }
        };

        match T::from_json(&variable.value) {
            Some(value) => ResolutionDetails {
                flag_key: key.to_string(),
                value,
                reason: if variable.is_defaulted {
                    Reason::Default
                } else {
                    Reason::TargetingMatch
                },
                error_code: None,
                error_message: None,
            },
            None => {
                let e = ProviderError::TypeMismatch {
                    key: key.to_string(),
                    expected: T::TYPE_NAME,
                };
                warn!(flag = key, error = %e, "Flag evaluation failed, using default");
                ResolutionDetails::from_error(key, default, &e)
            }
        }
    }

    pub async fn get_string_details(
        &self,
        key: &str,
        default: &str,
        context: &EvaluationContext,
    ) -> ResolutionDetails<String> {
        self.get_details(key, default.to_string(), context).await
    }

    pub async fn get_string_value(
        &self,
        key: &str,
        default: &str,
        context: &EvaluationContext,
    ) -> String {
        self.get_string_details(key, default, context).await.value
    }

    pub async fn get_boolean_details(
        &self,
        key: &str,
        default: bool,
        context: &EvaluationContext,
    ) -> ResolutionDetails<bool> {
        self.get_details(key, default, context).await
    }

    pub async fn get_boolean_value(
        &self,
        key: &str,
        default: bool,
        context: &EvaluationContext,
    ) -> bool {
        self.get_boolean_details(key, default, context).await.value
    }

    pub async fn get_number_value(
        &self,
        key: &str,
        default: f64,
        context: &EvaluationContext,
    ) -> f64 {
        self.get_details(key, default, context).await.value
    }

    pub async fn get_json_value(
        &self,
        key: &str,
        default: Value,
        context: &EvaluationContext,
    ) -> Value {
        self.get_details(key, default, context).await.value
    }

    /// All features bucketed for the context; empty if the provider fails
    pub async fn all_features(&self, context: &EvaluationContext) -> HashMap<String, Feature> {
        self.provider
            .all_features(context)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to fetch features");
                HashMap::new()
            })
    }

    /// All variables bucketed for the context; empty if the provider fails
    pub async fn all_variables(&self, context: &EvaluationContext) -> HashMap<String, Variable> {
        self.provider
            .all_variables(context)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to fetch variables");
                HashMap::new()
            })
    }
}
