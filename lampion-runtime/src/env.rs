//! Process environment the Lambda platform provides.

use std::env;

use crate::error::BootstrapError;

/// How the execution environment was initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitializationType {
    #[default]
    OnDemand,
    ProvisionedConcurrency,
    SnapStart,
}

impl InitializationType {
    /// Parse the `AWS_LAMBDA_INITIALIZATION_TYPE` value.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "on-demand" => Some(Self::OnDemand),
            "provisioned-concurrency" => Some(Self::ProvisionedConcurrency),
            "snap-start" => Some(Self::SnapStart),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnDemand => "on-demand",
            Self::ProvisionedConcurrency => "provisioned-concurrency",
            Self::SnapStart => "snap-start",
        }
    }
}

/// Process-wide configuration read once at startup.
///
/// Tests construct this directly instead of mutating the process
/// environment; [`LambdaEnvironment::from_env`] is the production path.
#[derive(Debug, Clone)]
pub struct LambdaEnvironment {
    /// Host and port of the Runtime API (`AWS_LAMBDA_RUNTIME_API`).
    pub runtime_api: String,
    pub function_name: String,
    pub function_version: String,
    /// Memory available to the function in MB.
    pub memory_limit_mb: i32,
    pub log_group: String,
    pub log_stream: String,
    /// The configured handler string (`_HANDLER`).
    pub handler: String,
    pub execution_env: String,
    pub initialization_type: InitializationType,
}

impl Default for LambdaEnvironment {
    fn default() -> Self {
        Self {
            runtime_api: String::new(),
            function_name: String::new(),
            function_version: "$LATEST".to_string(),
            memory_limit_mb: 128,
            log_group: String::new(),
            log_stream: String::new(),
            handler: String::new(),
            execution_env: String::new(),
            initialization_type: InitializationType::OnDemand,
        }
    }
}

impl LambdaEnvironment {
    /// Reads the variables the platform sets. Only `AWS_LAMBDA_RUNTIME_API`
    /// is required; everything else falls back to its default.
    pub fn from_env() -> Result<Self, BootstrapError> {
        let runtime_api = env::var("AWS_LAMBDA_RUNTIME_API")
            .map_err(|_| BootstrapError::MissingEnv("AWS_LAMBDA_RUNTIME_API"))?;

        Ok(Self {
            runtime_api,
            function_name: env::var("AWS_LAMBDA_FUNCTION_NAME").unwrap_or_default(),
            function_version: env::var("AWS_LAMBDA_FUNCTION_VERSION")
                .unwrap_or_else(|_| "$LATEST".to_string()),
            memory_limit_mb: env::var("AWS_LAMBDA_FUNCTION_MEMORY_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(128),
            log_group: env::var("AWS_LAMBDA_LOG_GROUP_NAME").unwrap_or_default(),
            log_stream: env::var("AWS_LAMBDA_LOG_STREAM_NAME").unwrap_or_default(),
            handler: env::var("_HANDLER").unwrap_or_default(),
            execution_env: env::var("AWS_EXECUTION_ENV").unwrap_or_default(),
            initialization_type: env::var("AWS_LAMBDA_INITIALIZATION_TYPE")
                .ok()
                .and_then(|v| InitializationType::from_str(&v))
                .unwrap_or_default(),
        })
    }

    /// Writes the invocation's trace id to `_X_AMZN_TRACE_ID` so X-Ray SDKs
    /// reading the process environment observe it. This is the only place
    /// the process environment is mutated, once per invocation before the
    /// handler runs.
    pub fn propagate_trace_id(&self, trace_id: &str) {
        env::set_var("_X_AMZN_TRACE_ID", trace_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization_type_round_trip() {
        for s in ["on-demand", "provisioned-concurrency", "snap-start"] {
            assert_eq!(InitializationType::from_str(s).unwrap().as_str(), s);
        }
        assert!(InitializationType::from_str("lambda-managed").is_none());
    }

    #[test]
    fn test_defaults() {
        let env = LambdaEnvironment::default();
        assert_eq!(env.function_version, "$LATEST");
        assert_eq!(env.memory_limit_mb, 128);
        assert_eq!(env.initialization_type, InitializationType::OnDemand);
    }

    // The only test that touches the process environment; kept as a single
    // sequential block so parallel tests never race on these variables.
    #[test]
    fn test_from_env() {
        env::set_var("AWS_LAMBDA_RUNTIME_API", "127.0.0.1:9001");
        env::set_var("AWS_LAMBDA_FUNCTION_NAME", "my-function");
        env::set_var("AWS_LAMBDA_FUNCTION_MEMORY_SIZE", "512");
        env::set_var("AWS_LAMBDA_INITIALIZATION_TYPE", "snap-start");

        let env_config = LambdaEnvironment::from_env().unwrap();
        assert_eq!(env_config.runtime_api, "127.0.0.1:9001");
        assert_eq!(env_config.function_name, "my-function");
        assert_eq!(env_config.memory_limit_mb, 512);
        assert_eq!(
            env_config.initialization_type,
            InitializationType::SnapStart
        );

        env::remove_var("AWS_LAMBDA_RUNTIME_API");
        env::remove_var("AWS_LAMBDA_FUNCTION_NAME");
        env::remove_var("AWS_LAMBDA_FUNCTION_MEMORY_SIZE");
        env::remove_var("AWS_LAMBDA_INITIALIZATION_TYPE");

        assert!(matches!(
            LambdaEnvironment::from_env(),
            Err(BootstrapError::MissingEnv("AWS_LAMBDA_RUNTIME_API"))
        ));
    }
}
