//! API configuration

use std::path::Path;
use std::time::Duration;

use core_kernel::CoreError;
use domain_claims::{
    DecisionTable, DecisionTablePolicy, FormatterConfig, InstructionPolicy, IssueCatalogPolicy,
    OrchestratorConfig, PersistConfig, PolicyChain, ValidatorConfig,
};
use infra_storage::{StorageBackend, StorageConfig, StorageError};
use serde::Deserialize;

use crate::error::StartupError;

/// API configuration
///
/// List-valued settings (`storage_buckets`, `required_fields`) are
/// comma-separated so they can come from a single environment variable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Log level
    pub log_level: String,
    /// `memory` or `filesystem`
    pub storage_backend: String,
    /// Root directory for the filesystem backend
    pub storage_root: String,
    /// Buckets created at startup
    pub storage_buckets: String,
    /// Whether the filesystem backend creates unknown buckets on first write
    pub storage_create_buckets: bool,
    pub stage_timeout_secs: u64,
    pub persist_timeout_secs: u64,
    /// Fields a claim must carry, in prompt order
    pub required_fields: String,
    pub edi_sender_id: String,
    pub edi_receiver_id: String,
    /// ISA15: `P` production, `T` test
    pub edi_usage_indicator: String,
    /// Optional decision table (JSON) consulted by the post-adjudication checker
    pub decision_table: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let formatter = FormatterConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            log_level: "info".to_string(),
            storage_backend: "memory".to_string(),
            storage_root: "./data".to_string(),
            storage_buckets: "claims-intake".to_string(),
            storage_create_buckets: false,
            stage_timeout_secs: 30,
            persist_timeout_secs: 10,
            required_fields: ValidatorConfig::default().required_fields.join(","),
            edi_sender_id: formatter.sender_id,
            edi_receiver_id: formatter.receiver_id,
            edi_usage_indicator: formatter.usage_indicator,
            decision_table: String::new(),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// ISA06/ISA08 are fixed 15-byte fields
const INTERCHANGE_ID_MAX: usize = 15;

fn validate_interchange_id(name: &str, id: &str) -> Result<(), CoreError> {
    if id.trim().is_empty() {
        return Err(CoreError::configuration(format!("{} must not be empty", name)));
    }
    if !id.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
        return Err(CoreError::configuration(format!(
            "{} must be printable ASCII",
            name
        )));
    }
    if id.len() > INTERCHANGE_ID_MAX {
        return Err(CoreError::configuration(format!(
            "{} must be at most {} characters",
            name, INTERCHANGE_ID_MAX
        )));
    }
    Ok(())
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Rejects settings the server cannot start with
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(CoreError::configuration("jwt_secret must not be empty"));
        }
        if self.stage_timeout_secs == 0 || self.persist_timeout_secs == 0 {
            return Err(CoreError::configuration("timeouts must be at least one second"));
        }
        for (name, id) in [
            ("edi_sender_id", &self.edi_sender_id),
            ("edi_receiver_id", &self.edi_receiver_id),
        ] {
            validate_interchange_id(name, id)?;
        }
        if !matches!(self.edi_usage_indicator.as_str(), "P" | "T") {
            return Err(CoreError::configuration(
                "edi_usage_indicator must be P or T",
            ));
        }
        Ok(())
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn buckets(&self) -> Vec<String> {
        split_list(&self.storage_buckets)
    }

    /// Storage backend settings
    pub fn storage_config(&self) -> Result<StorageConfig, StorageError> {
        let backend: StorageBackend = self.storage_backend.parse()?;
        let mut config = match backend {
            StorageBackend::Memory => StorageConfig::memory(self.buckets()),
            StorageBackend::Filesystem => {
                StorageConfig::filesystem(&self.storage_root).with_buckets(self.buckets())
            }
        };
        config.create_buckets = self.storage_create_buckets;
        Ok(config)
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        let required = split_list(&self.required_fields);
        if required.is_empty() {
            return ValidatorConfig::default();
        }
        ValidatorConfig {
            required_fields: required,
        }
    }

    /// Formatter settings; the formatter shares the validator's required fields
    pub fn formatter_config(&self) -> FormatterConfig {
        FormatterConfig {
            sender_id: self.edi_sender_id.clone(),
            receiver_id: self.edi_receiver_id.clone(),
            usage_indicator: self.edi_usage_indicator.clone(),
            required_fields: self.validator_config().required_fields,
            ..FormatterConfig::default()
        }
    }

    pub fn persist_config(&self) -> PersistConfig {
        PersistConfig {
            timeout: Duration::from_secs(self.persist_timeout_secs),
        }
    }

    /// Classification policies for the checker
    ///
    /// Caller instructions always win. A configured decision table is
    /// consulted next, ahead of the built-in issue catalog.
    pub fn checker_policy(&self) -> Result<PolicyChain, StartupError> {
        let path = self.decision_table.trim();
        if path.is_empty() {
            return Ok(PolicyChain::standard());
        }
        let table = DecisionTable::from_file(Path::new(path)).map_err(|source| {
            StartupError::DecisionTable {
                path: path.to_string(),
                source,
            }
        })?;
        Ok(PolicyChain::new()
            .with(InstructionPolicy)
            .with(DecisionTablePolicy::new(table))
            .with(IssueCatalogPolicy))
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            stage_timeout: Duration::from_secs(self.stage_timeout_secs),
        }
    }
}
