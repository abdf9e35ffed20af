//! Turns a pair of schema trees into DDL by way of an external diff service.
//!
//! [`diff_ddl`] never fails: validation problems, transport errors and
//! server errors all come back as human readable strings in
//! [`DiffDdlResult::errors`].

use async_trait::async_trait;
use errors::ErrorMetadataAnyhowExt;
use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    metadata::{
        DatabaseMetadata,
        Engine,
    },
    metrics::{
        ddl_diff_timer,
        log_ddl_diff_error,
        log_validation_errors,
    },
};

mod http_service;
mod validator;

pub use self::{
    http_service::{
        DdlDiffServiceConfig,
        HttpDdlDiffService,
    },
    validator::{
        SchemaValidator,
        StructuralValidator,
    },
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffMetadataRequest {
    pub source_metadata: DatabaseMetadata,
    pub target_metadata: DatabaseMetadata,
    pub engine: Engine,
    pub classification_from_config: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiffMetadataResponse {
    /// Empty when the trees need no DDL.
    pub diff: String,
}

/// The remote service that generates DDL for a metadata diff.
#[async_trait]
pub trait DdlDiffService: Send + Sync {
    async fn diff_metadata(
        &self,
        request: DiffMetadataRequest,
    ) -> anyhow::Result<DiffMetadataResponse>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffDdlResult {
    pub statement: String,
    pub errors: Vec<String>,
}

impl DiffDdlResult {
    fn failed(errors: Vec<String>) -> Self {
        Self {
            statement: String::new(),
            errors,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub async fn diff_ddl(
    service: &dyn DdlDiffService,
    validator: &dyn SchemaValidator,
    source: &DatabaseMetadata,
    target: &DatabaseMetadata,
    engine: Engine,
    classification_from_config: bool,
) -> DiffDdlResult {
    if source == target {
        return DiffDdlResult::default();
    }
    let timer = ddl_diff_timer();

    let validation_errors = validator.validate(target, engine);
    if !validation_errors.is_empty() {
        tracing::info!(
            "Refusing to diff {}: {} validation errors",
            target.name,
            validation_errors.len()
        );
        log_validation_errors(validation_errors.len());
        timer.finish_developer_error();
        return DiffDdlResult::failed(validation_errors);
    }

    let request = DiffMetadataRequest {
        source_metadata: source.clone(),
        target_metadata: target.clone(),
        engine,
        classification_from_config,
    };
    match service.diff_metadata(request).await {
        Ok(response) => {
            timer.finish();
            DiffDdlResult {
                statement: response.diff,
                errors: vec![],
            }
        },
        Err(e) => {
            tracing::warn!("DDL diff for {} failed: {e:#}", target.name);
            log_ddl_diff_error(&e);
            if e.is_deterministic_user_error() {
                timer.finish_developer_error();
            }
            DiffDdlResult::failed(vec![e.user_facing_message()])
        },
    }
}
