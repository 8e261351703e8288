// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArgoCDOperatorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Finalizer error: {0}")]
    FinalizerError(#[source] Box<kube::runtime::finalizer::Error<ArgoCDOperatorError>>),

    #[error("illegal SSO configuration: {0}")]
    IllegalSSOConfiguration(String),

    #[error("one or more mutation functions could not be applied: {0}")]
    MutationFailed(String),

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("Failed to load template {path}: {reason}")]
    TemplateError { path: String, reason: String },

    #[error("invalid value {value:?} for {key}")]
    InvalidConfig { key: &'static str, value: String },

    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<kube::runtime::finalizer::Error<ArgoCDOperatorError>> for ArgoCDOperatorError {
    fn from(error: kube::runtime::finalizer::Error<ArgoCDOperatorError>) -> Self {
        Self::FinalizerError(Box::new(error))
    }
}

impl ArgoCDOperatorError {
    /// True when the error means the requested object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::KubeError(kube::Error::Api(err)) => err.code == 404,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArgoCDOperatorError>;
