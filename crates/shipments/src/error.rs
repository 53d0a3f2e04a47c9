//! Generation and printing errors.

use thiserror::Error;

use forgeship_core::{CompanyId, InfoPackageId, OrderId, RepositoryError, ShipmentId};

use crate::adapter::AdapterError;

/// Error category; drives the HTTP status and operator-facing wording.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Configuration,
    Adapter,
    Serialization,
    Storage,
    Repository,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("info package {0} not found")]
    InfoPackageNotFound(InfoPackageId),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("a shipment already exists for info package {0}")]
    ShipmentAlreadyExists(InfoPackageId),

    #[error("carrier not configured: {0}")]
    CarrierNotConfigured(String),

    #[error("no active shipment type configured for company {0}")]
    TypeShipmentsMissing(CompanyId),

    #[error("no carrier adapter registered for company code '{0}'")]
    AdapterNotRegistered(String),

    #[error("carrier adapter '{code}' failed: {source}")]
    Adapter {
        code: String,
        #[source]
        source: AdapterError,
    },

    #[error("failed to encode shipment payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InfoPackageNotFound(_) | Self::OrderNotFound(_) => ErrorKind::NotFound,
            Self::ShipmentAlreadyExists(_) => ErrorKind::Conflict,
            Self::CarrierNotConfigured(_)
            | Self::TypeShipmentsMissing(_)
            | Self::AdapterNotRegistered(_) => ErrorKind::Configuration,
            Self::Adapter { .. } => ErrorKind::Adapter,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Repository(_) => ErrorKind::Repository,
        }
    }
}

#[derive(Debug, Error)]
pub enum LabelPrintError {
    #[error("shipment {0} not found")]
    ShipmentNotFound(ShipmentId),

    #[error("shipment {0} has no labels")]
    LabelsMissing(ShipmentId),

    #[error("label '{key}' of shipment {shipment_id} is missing and cannot be rebuilt")]
    LabelCorrupt { shipment_id: ShipmentId, key: String },

    #[error("failed to merge labels of shipment {shipment_id}: {reason}")]
    Merge {
        shipment_id: ShipmentId,
        reason: String,
    },

    #[error("label storage failure: {0}")]
    Storage(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl LabelPrintError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ShipmentNotFound(_) => ErrorKind::NotFound,
            Self::LabelsMissing(_) | Self::LabelCorrupt { .. } | Self::Merge { .. } => {
                ErrorKind::Storage
            }
            Self::Storage(_) => ErrorKind::Storage,
            Self::Repository(_) => ErrorKind::Repository,
        }
    }

    /// Message safe to show an operator. Data-integrity problems are not the
    /// user's fault and are not detailed.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::NotFound => self.to_string(),
            _ => "labels unavailable, contact support".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn adapter_error_keeps_its_cause() {
        let err = GenerationError::Adapter {
            code: "mrw".to_string(),
            source: AdapterError::Transport("timeout".to_string()),
        };
        assert_eq!(err.kind(), ErrorKind::Adapter);
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("carrier transport failure: timeout".to_string())
        );
    }

    #[test]
    fn corruption_is_not_detailed_to_users() {
        let err = LabelPrintError::LabelCorrupt {
            shipment_id: ShipmentId::new(3),
            key: "abc".to_string(),
        };
        assert_eq!(err.user_message(), "labels unavailable, contact support");
        assert!(err.to_string().contains("abc"));

        let not_found = LabelPrintError::ShipmentNotFound(ShipmentId::new(3));
        assert_eq!(not_found.user_message(), "shipment 3 not found");
    }

    #[test]
    fn configuration_errors_name_the_entity() {
        let err = GenerationError::TypeShipmentsMissing(CompanyId::new(8));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains('8'));
    }
}
