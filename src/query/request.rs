//! Enumeration requests

use crate::error::{RequestField, ServiceError, ServiceResult};
use crate::service::{Capacity, Filter, RecordKind, RequestKey, ResumeCursor, Target};

/// One enumeration call: key, page capacity and optional resume point
///
/// Immutable once built; the builder methods consume and return it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationRequest {
    key: RequestKey,
    capacity: Capacity,
    resume: Option<ResumeCursor>,
}

impl EnumerationRequest {
    /// Request `kind` records from `target` with the kind's default filter
    pub fn new(kind: RecordKind, target: Target) -> Self {
        Self {
            key: RequestKey::new(target, kind, kind.default_filter()),
            capacity: Capacity::Unbounded,
            resume: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.key.filter = filter;
        self
    }

    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Continue an earlier enumeration of the same key
    pub fn resuming(mut self, cursor: ResumeCursor) -> Self {
        self.resume = Some(cursor);
        self
    }

    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn kind(&self) -> RecordKind {
        self.key.kind
    }

    pub fn target(&self) -> &Target {
        &self.key.target
    }

    pub fn filter(&self) -> &Filter {
        &self.key.filter
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn resume(&self) -> Option<&ResumeCursor> {
        self.resume.as_ref()
    }

    /// Reject malformed requests before anything is opened
    pub fn validate(&self) -> ServiceResult<()> {
        self.key.validate()?;

        if !self.capacity.is_usable() {
            return Err(ServiceError::InvalidParameter {
                field: RequestField::Capacity,
            });
        }

        if let Some(cursor) = &self.resume {
            if !cursor.belongs_to(&self.key) {
                return Err(ServiceError::InvalidParameter {
                    field: RequestField::Resume,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::AccountType;

    #[test]
    fn test_defaults() {
        let request = EnumerationRequest::new(RecordKind::Account, Target::Local);
        assert_eq!(request.filter(), &Filter::Accounts(AccountType::Normal));
        assert_eq!(request.capacity(), Capacity::Unbounded);
        assert!(request.resume().is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let request = EnumerationRequest::new(RecordKind::Share, Target::Local)
            .with_capacity(Capacity::Entries(0));
        assert_eq!(
            request.validate(),
            Err(ServiceError::InvalidParameter {
                field: RequestField::Capacity
            })
        );
    }

    #[test]
    fn test_cursor_from_other_request_rejected() {
        let shares = EnumerationRequest::new(RecordKind::Share, Target::server("FILESRV"));
        let cursor = ResumeCursor::issue(shares.key(), 2);

        let resumed = shares.clone().resuming(cursor.clone());
        assert!(resumed.validate().is_ok());

        let elsewhere =
            EnumerationRequest::new(RecordKind::Share, Target::server("PRINTSRV")).resuming(cursor);
        assert_eq!(
            elsewhere.validate(),
            Err(ServiceError::InvalidParameter {
                field: RequestField::Resume
            })
        );
    }
}
