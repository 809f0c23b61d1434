//! Paged enumeration executor
//!
//! Drives "fetch a page, continue while more data" against one flat
//! enumeration target. Each page is decoded and released before the next
//! fetch, and the enumeration is closed on every path out of the loop.

use crate::error::{ServiceError, ServiceResult};
use crate::query::decode::{DecodeRecords, EntryDecoder, RawRecords};
use crate::query::request::EnumerationRequest;
use crate::service::{DecodedEntry, DirectoryService, EnumScope, PageStatus, ResumeCursor};
use tracing::{debug, warn};

/// Page accounting for one query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    /// Pages fetched successfully
    pub pages: u64,
    /// Sum of `entries_read` over decoded pages
    pub entries_read: u64,
    /// Last total-size estimate reported by the service
    pub total_hint: u32,
}

/// Entries delivered by a query, and the error that stopped it, if any
///
/// A present `error` means the entries are possibly partial, not
/// necessarily empty.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome<T> {
    pub entries: Vec<T>,
    pub error: Option<ServiceError>,
    pub stats: PageStats,
}

impl<T> QueryOutcome<T> {
    fn failed(error: ServiceError) -> Self {
        Self {
            entries: Vec::new(),
            error: Some(error),
            stats: PageStats::default(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Complete entries, or the error (dropping any partial entries)
    pub fn into_result(self) -> ServiceResult<Vec<T>> {
        match self.error {
            None => Ok(self.entries),
            Some(err) => Err(err),
        }
    }
}

/// Executor for paged enumerations against one service
pub struct PagedQuery<'s, S: DirectoryService + ?Sized> {
    service: &'s S,
}

impl<'s, S: DirectoryService + ?Sized> PagedQuery<'s, S> {
    pub fn new(service: &'s S) -> Self {
        Self { service }
    }

    /// Run `request` to completion, decoding pages with `decoder`
    pub fn run<D: DecodeRecords>(
        &self,
        request: &EnumerationRequest,
        decoder: &D,
    ) -> QueryOutcome<D::Entry> {
        if let Err(err) = request.validate() {
            return QueryOutcome::failed(err);
        }

        let scope = match EnumScope::open(self.service, request.key()) {
            Ok(scope) => scope,
            Err(err) if err.is_empty_result() => {
                debug!("{}: nothing to enumerate ({})", request.key(), err);
                return QueryOutcome {
                    entries: Vec::new(),
                    error: None,
                    stats: PageStats::default(),
                };
            }
            Err(err) => return QueryOutcome::failed(err),
        };

        let mut entries = Vec::new();
        let mut stats = PageStats::default();
        let mut cursor: Option<ResumeCursor> = request.resume().cloned();

        let error = loop {
            let mut page = match scope.fetch(request.capacity(), cursor.as_ref()) {
                Ok(page) => page,
                Err(err) if err.is_empty_result() => break None,
                Err(err) => break Some(err),
            };

            let decoded = decoder.decode(RawRecords {
                kind: page.kind(),
                bytes: page.data(),
                count: page.entries_read() as usize,
            });
            let status = page.status();
            let entries_read = page.entries_read();
            let next = page.take_cursor();
            stats.pages += 1;
            stats.total_hint = page.total_entries();
            page.release();

            match decoded {
                Ok(batch) => {
                    stats.entries_read += u64::from(entries_read);
                    entries.extend(batch);
                }
                Err(err) => break Some(err),
            }

            debug!(
                "{}: page {} read {} entries ({:?})",
                request.key(),
                stats.pages,
                entries_read,
                status
            );

            match status {
                PageStatus::Success => break None,
                PageStatus::MoreData => {
                    let stalled = entries_read == 0 && (next.is_none() || next == cursor);
                    if stalled {
                        break Some(ServiceError::Unknown {
                            code: crate::error::codes::ERROR_MORE_DATA,
                            message: "service reported more data without advancing".into(),
                        });
                    }
                    if next.is_some() {
                        cursor = next;
                    }
                }
            }
        };

        scope.close();

        if let Some(err) = &error {
            warn!(
                "{}: stopped after {} entries: {}",
                request.key(),
                entries.len(),
                err
            );
        }

        QueryOutcome {
            entries,
            error,
            stats,
        }
    }
}

/// Run a flat enumeration, decoding into [`DecodedEntry`] values
pub fn run_paged_query<S: DirectoryService + ?Sized>(
    service: &S,
    request: &EnumerationRequest,
) -> QueryOutcome<DecodedEntry> {
    PagedQuery::new(service).run(request, &EntryDecoder::new(request.kind()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{codes, RequestField};
    use crate::service::{
        Capacity, EnumHandle, MemoryDirectory, PageBuffer, RawPage, RecordKind, RecordWriter,
        RequestKey, Target, WorkstationUserInfo,
    };
    use parking_lot::Mutex;

    fn five_users() -> MemoryDirectory {
        MemoryDirectory::from_json_str(
            r#"{"local_server": "WKS01", "servers": [{"name": "WKS01", "logged_on": [
                {"user": "u1"}, {"user": "u2"}, {"user": "u3"}, {"user": "u4"}, {"user": "u5"}
            ]}]}"#,
        )
        .unwrap()
    }

    fn logged_on(capacity: Capacity) -> EnumerationRequest {
        EnumerationRequest::new(RecordKind::LoggedOnUser, Target::Local).with_capacity(capacity)
    }

    #[test]
    fn test_one_entry_per_page() {
        let service = five_users();
        let outcome = run_paged_query(&service, &logged_on(Capacity::Entries(1)));

        assert!(outcome.is_complete());
        assert_eq!(outcome.entries.len(), 5);
        assert_eq!(outcome.stats.pages, 5);
        assert_eq!(outcome.stats.entries_read, 5);
        assert_eq!(service.counters().fetches, 5);

        let names: Vec<_> = outcome.entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["u1", "u2", "u3", "u4", "u5"]);
    }

    #[test]
    fn test_single_page_short_circuit() {
        let service = five_users();
        let outcome = run_paged_query(&service, &logged_on(Capacity::Unbounded));

        assert_eq!(outcome.entries.len(), 5);
        assert_eq!(service.counters().fetches, 1);
    }

    #[test]
    fn test_partial_results_kept_on_error() {
        let service = five_users();
        service.fail_fetch(
            ".",
            3,
            ServiceError::Unavailable {
                code: codes::ERROR_NETWORK_UNREACHABLE,
            },
        );

        let outcome = run_paged_query(&service, &logged_on(Capacity::Entries(1)));
        assert_eq!(outcome.entries.len(), 2);
        assert!(matches!(outcome.error, Some(ServiceError::Unavailable { .. })));

        let counters = service.counters();
        assert_eq!(counters.fetches, 3);
        assert_eq!(counters.opens, counters.closes);
        assert_eq!(counters.acquired, counters.released);
    }

    #[test]
    fn test_open_failure_attempts_no_pages() {
        let service = five_users();
        service.fail_open(
            ".",
            ServiceError::PermissionDenied {
                target: ".".into(),
            },
        );

        let outcome = run_paged_query(&service, &logged_on(Capacity::Entries(1)));
        assert!(outcome.entries.is_empty());
        assert!(matches!(
            outcome.error,
            Some(ServiceError::PermissionDenied { .. })
        ));
        assert_eq!(service.counters().fetches, 0);
        assert_eq!(service.counters().closes, 0);
    }

    #[test]
    fn test_not_found_is_empty_result() {
        let service = five_users();
        service.fail_open(
            ".",
            ServiceError::NotFound {
                target: ".".into(),
            },
        );

        let outcome = run_paged_query(&service, &logged_on(Capacity::Unbounded));
        assert!(outcome.is_complete());
        assert!(outcome.entries.is_empty());
    }

    #[test]
    fn test_invalid_request_never_opens() {
        let service = five_users();
        let outcome = run_paged_query(&service, &logged_on(Capacity::Bytes(0)));
        assert_eq!(
            outcome.error,
            Some(ServiceError::InvalidParameter {
                field: RequestField::Capacity
            })
        );
        assert!(service.opened_targets().is_empty());
    }

    #[test]
    fn test_resume_from_cursor() {
        let service = five_users();
        let request = logged_on(Capacity::Entries(2));
        let cursor = ResumeCursor::issue(request.key(), 3);

        let outcome = run_paged_query(&service, &request.clone().resuming(cursor));
        let names: Vec<_> = outcome.entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["u4", "u5"]);
    }

    /// Scripted service: returns the given page statuses in order
    struct Scripted {
        script: Mutex<Vec<ServiceResult<(PageStatus, usize)>>>,
        fetches: Mutex<u64>,
        released: Mutex<u64>,
        closed: Mutex<u64>,
        advance: bool,
    }

    impl Scripted {
        fn new(mut script: Vec<ServiceResult<(PageStatus, usize)>>, advance: bool) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                fetches: Mutex::new(0),
                released: Mutex::new(0),
                closed: Mutex::new(0),
                advance,
            }
        }
    }

    impl DirectoryService for Scripted {
        fn open(&self, _key: &RequestKey) -> ServiceResult<EnumHandle> {
            Ok(EnumHandle::new(1))
        }

        fn fetch_page(
            &self,
            _handle: &EnumHandle,
            _capacity: Capacity,
            _cursor: Option<&ResumeCursor>,
        ) -> ServiceResult<RawPage> {
            let mut fetches = self.fetches.lock();
            *fetches += 1;
            let (status, count) = self.script.lock().pop().unwrap_or(Ok((PageStatus::Success, 0)))?;

            let mut writer = RecordWriter::new(RecordKind::LoggedOnUser);
            for i in 0..count {
                let user = WorkstationUserInfo {
                    user: format!("p{}u{}", *fetches, i),
                };
                writer.try_push(&user, None).unwrap();
            }
            let key = RequestKey::new(Target::Local, RecordKind::LoggedOnUser, Default::default());
            let position = if self.advance { *fetches } else { 0 };
            Ok(RawPage {
                status,
                buffer: PageBuffer::new(*fetches, RecordKind::LoggedOnUser, writer.finish()),
                entries_read: count as u32,
                total_entries: 0,
                next_cursor: Some(ResumeCursor::issue(&key, position)),
            })
        }

        fn release_page(&self, _buffer: PageBuffer) {
            *self.released.lock() += 1;
        }

        fn close(&self, _handle: EnumHandle) {
            *self.closed.lock() += 1;
        }
    }

    #[test]
    fn test_loop_terminates_after_script() {
        let service = Scripted::new(
            vec![
                Ok((PageStatus::MoreData, 2)),
                Ok((PageStatus::MoreData, 1)),
                Ok((PageStatus::MoreData, 3)),
                Ok((PageStatus::Success, 1)),
            ],
            true,
        );

        let outcome = run_paged_query(&service, &logged_on(Capacity::Entries(3)));
        assert!(outcome.is_complete());
        assert_eq!(outcome.entries.len(), 7);
        assert_eq!(*service.fetches.lock(), 4);
        assert_eq!(*service.released.lock(), 4);
        assert_eq!(*service.closed.lock(), 1);
    }

    #[test]
    fn test_loop_terminates_on_error_page() {
        let service = Scripted::new(
            vec![
                Ok((PageStatus::MoreData, 2)),
                Err(ServiceError::Unknown {
                    code: 59,
                    message: "unexpected network error".into(),
                }),
            ],
            true,
        );

        let outcome = run_paged_query(&service, &logged_on(Capacity::Entries(2)));
        assert_eq!(outcome.entries.len(), 2);
        assert!(matches!(outcome.error, Some(ServiceError::Unknown { code: 59, .. })));
        assert_eq!(*service.fetches.lock(), 2);
        assert_eq!(*service.released.lock(), 1);
        assert_eq!(*service.closed.lock(), 1);
    }

    #[test]
    fn test_stalled_service_stops() {
        let service = Scripted::new(vec![Ok((PageStatus::MoreData, 0)); 10], false);

        let outcome = run_paged_query(&service, &logged_on(Capacity::Entries(1)));
        assert!(outcome.entries.is_empty());
        assert!(matches!(outcome.error, Some(ServiceError::Unknown { .. })));
        assert!(*service.fetches.lock() <= 2);
        assert_eq!(*service.closed.lock(), 1);
    }

    #[test]
    fn test_empty_success_page() {
        let service = Scripted::new(vec![Ok((PageStatus::Success, 0))], true);
        let outcome = run_paged_query(&service, &logged_on(Capacity::Unbounded));
        assert!(outcome.is_complete());
        assert!(outcome.entries.is_empty());
        assert_eq!(outcome.stats.pages, 1);
    }
}
