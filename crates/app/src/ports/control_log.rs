//! Control log port — append-only persistence for control events.

use std::future::Future;

use coolhub_domain::error::CoolHubError;
use coolhub_domain::event::{ControlEvent, EventKind, TimeRange};

/// Append-only store of [`ControlEvent`]s.
///
/// The coordinator is the only writer. `append` must not return before the
/// event is durably recorded: the coordinator publishes commands only after
/// their justifying event has been acknowledged.
pub trait ControlLog {
    /// Durably append an event.
    fn append(
        &self,
        event: ControlEvent,
    ) -> impl Future<Output = Result<ControlEvent, CoolHubError>> + Send;

    /// Events whose timestamp lies in `range`, in append order.
    fn query(
        &self,
        range: TimeRange,
    ) -> impl Future<Output = Result<Vec<ControlEvent>, CoolHubError>> + Send;

    /// The most recent events, newest first.
    fn recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ControlEvent>, CoolHubError>> + Send;

    /// The most recently appended event of the given kind.
    fn last_of_kind(
        &self,
        kind: EventKind,
    ) -> impl Future<Output = Result<Option<ControlEvent>, CoolHubError>> + Send;
}

impl<T: ControlLog + Send + Sync> ControlLog for std::sync::Arc<T> {
    fn append(
        &self,
        event: ControlEvent,
    ) -> impl Future<Output = Result<ControlEvent, CoolHubError>> + Send {
        (**self).append(event)
    }

    fn query(
        &self,
        range: TimeRange,
    ) -> impl Future<Output = Result<Vec<ControlEvent>, CoolHubError>> + Send {
        (**self).query(range)
    }

    fn recent(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ControlEvent>, CoolHubError>> + Send {
        (**self).recent(limit)
    }

    fn last_of_kind(
        &self,
        kind: EventKind,
    ) -> impl Future<Output = Result<Option<ControlEvent>, CoolHubError>> + Send {
        (**self).last_of_kind(kind)
    }
}
