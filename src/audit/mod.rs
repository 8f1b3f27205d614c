//! Change-audit pipeline.
//!
//! Every authorized mutation of a recognized resource kind leaves one
//! immutable version entry: the before-image, the field-level diff, and the
//! acting principal. Capture is decoupled from persistence by a broadcast
//! channel so a failing audit write can never unwind a business mutation
//! that already committed; the listener logs such failures instead.

mod diff;
mod store;

pub use diff::{changes_to_value, diff_states, ChangeSet, FieldChange};
pub use store::{ChainStatus, VersionStore};

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{VersionEvent, VersionRecord};

/// Request context attached to audit entries (IP, User-Agent).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract context from request headers. The client address prefers
    /// `x-forwarded-for` (first hop) over `x-real-ip`.
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }
}

/// Channel carrying captured version records to the persistence listener.
pub type VersionBus = broadcast::Sender<VersionRecord>;

pub fn version_channel() -> (VersionBus, broadcast::Receiver<VersionRecord>) {
    broadcast::channel(1024)
}

/// Keyed lookup into whatever owns the business records, used to read the
/// before-state of the target prior to mutation.
#[async_trait]
pub trait RecordLookup: Send + Sync {
    async fn find_by_id(
        &self,
        kind: &str,
        id: &str,
    ) -> Result<Option<Map<String, Value>>, AppError>;
}

/// The before-image of one target record, taken prior to its mutation.
#[derive(Debug, Clone)]
pub struct CapturedState {
    pub kind: String,
    pub id: String,
    pub state: Option<Map<String, Value>>,
}

impl CapturedState {
    pub fn exists(&self) -> bool {
        self.state.is_some()
    }

    /// The event actually recorded. When nothing pre-existed the mutation is
    /// a create, whatever the request called itself.
    pub fn effective_event(&self, nominal: VersionEvent) -> VersionEvent {
        if self.state.is_none() {
            VersionEvent::Create
        } else {
            nominal
        }
    }

    /// Field-level diff of this before-image against the post-mutation state.
    pub fn changes_against(&self, after: Option<&Map<String, Value>>) -> ChangeSet {
        let empty = Map::new();
        diff_states(
            self.state.as_ref().unwrap_or(&empty),
            after.unwrap_or(&empty),
        )
    }
}

/// Captures before/after state of mutated records and publishes version
/// entries for the recognized resource kinds.
pub struct ChangeAuditor {
    kinds: HashSet<String>,
    lookup: Arc<dyn RecordLookup>,
    bus: VersionBus,
}

impl ChangeAuditor {
    pub fn new(kinds: HashSet<String>, lookup: Arc<dyn RecordLookup>, bus: VersionBus) -> Self {
        Self { kinds, lookup, bus }
    }

    /// Whether mutations of `kind` are captured at all.
    pub fn observes(&self, kind: &str) -> bool {
        self.kinds.contains(kind)
    }

    /// Read the target's current state before the mutation runs. Returns
    /// `None` for unrecognized kinds, which skips auditing for the request.
    pub async fn capture_before(
        &self,
        kind: &str,
        id: &str,
    ) -> Result<Option<CapturedState>, AppError> {
        if !self.observes(kind) {
            return Ok(None);
        }

        let state = self.lookup.find_by_id(kind, id).await?;
        Ok(Some(CapturedState {
            kind: kind.to_string(),
            id: id.to_string(),
            state,
        }))
    }

    /// Publish one version entry, unless the skip rules apply: a create or
    /// update that changed nothing, or a destroy of something that never
    /// existed. Returns whether an entry was published.
    ///
    /// Publication is fire-and-forget; persistence happens in the listener
    /// and its failures never propagate back here.
    pub fn record(
        &self,
        event: VersionEvent,
        actor: Option<Uuid>,
        before: &CapturedState,
        changes: &ChangeSet,
        context: &RequestContext,
    ) -> bool {
        if !self.observes(&before.kind) {
            return false;
        }

        match event {
            VersionEvent::Create | VersionEvent::Update if changes.is_empty() => {
                tracing::debug!(
                    item_type = %before.kind,
                    item_id = %before.id,
                    event = %event,
                    "no changes, skipping version entry"
                );
                return false;
            }
            VersionEvent::Destroy if !before.exists() => {
                tracing::debug!(
                    item_type = %before.kind,
                    item_id = %before.id,
                    "destroy of a nonexistent record, skipping version entry"
                );
                return false;
            }
            _ => {}
        }

        let record = VersionRecord {
            id: Uuid::new_v4(),
            event,
            actor_id: actor,
            item_type: before.kind.clone(),
            item_id: before.id.clone(),
            object: before.state.clone().map(Value::Object),
            object_changes: changes_to_value(changes),
            source_ip: context.ip.clone(),
            created_at: Utc::now(),
        };

        let _ = self.bus.send(record);
        true
    }
}

/// Drain the version bus into durable storage.
///
/// Runs until every sender is gone. Failed appends are reported through the
/// error log only; the mutation they describe has already committed.
pub async fn start_version_listener(
    mut rx: broadcast::Receiver<VersionRecord>,
    store: VersionStore,
) {
    tracing::info!("version listener started");
    loop {
        match rx.recv().await {
            Ok(record) => {
                if let Err(err) = store.append(&record).await {
                    tracing::error!(
                        item_type = %record.item_type,
                        item_id = %record.item_id,
                        error = %err,
                        "failed to persist version record"
                    );
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::error!(missed, "version listener lagged, audit entries dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    struct FakeRecords {
        records: HashMap<(String, String), Map<String, Value>>,
    }

    impl FakeRecords {
        fn new(entries: Vec<(&str, &str, Value)>) -> Arc<Self> {
            let records = entries
                .into_iter()
                .map(|(kind, id, value)| {
                    (
                        (kind.to_string(), id.to_string()),
                        value.as_object().cloned().expect("object literal"),
                    )
                })
                .collect();
            Arc::new(Self { records })
        }
    }

    #[async_trait]
    impl RecordLookup for FakeRecords {
        async fn find_by_id(
            &self,
            kind: &str,
            id: &str,
        ) -> Result<Option<Map<String, Value>>, AppError> {
            Ok(self
                .records
                .get(&(kind.to_string(), id.to_string()))
                .cloned())
        }
    }

    fn auditor_with(
        entries: Vec<(&str, &str, Value)>,
    ) -> (ChangeAuditor, broadcast::Receiver<VersionRecord>) {
        let (bus, rx) = version_channel();
        let kinds = ["objects", "presets"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        (ChangeAuditor::new(kinds, FakeRecords::new(entries), bus), rx)
    }

    #[tokio::test]
    async fn unrecognized_kinds_are_not_captured() {
        let (auditor, _rx) = auditor_with(vec![]);
        let captured = auditor.capture_before("files", "1").await.expect("capture");
        assert!(captured.is_none());
    }

    #[tokio::test]
    async fn missing_record_forces_create_semantics() {
        let (auditor, _rx) = auditor_with(vec![]);
        let captured = auditor
            .capture_before("objects", "5")
            .await
            .expect("capture")
            .expect("recognized kind");

        assert!(!captured.exists());
        assert_eq!(
            captured.effective_event(VersionEvent::Update),
            VersionEvent::Create
        );
        assert_eq!(
            captured.effective_event(VersionEvent::Destroy),
            VersionEvent::Create
        );
    }

    #[tokio::test]
    async fn update_publishes_diff_and_before_image() {
        let (auditor, mut rx) =
            auditor_with(vec![("objects", "5", json!({"name": "a", "size": 1}))]);
        let captured = auditor
            .capture_before("objects", "5")
            .await
            .expect("capture")
            .expect("recognized kind");

        let after = json!({"name": "b", "size": 1});
        let changes = captured.changes_against(after.as_object());
        let actor = Uuid::new_v4();
        let context = RequestContext::new().with_ip("10.1.2.3");

        let published = auditor.record(
            captured.effective_event(VersionEvent::Update),
            Some(actor),
            &captured,
            &changes,
            &context,
        );
        assert!(published);

        let record = rx.try_recv().expect("one record on the bus");
        assert_eq!(record.event, VersionEvent::Update);
        assert_eq!(record.actor_id, Some(actor));
        assert_eq!(record.item_type, "objects");
        assert_eq!(record.item_id, "5");
        assert_eq!(record.object, Some(json!({"name": "a", "size": 1})));
        assert_eq!(
            record.object_changes,
            json!({"name": {"old": "a", "new": "b"}})
        );
        assert_eq!(record.source_ip.as_deref(), Some("10.1.2.3"));
    }

    #[tokio::test]
    async fn update_without_changes_publishes_nothing() {
        let (auditor, mut rx) = auditor_with(vec![("objects", "5", json!({"name": "a"}))]);
        let captured = auditor
            .capture_before("objects", "5")
            .await
            .expect("capture")
            .expect("recognized kind");

        let after = json!({"name": "a"});
        let changes = captured.changes_against(after.as_object());
        let published = auditor.record(
            VersionEvent::Update,
            Some(Uuid::new_v4()),
            &captured,
            &changes,
            &RequestContext::new(),
        );

        assert!(!published);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn destroy_of_nonexistent_record_publishes_nothing() {
        let (auditor, mut rx) = auditor_with(vec![]);
        let captured = auditor
            .capture_before("objects", "404")
            .await
            .expect("capture")
            .expect("recognized kind");

        let changes = captured.changes_against(None);
        let published = auditor.record(
            VersionEvent::Destroy,
            Some(Uuid::new_v4()),
            &captured,
            &changes,
            &RequestContext::new(),
        );

        assert!(!published);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn destroy_records_the_full_before_image() {
        let (auditor, mut rx) = auditor_with(vec![("presets", "p1", json!({"name": "x"}))]);
        let captured = auditor
            .capture_before("presets", "p1")
            .await
            .expect("capture")
            .expect("recognized kind");

        let changes = captured.changes_against(None);
        let published = auditor.record(
            captured.effective_event(VersionEvent::Destroy),
            Some(Uuid::new_v4()),
            &captured,
            &changes,
            &RequestContext::new(),
        );
        assert!(published);

        let record = rx.try_recv().expect("one record on the bus");
        assert_eq!(record.event, VersionEvent::Destroy);
        assert_eq!(record.object, Some(json!({"name": "x"})));
        assert_eq!(
            record.object_changes,
            json!({"name": {"old": "x", "new": null}})
        );
    }

    #[test]
    fn request_context_prefers_forwarded_for() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());

        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.ip.as_deref(), Some("203.0.113.9"));
    }
}
