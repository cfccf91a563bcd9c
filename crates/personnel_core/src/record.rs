//! crates/personnel_core/src/record.rs
//!
//! The generic record controller: list/filter/create/update/delete against one
//! entity endpoint family, with the view state a renderer needs to draw it.
//!
//! One controller belongs to one mounted view. After `unmount` every response
//! that settles is dropped, and overlapping list requests only apply the latest.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{Entity, EntitySpec};
use crate::draft::{DraftMode, FormDraft};
use crate::error::ViewError;
use crate::filter::{Criterion, FilterCriteria, FilterState, QueryParams, RefetchDecision};
use crate::guard::{session_can, Capability};
use crate::ports::{ApiRequest, PortError, PortResult};
use crate::session::SessionStore;

//=========================================================================================
// View State
//=========================================================================================

/// Why a list is being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefetchTrigger {
    Mount,
    FilterChanged,
    SearchSubmitted,
    AfterMutation,
    Manual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dialog {
    pub mode: DraftMode,
    pub draft: FormDraft,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRemoval {
    pub id: String,
    pub confirmed: bool,
}

#[derive(Debug, Clone)]
pub struct ViewState<E> {
    /// Server order, never re-sorted here.
    pub records: Vec<E>,
    pub loading: bool,
    pub load_error: Option<String>,
    pub dialog: Option<Dialog>,
    pub pending_removal: Option<PendingRemoval>,
    pub delete_error: Option<String>,
    /// At most one expanded row.
    pub expanded: Option<String>,
    pub filters: FilterState,
}

impl<E> ViewState<E> {
    fn new(spec: &EntitySpec) -> Self {
        Self {
            records: Vec::new(),
            loading: false,
            load_error: None,
            dialog: None,
            pending_removal: None,
            delete_error: None,
            expanded: None,
            filters: FilterState::new(spec.text_filters),
        }
    }
}

/// The backend answers lists both bare and wrapped in `{ "data": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListEnvelope<E> {
    Bare(Vec<E>),
    Wrapped { data: Vec<E> },
}

fn decode_list<E: Entity>(body: Value) -> PortResult<Vec<E>> {
    match serde_json::from_value::<ListEnvelope<E>>(body) {
        Ok(ListEnvelope::Bare(records)) | Ok(ListEnvelope::Wrapped { data: records }) => Ok(records),
        Err(e) => Err(PortError::Decode(e.to_string())),
    }
}

/// Clears the in-flight flag when the mutation settles or is dropped.
struct Submission<'a>(&'a AtomicBool);

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

//=========================================================================================
// Controller
//=========================================================================================

pub struct RecordController<E: Entity> {
    spec: EntitySpec,
    session: Arc<SessionStore>,
    state: Mutex<ViewState<E>>,
    lifetime: CancellationToken,
    generation: AtomicU64,
    submitting: AtomicBool,
}

impl<E: Entity> RecordController<E> {
    pub fn new(session: Arc<SessionStore>) -> Self {
        let spec = E::spec();
        Self {
            state: Mutex::new(ViewState::new(&spec)),
            spec,
            session,
            lifetime: CancellationToken::new(),
            generation: AtomicU64::new(0),
            submitting: AtomicBool::new(false),
        }
    }

    pub fn spec(&self) -> &EntitySpec {
        &self.spec
    }

    pub async fn state(&self) -> ViewState<E> {
        self.state.lock().await.clone()
    }

    pub async fn records(&self) -> Vec<E> {
        self.state.lock().await.records.clone()
    }

    /// True while a create, update or delete is in flight; the trigger control stays disabled.
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    pub fn is_mounted(&self) -> bool {
        !self.lifetime.is_cancelled()
    }

    pub async fn mount(&self) -> Result<(), ViewError> {
        self.refetch(RefetchTrigger::Mount).await
    }

    /// Detaches the view; responses that settle afterwards are ignored.
    pub fn unmount(&self) {
        debug!(entity = self.spec.name, "View unmounted.");
        self.lifetime.cancel();
    }

    //---------------------------------------------------------------------------------
    // Listing and filters
    //---------------------------------------------------------------------------------

    /// Replaces the applied criteria and fetches the list for them.
    pub async fn list(&self, criteria: FilterCriteria) -> Result<(), ViewError> {
        self.state.lock().await.filters.replace(criteria);
        self.refetch(RefetchTrigger::Manual).await
    }

    /// Fetches the list for the applied criteria. A failure keeps the previous records.
    pub async fn refetch(&self, trigger: RefetchTrigger) -> Result<(), ViewError> {
        if !self.is_mounted() {
            return Ok(());
        }
        if let Err(err) = self.permit_read() {
            self.state.lock().await.load_error = Some(err.to_string());
            return Err(err);
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let query = {
            let mut state = self.state.lock().await;
            state.loading = true;
            state.filters.query()
        };
        info!(entity = self.spec.name, ?trigger, params = query.len(), "Fetching records.");

        let request = ApiRequest::get(self.spec.base_path).with_query(query);
        let result = self.session.send(request).await.and_then(decode_list::<E>);

        if !self.is_mounted() {
            debug!(entity = self.spec.name, "Dropping list response for an unmounted view.");
            return Ok(());
        }
        let mut state = self.state.lock().await;
        if generation != self.generation.load(Ordering::SeqCst) {
            debug!(entity = self.spec.name, generation, "Dropping superseded list response.");
            return Ok(());
        }
        state.loading = false;
        match result {
            Ok(records) => {
                state.records = records;
                state.load_error = None;
                Ok(())
            }
            Err(e) => {
                let err = ViewError::load(self.spec.name, &e);
                error!(entity = self.spec.name, "Failed to fetch records: {}", e);
                state.load_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Records a filter edit and refetches if the outgoing query changed.
    pub async fn set_filter(
        &self,
        key: &str,
        value: impl Into<Criterion>,
    ) -> Result<RefetchDecision, ViewError> {
        let decision = self.state.lock().await.filters.set(key, value);
        if decision == RefetchDecision::Refetch {
            self.refetch(RefetchTrigger::FilterChanged).await?;
        }
        Ok(decision)
    }

    /// The explicit search action for free-text filters.
    pub async fn submit_search(&self) -> Result<RefetchDecision, ViewError> {
        let decision = self.state.lock().await.filters.submit_search();
        if decision == RefetchDecision::Refetch {
            self.refetch(RefetchTrigger::SearchSubmitted).await?;
        }
        Ok(decision)
    }

    /// Looks records up through `<base>/search`. Blank text yields nothing without a request.
    pub async fn search(&self, text: &str) -> Result<Vec<E>, ViewError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        self.permit_read()?;
        let request = ApiRequest::get(format!("{}/search", self.spec.base_path))
            .with_query(QueryParams::new().with("search", text));
        self.session
            .send(request)
            .await
            .and_then(decode_list::<E>)
            .map_err(|e| {
                warn!(entity = self.spec.name, "Search failed: {}", e);
                ViewError::load(self.spec.name, &e)
            })
    }

    //---------------------------------------------------------------------------------
    // Dialog and drafts
    //---------------------------------------------------------------------------------

    pub async fn open_create(&self) {
        self.state.lock().await.dialog = Some(Dialog {
            mode: DraftMode::Create,
            draft: FormDraft::new(self.spec.derived),
            error: None,
        });
    }

    pub async fn open_edit(&self, id: &str) -> Result<(), ViewError> {
        let mut state = self.state.lock().await;
        let record = state
            .records
            .iter()
            .find(|record| record.id() == id)
            .ok_or_else(|| ViewError::NotFound(id.to_string()))?;
        let draft = FormDraft::from_record(record, self.spec.derived);
        state.dialog = Some(Dialog {
            mode: DraftMode::Edit { id: id.to_string() },
            draft,
            error: None,
        });
        Ok(())
    }

    /// Discards the open draft without saving.
    pub async fn close_dialog(&self) {
        self.state.lock().await.dialog = None;
    }

    pub async fn set_field(&self, field: &str, value: impl Into<Value>) -> Result<(), ViewError> {
        let mut state = self.state.lock().await;
        let dialog = state.dialog.as_mut().ok_or(ViewError::NoActiveDraft)?;
        dialog.draft.set(field, value)
    }

    /// Saves the open dialog: a create or an update depending on how it was opened.
    pub async fn submit(&self) -> Result<(), ViewError> {
        let dialog = self
            .state
            .lock()
            .await
            .dialog
            .clone()
            .ok_or(ViewError::NoActiveDraft)?;
        self.save(dialog.mode, dialog.draft).await
    }

    pub async fn create(&self, draft: FormDraft) -> Result<(), ViewError> {
        self.save(DraftMode::Create, draft).await
    }

    /// Full-record replace at `<base>/<id>`.
    pub async fn update(&self, id: &str, draft: FormDraft) -> Result<(), ViewError> {
        self.save(DraftMode::Edit { id: id.to_string() }, draft).await
    }

    async fn save(&self, mode: DraftMode, mut draft: FormDraft) -> Result<(), ViewError> {
        let (required, action) = match mode {
            DraftMode::Create => (self.spec.create, "create"),
            DraftMode::Edit { .. } => (self.spec.manage, "update"),
        };
        if let Err(err) = self.permit(required, action) {
            self.keep_dialog(mode, draft, &err).await;
            return Err(err);
        }
        let _submission = self.begin_submission()?;

        draft.recompute();
        let missing = draft.missing(self.spec.required);
        if !missing.is_empty() {
            let err = ViewError::MissingFields(missing);
            self.keep_dialog(mode, draft, &err).await;
            return Err(err);
        }

        // The id travels in the path, never in the body.
        let mut body = draft.to_body();
        if let Value::Object(fields) = &mut body {
            fields.remove(self.spec.id_field);
        }
        let request = match &mode {
            DraftMode::Create => ApiRequest::post(self.spec.base_path, body),
            DraftMode::Edit { id } => {
                ApiRequest::put(format!("{}/{}", self.spec.base_path, id), body)
            }
        };
        let result = self.session.send(request).await;

        if !self.is_mounted() {
            debug!(entity = self.spec.name, "Dropping save response for an unmounted view.");
            return Ok(());
        }
        match result {
            Ok(_) => {
                info!(entity = self.spec.name, ?mode, "Record saved.");
                self.state.lock().await.dialog = None;
                self.refetch_after_mutation().await;
                Ok(())
            }
            Err(e) => {
                error!(entity = self.spec.name, ?mode, "Failed to save record: {}", e);
                let err = ViewError::save(self.spec.name, &e);
                self.keep_dialog(mode, draft, &err).await;
                Err(err)
            }
        }
    }

    /// Leaves the dialog open with the draft as submitted and the failure message.
    async fn keep_dialog(&self, mode: DraftMode, draft: FormDraft, err: &ViewError) {
        self.state.lock().await.dialog = Some(Dialog {
            mode,
            draft,
            error: Some(err.to_string()),
        });
    }

    //---------------------------------------------------------------------------------
    // Removal
    //---------------------------------------------------------------------------------

    /// Opens the confirmation prompt for `id`.
    pub async fn request_remove(&self, id: &str) {
        self.state.lock().await.pending_removal = Some(PendingRemoval {
            id: id.to_string(),
            confirmed: false,
        });
    }

    /// The user accepted the prompt for `id`.
    pub async fn confirm_remove(&self, id: &str) -> Result<(), ViewError> {
        let mut state = self.state.lock().await;
        match state.pending_removal.as_mut() {
            Some(pending) if pending.id == id => {
                pending.confirmed = true;
                Ok(())
            }
            _ => Err(ViewError::ConfirmationRequired(id.to_string())),
        }
    }

    pub async fn cancel_remove(&self) {
        self.state.lock().await.pending_removal = None;
    }

    /// Deletes `id`. Without a confirmed prompt for the same id nothing is sent.
    pub async fn remove(&self, id: &str) -> Result<(), ViewError> {
        if let Err(err) = self.permit(self.spec.manage, "delete") {
            self.state.lock().await.delete_error = Some(err.to_string());
            return Err(err);
        }
        let _submission = self.begin_submission()?;
        {
            let mut state = self.state.lock().await;
            match &state.pending_removal {
                Some(pending) if pending.id == id && pending.confirmed => {
                    state.pending_removal = None;
                }
                _ => {
                    warn!(entity = self.spec.name, id, "Delete requested without confirmation.");
                    return Err(ViewError::ConfirmationRequired(id.to_string()));
                }
            }
        }

        let request = ApiRequest::delete(format!("{}/{}", self.spec.base_path, id));
        let result = self.session.send(request).await;

        if !self.is_mounted() {
            return Ok(());
        }
        match result {
            Ok(_) => {
                info!(entity = self.spec.name, id, "Record deleted.");
                self.state.lock().await.delete_error = None;
                self.refetch_after_mutation().await;
                Ok(())
            }
            Err(e) => {
                error!(entity = self.spec.name, id, "Failed to delete record: {}", e);
                let err = ViewError::delete(self.spec.name, &e);
                self.state.lock().await.delete_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    //---------------------------------------------------------------------------------
    // Row expansion
    //---------------------------------------------------------------------------------

    /// Expands `id`, collapsing any other row; toggling the open row collapses it.
    pub async fn toggle_expanded(&self, id: &str) {
        let mut state = self.state.lock().await;
        state.expanded = match state.expanded.as_deref() {
            Some(open) if open == id => None,
            _ => Some(id.to_string()),
        };
    }

    pub async fn expanded(&self) -> Option<String> {
        self.state.lock().await.expanded.clone()
    }

    //---------------------------------------------------------------------------------

    fn permit(&self, capability: Capability, action: &str) -> Result<(), ViewError> {
        if session_can(&self.session.snapshot(), capability) {
            return Ok(());
        }
        warn!(entity = self.spec.name, ?capability, action, "Operation refused for this role.");
        Err(ViewError::NotPermitted(format!("{} {} records", action, self.spec.name)))
    }

    fn permit_read(&self) -> Result<(), ViewError> {
        match self.spec.read {
            Some(capability) => self.permit(capability, "read"),
            None => Ok(()),
        }
    }

    fn begin_submission(&self) -> Result<Submission<'_>, ViewError> {
        self.submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ViewError::Busy)?;
        Ok(Submission(&self.submitting))
    }

    async fn refetch_after_mutation(&self) {
        // The failure is already on the view state as a load error.
        if let Err(e) = self.refetch(RefetchTrigger::AfterMutation).await {
            warn!(entity = self.spec.name, "Refetch after mutation failed: {}", e);
        }
    }
}
