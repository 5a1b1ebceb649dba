//! Per-site, per-action asynchronous lifecycle.
//!
//! Every `(site_index, kind)` key moves `idle → pending → success|error` and its label
//! reverts to neutral after a fixed delay. At most one call is in flight per key: a key
//! whose control is disabled rejects new calls instead of queueing them. Distinct keys run
//! independently.
//!
//! The controller owns the state map and publishes every transition as an
//! [`ActionEvent`]; rendering is left to subscribers.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::actions::{
    map_url, ActionError, ActionEvent, ActionKey, ActionKind, ActionSettings, ActionState,
    ActionStatus, ControlLabel, PanelContent,
};
use super::catalog::{CatalogError, Generation, SiteCatalog};
use super::gateway::{CoordinateQuery, DownloadedFile, GatewayResult, RemoteGateway};
use crate::models::Site;

const EVENT_CAPACITY: usize = 256;

/// Outcome of a panel toggle.
pub enum Toggle {
    /// The panel was visible and is now hidden. No call was made.
    Collapsed(ActionState),
    /// The panel opened and a call must be run to completion.
    Started(PendingAction),
}

/// A panel call that has been issued but not yet awaited.
///
/// Dropping it without calling [`PendingAction::run`] resolves the key as failed, so the
/// control is re-enabled after the usual revert delay.
pub struct PendingAction {
    key: ActionKey,
    generation: Generation,
    started: ActionState,
    call: Option<PanelCall>,
}

impl PendingAction {
    pub fn key(&self) -> ActionKey {
        self.key
    }

    /// State right after the call was issued.
    pub fn started_state(&self) -> &ActionState {
        &self.started
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Await the gateway and apply the result to the panel.
    ///
    /// The call runs on its own task, so dropping this future does not cancel it.
    /// Gateway failures are rendered in the panel and reported as `ActionStatus::Error`;
    /// only a result from a replaced catalog generation is an `Err`.
    pub async fn run(mut self) -> Result<ActionStatus, ActionError> {
        let Some(call) = self.call.take() else {
            return Err(ActionError::Interrupted(self.key));
        };
        let controller = call.controller.clone();
        let cycle = call.cycle;
        match tokio::spawn(call.resolve()).await {
            Ok(result) => result,
            Err(err) => {
                warn!(key = %self.key, error = %err, "panel task did not finish");
                controller.abandon(self.key, self.generation, cycle);
                Err(ActionError::Interrupted(self.key))
            }
        }
    }
}

impl Drop for PendingAction {
    fn drop(&mut self) {
        if let Some(call) = self.call.take() {
            debug!(key = %call.key, "panel call dropped before it was run");
            call.controller.abandon(call.key, call.generation, call.cycle);
        }
    }
}

struct PanelCall {
    controller: ActionController,
    key: ActionKey,
    generation: Generation,
    cycle: u64,
    site: Site,
    query: CoordinateQuery,
}

impl PanelCall {
    async fn resolve(self) -> Result<ActionStatus, ActionError> {
        let gateway = Arc::clone(&self.controller.inner.gateway);
        let content = match self.key.kind {
            ActionKind::Preview => gateway
                .preview(&self.site, &self.query)
                .await
                .map(PanelContent::Preview),
            _ => gateway
                .analyze(&self.site, &self.query)
                .await
                .map(PanelContent::Analysis),
        };
        self.controller
            .finish_panel(self.key, self.generation, self.cycle, content)
    }
}

/// Bookkeeping for a running download or locate.
struct FlashCall {
    key: ActionKey,
    generation: Generation,
    cycle: u64,
    site: Site,
}

struct ControllerInner {
    catalog: SiteCatalog,
    gateway: Arc<dyn RemoteGateway>,
    settings: ActionSettings,
    states: Mutex<HashMap<ActionKey, ActionState>>,
    reverts: Mutex<HashMap<ActionKey, JoinHandle<()>>>,
    events: broadcast::Sender<ActionEvent>,
    runtime: Option<Handle>,
}

/// Shared handle to the action state machine.
#[derive(Clone)]
pub struct ActionController {
    inner: Arc<ControllerInner>,
}

impl ActionController {
    pub fn new(
        catalog: SiteCatalog,
        gateway: Arc<dyn RemoteGateway>,
        settings: ActionSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ControllerInner {
                catalog,
                gateway,
                settings,
                states: Mutex::new(HashMap::new()),
                reverts: Mutex::new(HashMap::new()),
                events,
                runtime: Handle::try_current().ok(),
            }),
        }
    }

    pub fn settings(&self) -> &ActionSettings {
        &self.inner.settings
    }

    /// Receive every subsequent [`ActionEvent`].
    pub fn subscribe(&self) -> broadcast::Receiver<ActionEvent> {
        self.inner.events.subscribe()
    }

    /// State of `key` in the current catalog generation, if it was ever touched.
    pub fn state(&self, key: ActionKey) -> Option<ActionState> {
        let current = self.inner.catalog.generation();
        self.inner
            .states
            .lock()
            .get(&key)
            .filter(|s| s.generation == current)
            .cloned()
    }

    /// Every touched key of the current generation, ordered by key.
    pub fn snapshot(&self) -> Vec<(ActionKey, ActionState)> {
        self.snapshot_for(self.inner.catalog.generation())
    }

    /// Every touched key of `generation`, ordered by key.
    pub fn snapshot_for(&self, generation: Generation) -> Vec<(ActionKey, ActionState)> {
        let mut entries: Vec<_> = self
            .inner
            .states
            .lock()
            .iter()
            .filter(|(_, s)| s.generation == generation)
            .map(|(k, s)| (*k, s.clone()))
            .collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }

    /// Forget every key and cancel pending label reverts. Called whenever the catalog is
    /// reloaded.
    pub fn reset(&self, generation: Generation) {
        let handles: Vec<_> = self.inner.reverts.lock().drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.abort();
        }
        let cleared = {
            let mut states = self.inner.states.lock();
            let count = states.len();
            states.clear();
            count
        };
        info!(
            generation = generation.value(),
            cleared_states = cleared,
            cancelled_reverts = handles.len(),
            "action state reset"
        );
        self.publish(ActionEvent::CatalogReset { generation });
    }

    /// Open or collapse the panel of an analysis/preview key.
    ///
    /// Collapsing is purely local and keeps status and panel content. Opening marks the
    /// key pending and returns the call to run; the call is not made until
    /// [`PendingAction::run`] is awaited.
    pub fn begin_toggle(&self, site_index: usize, kind: ActionKind) -> Result<Toggle, ActionError> {
        if !kind.has_panel() {
            return Err(ActionError::NoPanel(kind));
        }
        let (generation, site) = self.inner.catalog.lookup(site_index)?;
        let key = ActionKey::new(site_index, kind);

        let snapshot = {
            let mut states = self.inner.states.lock();
            let state = Self::entry(&mut states, key, generation);

            if state.panel_visible {
                state.panel_visible = false;
                state.touch();
                let snapshot = state.clone();
                drop(states);
                debug!(%key, "panel collapsed");
                self.publish_state(key, snapshot.clone());
                return Ok(Toggle::Collapsed(snapshot));
            }

            if !state.control_enabled {
                debug!(%key, status = ?state.status, "control disabled; toggle ignored");
                return Err(ActionError::Blocked(key));
            }

            state.panel_visible = true;
            state.status = ActionStatus::Pending;
            state.control_enabled = false;
            state.label = ControlLabel::Busy;
            state.panel = Some(PanelContent::Loading);
            state.cycle += 1;
            state.touch();
            state.clone()
        };

        self.cancel_revert(key);
        debug!(%key, cycle = snapshot.cycle, "panel call issued");
        let cycle = snapshot.cycle;
        self.publish_state(key, snapshot.clone());

        let query = CoordinateQuery::from_site(&site);
        Ok(Toggle::Started(PendingAction {
            key,
            generation,
            started: snapshot,
            call: Some(PanelCall {
                controller: self.clone(),
                key,
                generation,
                cycle,
                site,
                query,
            }),
        }))
    }

    /// Toggle and, when a call was issued, await it.
    pub async fn toggle(&self, site_index: usize, kind: ActionKind) -> Result<ActionState, ActionError> {
        let key = ActionKey::new(site_index, kind);
        match self.begin_toggle(site_index, kind)? {
            Toggle::Collapsed(state) => Ok(state),
            Toggle::Started(pending) => {
                let generation = pending.generation();
                pending.run().await?;
                self.state(key).ok_or_else(|| {
                    ActionError::Catalog(CatalogError::StaleGeneration {
                        index: site_index,
                        requested: generation,
                        current: self.inner.catalog.generation(),
                    })
                })
            }
        }
    }

    /// Fetch the site's data archive. Failures also raise an [`ActionEvent::Alert`].
    ///
    /// The gateway call runs on its own task: dropping the returned future leaves the call
    /// running and the key still resolves and reverts.
    pub async fn download(&self, site_index: usize) -> Result<DownloadedFile, ActionError> {
        let call = self.begin_flash(site_index, ActionKind::Download)?;
        let (key, generation, cycle) = (call.key, call.generation, call.cycle);
        let controller = self.clone();
        match tokio::spawn(async move { controller.run_download(call).await }).await {
            Ok(result) => result,
            Err(err) => {
                warn!(%key, error = %err, "download task did not finish");
                self.abandon(key, generation, cycle);
                Err(ActionError::Interrupted(key))
            }
        }
    }

    /// Build a map link for the site. Local only, no gateway call.
    ///
    /// The label revert is scheduled on the Tokio runtime the caller runs on, or the one
    /// the controller was created on. Without either the label reverts immediately.
    pub fn locate(&self, site_index: usize) -> Result<String, ActionError> {
        let call = self.begin_flash(site_index, ActionKind::Locate)?;
        let coordinates = call.site.coordinates.as_ref();
        let url = map_url(
            &self.inner.settings.maps_base_url,
            coordinates.and_then(|c| c.latitude),
            coordinates.and_then(|c| c.longitude),
            call.site.raw_coordinates(),
        );

        match url {
            Some(url) => {
                self.finish_flash(&call, ActionStatus::Success, ControlLabel::Succeeded)?;
                self.publish(ActionEvent::MapOpened {
                    generation: call.generation,
                    key: call.key,
                    url: url.clone(),
                });
                Ok(url)
            }
            None => {
                self.finish_flash(&call, ActionStatus::Error, ControlLabel::NoCoordinates)?;
                Err(ActionError::NoCoordinates { site_index })
            }
        }
    }

    async fn run_download(&self, call: FlashCall) -> Result<DownloadedFile, ActionError> {
        let query = CoordinateQuery::from_site(&call.site);
        let result: GatewayResult<DownloadedFile> =
            self.inner.gateway.download(&call.site, &query).await;

        match result {
            Ok(file) => {
                self.finish_flash(&call, ActionStatus::Success, ControlLabel::Succeeded)?;
                info!(key = %call.key, filename = %file.filename, bytes = file.bytes.len(), "download complete");
                self.publish(ActionEvent::DownloadReady {
                    generation: call.generation,
                    key: call.key,
                    filename: file.filename.clone(),
                    size: file.bytes.len(),
                });
                Ok(file)
            }
            Err(err) => {
                self.finish_flash(&call, ActionStatus::Error, ControlLabel::Failed)?;
                warn!(key = %call.key, error = %err, "download failed");
                self.publish(ActionEvent::Alert {
                    generation: call.generation,
                    key: call.key,
                    message: format!("Failed to download GEE data: {}", err.message()),
                });
                Err(err.into())
            }
        }
    }

    fn entry(
        states: &mut HashMap<ActionKey, ActionState>,
        key: ActionKey,
        generation: Generation,
    ) -> &mut ActionState {
        let state = states
            .entry(key)
            .or_insert_with(|| ActionState::new(generation));
        if state.generation != generation {
            *state = ActionState::new(generation);
        }
        state
    }

    fn begin_flash(&self, site_index: usize, kind: ActionKind) -> Result<FlashCall, ActionError> {
        let (generation, site) = self.inner.catalog.lookup(site_index)?;
        let key = ActionKey::new(site_index, kind);

        let snapshot = {
            let mut states = self.inner.states.lock();
            let state = Self::entry(&mut states, key, generation);
            if !state.control_enabled {
                debug!(%key, status = ?state.status, "control disabled; call ignored");
                return Err(ActionError::Blocked(key));
            }
            state.status = ActionStatus::Pending;
            state.control_enabled = false;
            state.label = ControlLabel::Busy;
            state.cycle += 1;
            state.touch();
            state.clone()
        };

        self.cancel_revert(key);
        let cycle = snapshot.cycle;
        self.publish_state(key, snapshot);
        Ok(FlashCall {
            key,
            generation,
            cycle,
            site,
        })
    }

    fn finish_flash(
        &self,
        call: &FlashCall,
        status: ActionStatus,
        label: ControlLabel,
    ) -> Result<(), ActionError> {
        self.complete(call.key, call.generation, call.cycle, |state| {
            state.status = status;
            state.label = label;
        })
        .map(|_| ())
    }

    fn finish_panel(
        &self,
        key: ActionKey,
        generation: Generation,
        cycle: u64,
        content: GatewayResult<PanelContent>,
    ) -> Result<ActionStatus, ActionError> {
        let (status, label, content) = match content {
            Ok(content) => (ActionStatus::Success, ControlLabel::Succeeded, content),
            Err(err) => {
                warn!(%key, error = %err, "panel call failed");
                (
                    ActionStatus::Error,
                    ControlLabel::Failed,
                    PanelContent::Error {
                        message: err.message(),
                    },
                )
            }
        };
        self.complete(key, generation, cycle, |state| {
            state.status = status;
            state.label = label;
            state.panel = Some(content);
        })?;
        info!(%key, status = ?status, "panel call resolved");
        Ok(status)
    }

    /// Apply a resolution to `key` and schedule the label revert. Results that belong to a
    /// replaced catalog generation are dropped and reported.
    fn complete(
        &self,
        key: ActionKey,
        generation: Generation,
        cycle: u64,
        apply: impl FnOnce(&mut ActionState),
    ) -> Result<ActionState, ActionError> {
        let current = self.inner.catalog.generation();
        let snapshot = {
            let mut states = self.inner.states.lock();
            match states
                .get_mut(&key)
                .filter(|s| current == generation && s.generation == generation && s.cycle == cycle)
            {
                Some(state) => {
                    apply(state);
                    state.touch();
                    Some(state.clone())
                }
                None => None,
            }
        };

        let Some(snapshot) = snapshot else {
            return Err(self.stale(key, generation, current));
        };
        self.publish_state(key, snapshot.clone());
        self.schedule_revert(key, cycle, self.inner.settings.revert_delay(key.kind));
        Ok(snapshot)
    }

    /// Resolve a call whose result will never arrive as failed.
    fn abandon(&self, key: ActionKey, generation: Generation, cycle: u64) {
        if self.inner.catalog.generation() != generation {
            return;
        }
        let applied = self.complete(key, generation, cycle, |state| {
            state.status = ActionStatus::Error;
            state.label = ControlLabel::Failed;
            if key.kind.has_panel() {
                state.panel = Some(PanelContent::Error {
                    message: "Request was interrupted".to_string(),
                });
            }
        });
        if applied.is_ok() {
            warn!(%key, cycle, "call abandoned");
        }
    }

    fn stale(&self, key: ActionKey, generation: Generation, current: Generation) -> ActionError {
        let error = CatalogError::StaleGeneration {
            index: key.site_index,
            requested: generation,
            current,
        };
        warn!(%key, error = %error, "discarding result for a replaced catalog");
        self.publish(ActionEvent::StaleResult {
            generation,
            current,
            key,
        });
        ActionError::Catalog(error)
    }

    fn schedule_revert(&self, key: ActionKey, cycle: u64, delay: Duration) {
        let Some(runtime) = Handle::try_current().ok().or_else(|| self.inner.runtime.clone()) else {
            warn!(%key, "no async runtime; reverting label immediately");
            self.revert(key, cycle);
            return;
        };
        let controller = self.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            controller.revert(key, cycle);
        });
        if let Some(previous) = self.inner.reverts.lock().insert(key, handle) {
            previous.abort();
        }
    }

    fn cancel_revert(&self, key: ActionKey) {
        if let Some(handle) = self.inner.reverts.lock().remove(&key) {
            handle.abort();
        }
    }

    /// Reset the label and re-enable the control. Panel visibility and content are kept.
    fn revert(&self, key: ActionKey, cycle: u64) {
        let snapshot = {
            let mut states = self.inner.states.lock();
            let Some(state) = states.get_mut(&key) else {
                return;
            };
            if state.cycle != cycle || state.status == ActionStatus::Pending {
                return;
            }
            state.status = ActionStatus::Idle;
            state.label = ControlLabel::Neutral;
            state.control_enabled = true;
            state.touch();
            state.clone()
        };
        self.inner.reverts.lock().remove(&key);
        debug!(%key, cycle, "label reverted");
        self.publish_state(key, snapshot);
    }

    fn publish_state(&self, key: ActionKey, state: ActionState) {
        self.publish(ActionEvent::StateChanged {
            generation: state.generation,
            key,
            state,
        });
    }

    fn publish(&self, event: ActionEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}
