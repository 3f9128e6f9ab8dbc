// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Swap Lifecycle Controller
//!
//! Explicit state machine for one swap, run as a single task that owns all
//! transitions. Callers talk to it through a [`ControllerHandle`] and render
//! the published [`ControllerState`].
//!
//! ## Event Flow
//!
//! 1. `Submit` → `CreatingSwap`; a task bootstraps the session, then creates
//!    the swap, strictly in that order
//! 2. `SwapCreated` → `AwaitingUserAction(..)` and status polling starts
//! 3. `PollCompleted` results map the server status to a step; results older
//!    than the last applied one, or issued before polling was last stopped,
//!    are dropped
//! 4. Terminal steps stop polling. So do cancellation and teardown
//!
//! Redirects: `BeginRedirect` persists the form before the caller navigates
//! away, `Resume` consumes it on return and restores it only while fresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::callback::RedirectCallback;
use super::poller::StatusPoller;
use super::step::{SwapWithdrawalStep, UserAction};
use crate::auth::AuthError;
use crate::backend::{BackendError, KnownErrorCode};
use crate::models::{Gas, Swap, SwapFormSnapshot, SwapFormValues, SwapIntent, UnknownSwapStatus};
use crate::state::AppState;
use crate::storage::RecoveryStoreError;

pub const BLACKLISTED_ADDRESS_NOTICE: &str = "You can't transfer to that address. Please double check your wallet's address and change it in the previous page.";

const TRANSITION_BUFFER: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Swap controller has shut down")]
    Closed,

    #[error(transparent)]
    Recovery(#[from] RecoveryStoreError),
}

/// Why a submit attempt ended back on the form.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubmitFailure {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Follow-up shown when the destination address must be activated first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectNetworkPrompt {
    pub network_display_name: String,
    pub app_url: String,
}

/// Recoverable faults. The flow keeps running while one is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ControllerFault {
    UnrecognizedStatus(String),
}

#[derive(Debug, Clone)]
pub struct ControllerState {
    pub step: SwapWithdrawalStep,
    pub form: SwapFormValues,
    pub swap_id: Option<Uuid>,
    pub swap: Option<Swap>,
    /// User-facing message from the last failed action
    pub notice: Option<String>,
    pub submit_error: Option<SubmitFailure>,
    pub connect_prompt: Option<ConnectNetworkPrompt>,
    pub fault: Option<ControllerFault>,
    pub network_fee: Option<Gas>,
    pub deposit_address_from_account: bool,
    pub resolving_deposit_address: bool,
    pub cancelling: bool,
    pub polling: bool,
}

impl ControllerState {
    fn new(form: SwapFormValues) -> Self {
        Self {
            step: SwapWithdrawalStep::FormEntry,
            form,
            swap_id: None,
            swap: None,
            notice: None,
            submit_error: None,
            connect_prompt: None,
            fault: None,
            network_fee: None,
            deposit_address_from_account: false,
            resolving_deposit_address: false,
            cancelling: false,
            polling: false,
        }
    }
}

pub(crate) enum Event {
    Submit(SwapFormValues),
    Cancel,
    BeginRedirect {
        values: SwapFormValues,
        reply: oneshot::Sender<Result<(), RecoveryStoreError>>,
    },
    Resume(RedirectCallback),
    SwapCreated {
        intent: SwapIntent,
        result: Result<Uuid, SubmitFailure>,
    },
    PollCompleted {
        seq: u64,
        result: Result<Swap, BackendError>,
    },
    CancelFinished(Result<(), BackendError>),
    DepositAddressResolved {
        lookup: u64,
        result: Result<String, BackendError>,
    },
    FeeEstimated(Vec<Gas>),
}

pub struct SwapLifecycleController {
    app: AppState,
    state: ControllerState,
    state_tx: watch::Sender<ControllerState>,
    transitions: broadcast::Sender<SwapWithdrawalStep>,
    events_tx: mpsc::UnboundedSender<Event>,
    shutdown: CancellationToken,
    poller: Option<CancellationToken>,
    sequence: Arc<AtomicU64>,
    last_applied_seq: u64,
    min_valid_seq: u64,
    /// Bumped by every resume and submit. Only the newest deposit address
    /// lookup may fill the form.
    deposit_lookup: u64,
    action: UserAction,
}

impl SwapLifecycleController {
    /// Start a controller on the current runtime, beginning at a fresh form.
    pub fn spawn(app: AppState) -> ControllerHandle {
        let (controller, events_rx) = Self::new(app);

        let events = controller.events_tx.clone();
        let state = controller.state_tx.subscribe();
        let transitions = controller.transitions.clone();
        let shutdown = controller.shutdown.clone();
        let task = tokio::spawn(controller.run(events_rx));

        ControllerHandle {
            events,
            state,
            transitions,
            _guard: shutdown.clone().drop_guard(),
            shutdown,
            task: Some(task),
        }
    }

    fn new(app: AppState) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let state = ControllerState::new(app.settings.initial_form_values());
        let (state_tx, _) = watch::channel(state.clone());
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let controller = Self {
            app,
            state,
            state_tx,
            transitions,
            events_tx,
            shutdown: CancellationToken::new(),
            poller: None,
            sequence: Arc::new(AtomicU64::new(0)),
            last_applied_seq: 0,
            min_valid_seq: 0,
            deposit_lookup: 0,
            action: UserAction::DepositAddressShown,
        };
        (controller, events_rx)
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<Event>) {
        info!("Swap controller starting");

        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle(event);
            self.publish();
        }

        self.stop_polling();
        info!("Swap controller torn down");
    }

    fn publish(&self) {
        let state = self.state.clone();
        self.state_tx.send_replace(state);
    }

    fn call_timeout(&self) -> Duration {
        self.app.config.request_timeout
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Submit(values) => self.on_submit(values),
            Event::Cancel => self.on_cancel(),
            Event::BeginRedirect { values, reply } => self.on_begin_redirect(values, reply),
            Event::Resume(callback) => self.on_resume(&callback),
            Event::SwapCreated { intent, result } => self.on_swap_created(intent, result),
            Event::PollCompleted { seq, result } => self.on_poll_completed(seq, result),
            Event::CancelFinished(result) => self.on_cancel_finished(result),
            Event::DepositAddressResolved { lookup, result } => {
                self.on_deposit_address(lookup, result)
            }
            Event::FeeEstimated(gas) => self.state.network_fee = gas.into_iter().next(),
        }
    }

    fn set_step(&mut self, step: SwapWithdrawalStep) {
        if self.state.step == step {
            return;
        }
        info!(from = ?self.state.step, to = ?step, "Swap step changed");
        self.state.step = step;
        let _ = self.transitions.send(step);

        if step.is_polling() {
            if !self.state.cancelling {
                self.start_polling();
            }
        } else {
            self.stop_polling();
        }
    }

    // =========================================================================
    // Polling
    // =========================================================================

    fn start_polling(&mut self) {
        if self.poller.is_some() {
            return;
        }
        let Some(swap_id) = self.state.swap_id else {
            return;
        };

        let token = self.shutdown.child_token();
        let poller = StatusPoller::new(
            Arc::clone(&self.app.backend),
            swap_id,
            self.app.config.poll_interval,
            self.call_timeout(),
            Arc::clone(&self.sequence),
            self.events_tx.clone(),
        );
        tokio::spawn(poller.run(token.clone()));

        self.poller = Some(token);
        self.state.polling = true;
    }

    fn stop_polling(&mut self) {
        if let Some(token) = self.poller.take() {
            token.cancel();
            // Anything issued so far belongs to the stopped poller.
            self.min_valid_seq = self.sequence.load(Ordering::SeqCst) + 1;
        }
        self.state.polling = false;
    }

    fn on_poll_completed(&mut self, seq: u64, result: Result<Swap, BackendError>) {
        if seq < self.min_valid_seq || seq <= self.last_applied_seq {
            debug!(seq, last_applied = self.last_applied_seq, "Discarding stale poll result");
            return;
        }
        if !self.state.step.is_polling() || self.state.cancelling {
            debug!(seq, step = ?self.state.step, "Discarding poll result outside polling step");
            return;
        }
        self.last_applied_seq = seq;

        let swap = match result {
            Ok(swap) => swap,
            Err(e) => {
                warn!(seq, error = %e, "Swap status poll failed");
                return;
            }
        };

        let status = swap.status();
        self.state.swap = Some(swap);
        match status {
            Ok(status) => {
                self.state.fault = None;
                self.set_step(SwapWithdrawalStep::for_status(status, self.action));
            }
            Err(UnknownSwapStatus(raw)) => {
                warn!(status = %raw, step = ?self.state.step, "Unrecognized swap status; holding step");
                self.state.fault = Some(ControllerFault::UnrecognizedStatus(raw));
            }
        }
    }

    // =========================================================================
    // Submit
    // =========================================================================

    fn on_submit(&mut self, values: SwapFormValues) {
        if self.state.step != SwapWithdrawalStep::FormEntry {
            debug!(step = ?self.state.step, "Ignoring submit outside form entry");
            return;
        }

        self.state.form = values;
        self.deposit_lookup += 1;
        self.state.resolving_deposit_address = false;
        self.state.notice = None;
        self.state.submit_error = None;
        self.state.connect_prompt = None;

        let intent = match self.state.form.to_intent() {
            Ok(intent) => intent,
            Err(e) => {
                self.state.notice = Some(e.to_string());
                return;
            }
        };

        self.set_step(SwapWithdrawalStep::CreatingSwap);

        let bootstrapper = Arc::clone(&self.app.bootstrapper);
        let backend = Arc::clone(&self.app.backend);
        let events = self.events_tx.clone();
        let call_timeout = self.call_timeout();
        tokio::spawn(async move {
            let result = async {
                bootstrapper.ensure_session().await?;
                let id = timeout(call_timeout, backend.create_swap(&intent))
                    .await
                    .unwrap_or(Err(BackendError::Timeout))?;
                Ok::<Uuid, SubmitFailure>(id)
            }
            .await;
            let _ = events.send(Event::SwapCreated { intent, result });
        });
    }

    fn on_swap_created(&mut self, intent: SwapIntent, result: Result<Uuid, SubmitFailure>) {
        if self.state.step != SwapWithdrawalStep::CreatingSwap {
            return;
        }

        match result {
            Ok(swap_id) => {
                info!(swap_id = %swap_id, "Swap created");
                self.state.swap_id = Some(swap_id);
                self.state.fault = None;
                self.action =
                    UserAction::for_destination(self.app.settings.network(&intent.destination_network));
                self.set_step(SwapWithdrawalStep::AwaitingUserAction(self.action));
                self.estimate_fee(&intent);
            }
            Err(failure) => {
                warn!(error = %failure, "Swap creation failed");
                self.set_step(SwapWithdrawalStep::FormEntry);
                self.report_submit_failure(&intent, failure);
            }
        }
    }

    fn report_submit_failure(&mut self, intent: &SwapIntent, failure: SubmitFailure) {
        let display_name = self
            .app
            .settings
            .network(&intent.destination_network)
            .map(|n| n.display_name.clone())
            .unwrap_or_else(|| intent.destination_network.clone());

        match &failure {
            SubmitFailure::Backend(BackendError::Api(api)) => match api.code.known() {
                Some(KnownErrorCode::BlacklistedAddress) => {
                    self.state.notice = Some(BLACKLISTED_ADDRESS_NOTICE.to_string());
                }
                Some(KnownErrorCode::InvalidAddress) => {
                    self.state.notice = Some(format!("Enter valid {display_name} address"));
                }
                Some(KnownErrorCode::UnactivatedAddress) => {
                    self.state.connect_prompt = Some(ConnectNetworkPrompt {
                        network_display_name: display_name,
                        app_url: api.message.clone(),
                    });
                }
                _ => {
                    self.state.notice = Some(if api.message.is_empty() {
                        api.code.as_str().to_string()
                    } else {
                        api.message.clone()
                    });
                }
            },
            other => self.state.notice = Some(other.to_string()),
        }

        self.state.submit_error = Some(failure);
    }

    fn estimate_fee(&self, intent: &SwapIntent) {
        let Some(network) = self.app.settings.network(&intent.source_network).cloned() else {
            return;
        };
        let Some(asset) = network.asset(&intent.source_asset).cloned() else {
            return;
        };

        let registry = Arc::clone(&self.app.registry);
        let events = self.events_tx.clone();
        let address = intent.destination_address.clone();
        tokio::spawn(async move {
            let gas = registry.get_gas(&network, &asset, &address).await;
            let _ = events.send(Event::FeeEstimated(gas));
        });
    }

    // =========================================================================
    // Cancel
    // =========================================================================

    fn on_cancel(&mut self) {
        let Some(swap_id) = self.state.swap_id else {
            return;
        };
        if !self.state.step.is_polling() || self.state.cancelling {
            debug!(step = ?self.state.step, "Ignoring cancel");
            return;
        }

        self.state.cancelling = true;
        self.state.notice = None;
        self.stop_polling();

        let backend = Arc::clone(&self.app.backend);
        let events = self.events_tx.clone();
        let call_timeout = self.call_timeout();
        tokio::spawn(async move {
            let result = timeout(call_timeout, backend.cancel_swap(swap_id))
                .await
                .unwrap_or(Err(BackendError::Timeout));
            let _ = events.send(Event::CancelFinished(result));
        });
    }

    fn on_cancel_finished(&mut self, result: Result<(), BackendError>) {
        self.state.cancelling = false;
        match result {
            Ok(()) => {
                info!(swap_id = ?self.state.swap_id, "Swap cancelled");
                self.set_step(SwapWithdrawalStep::Cancelled);
            }
            Err(e) => {
                warn!(error = %e, "Swap cancellation rejected");
                self.state.notice = Some(e.to_string());
                if self.state.step.is_polling() {
                    self.start_polling();
                }
            }
        }
    }

    // =========================================================================
    // Redirect recovery
    // =========================================================================

    fn on_begin_redirect(
        &mut self,
        values: SwapFormValues,
        reply: oneshot::Sender<Result<(), RecoveryStoreError>>,
    ) {
        self.state.form = values.clone();
        let snapshot = SwapFormSnapshot::capture(values, Utc::now());

        let result = self.app.recovery.save(&snapshot);
        if let Err(e) = &result {
            warn!(error = %e, "Failed to save redirect snapshot");
            self.state.notice = Some(e.to_string());
        }
        let _ = reply.send(result);
    }

    fn on_resume(&mut self, callback: &RedirectCallback) {
        if self.state.step != SwapWithdrawalStep::FormEntry {
            debug!(step = ?self.state.step, "Ignoring redirect resume");
            return;
        }
        self.deposit_lookup += 1;
        self.state.resolving_deposit_address = false;

        let loaded = self.app.recovery.load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read redirect snapshot");
            None
        });
        if let Err(e) = self.app.recovery.clear() {
            warn!(error = %e, "Failed to clear redirect snapshot");
        }

        self.state.deposit_address_from_account = false;
        let now = Utc::now();
        let snapshot = match loaded {
            Some(snapshot) if snapshot.is_fresh_at(now) => snapshot,
            Some(snapshot) => {
                info!(captured_at = %snapshot.captured_at, "Redirect snapshot is stale; starting fresh");
                self.state.form = self.app.settings.initial_form_values_for(callback.url());
                return;
            }
            None => {
                debug!("No redirect snapshot; starting fresh");
                self.state.form = self.app.settings.initial_form_values_for(callback.url());
                return;
            }
        };

        info!(captured_at = %snapshot.captured_at, "Resuming swap form after redirect");
        self.state.form = snapshot.swap_form_values;

        let destination = self
            .state
            .form
            .to
            .as_deref()
            .and_then(|id| self.app.settings.network(id))
            .filter(|n| n.is_exchange);
        let (Some(exchange), Some(asset)) = (destination, self.state.form.asset.clone()) else {
            return;
        };

        self.state.resolving_deposit_address = true;
        let lookup = self.deposit_lookup;
        let exchange = exchange.internal_name.clone();
        let backend = Arc::clone(&self.app.backend);
        let events = self.events_tx.clone();
        let call_timeout = self.call_timeout();
        tokio::spawn(async move {
            let result = timeout(
                call_timeout,
                backend.get_exchange_deposit_address(&exchange, &asset),
            )
            .await
            .unwrap_or(Err(BackendError::Timeout));
            let _ = events.send(Event::DepositAddressResolved { lookup, result });
        });
    }

    fn on_deposit_address(&mut self, lookup: u64, result: Result<String, BackendError>) {
        if lookup != self.deposit_lookup || self.state.step != SwapWithdrawalStep::FormEntry {
            debug!(lookup, current = self.deposit_lookup, "Discarding superseded deposit address");
            return;
        }
        self.state.resolving_deposit_address = false;
        match result {
            Ok(address) => {
                self.state.form.destination_address = Some(address);
                self.state.deposit_address_from_account = true;
            }
            Err(e) => {
                warn!(error = %e, "Failed to resolve exchange deposit address");
                self.state.notice = Some(match e.api() {
                    Some(api) => api.message.clone(),
                    None => e.to_string(),
                });
            }
        }
    }
}

/// Caller side of a running controller. Dropping it tears the controller
/// down.
pub struct ControllerHandle {
    events: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<ControllerState>,
    transitions: broadcast::Sender<SwapWithdrawalStep>,
    shutdown: CancellationToken,
    _guard: DropGuard,
    task: Option<JoinHandle<()>>,
}

impl ControllerHandle {
    fn send(&self, event: Event) -> Result<(), ControllerError> {
        if self.shutdown.is_cancelled() {
            return Err(ControllerError::Closed);
        }
        self.events.send(event).map_err(|_| ControllerError::Closed)
    }

    /// Submit the form. Ignored unless the controller is at form entry.
    pub fn submit(&self, values: SwapFormValues) -> Result<(), ControllerError> {
        self.send(Event::Submit(values))
    }

    /// Ask the backend to cancel the active swap. The step moves to
    /// `Cancelled` only once the backend acknowledges.
    pub fn cancel(&self) -> Result<(), ControllerError> {
        self.send(Event::Cancel)
    }

    /// Persist the form before navigating to an external page. Resolves
    /// once the snapshot is durable.
    pub async fn begin_redirect(&self, values: SwapFormValues) -> Result<(), ControllerError> {
        let (reply, done) = oneshot::channel();
        self.send(Event::BeginRedirect { values, reply })?;
        done.await.map_err(|_| ControllerError::Closed)??;
        Ok(())
    }

    /// Handle a return from an external redirect. A fresh snapshot restores
    /// the form; otherwise it starts over from the callback URL's query.
    pub fn resume(&self, callback: RedirectCallback) -> Result<(), ControllerError> {
        self.send(Event::Resume(callback))
    }

    /// Latest published state.
    pub fn state(&self) -> ControllerState {
        self.state.borrow().clone()
    }

    /// Receiver that sees every published state.
    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state.clone()
    }

    /// Every step change, in order.
    pub fn transitions(&self) -> broadcast::Receiver<SwapWithdrawalStep> {
        self.transitions.subscribe()
    }

    /// Stop polling and the controller task, waiting for it to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::MockAuthService;
    use crate::auth::{AuthSessionBootstrapper, SessionState};
    use crate::backend::test_support::MockBackend;
    use crate::backend::{ApiError, SwapBackend};
    use crate::config::{AppConfig, Settings};
    use crate::models::AuthorizationFlow;
    use crate::providers::test_support::{network, StubProvider};
    use crate::providers::BalanceProviderRegistry;
    use crate::storage::RedirectRecoveryStore;
    use url::Url;

    const ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f4aB12";

    struct Harness {
        app: AppState,
        backend: Arc<MockBackend>,
        auth: Arc<MockAuthService>,
        _dir: tempfile::TempDir,
    }

    fn settings() -> Settings {
        let mut coinbase = network("COINBASE");
        coinbase.display_name = "Coinbase".to_string();
        coinbase.is_exchange = true;
        coinbase.authorization_flow = AuthorizationFlow::OAuth2;
        let mut zksync = network("ZKSYNC_MAINNET");
        zksync.display_name = "zkSync Lite".to_string();
        Settings::new(vec![network("ETHEREUM_SEPOLIA"), zksync, coinbase]).unwrap()
    }

    fn swap(destination: &str) -> Swap {
        Swap {
            id: Uuid::new_v4(),
            requested_amount: "0.5".to_string(),
            source_network: "ETHEREUM_SEPOLIA".to_string(),
            source_asset: "ETH".to_string(),
            destination_network: destination.to_string(),
            destination_asset: "ETH".to_string(),
            destination_address: Some(ADDRESS.to_string()),
            status: "created".to_string(),
            additional_data: None,
        }
    }

    fn form(destination: &str) -> SwapFormValues {
        SwapFormValues {
            amount: Some("0.5".to_string()),
            from: Some("ETHEREUM_SEPOLIA".to_string()),
            to: Some(destination.to_string()),
            asset: Some("ETH".to_string()),
            destination_address: Some(ADDRESS.to_string()),
        }
    }

    fn callback(query: &str) -> RedirectCallback {
        let url =
            Url::parse(&format!("https://app.example/swap?oauth_redirect=true{query}")).unwrap();
        RedirectCallback::from_url(&url).unwrap()
    }

    fn harness_with(backend: MockBackend, auth: MockAuthService) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            ..AppConfig::default()
        };
        let registry = BalanceProviderRegistry::builder()
            .register(StubProvider::new("stub", &["ETHEREUM_SEPOLIA"]))
            .build()
            .unwrap();
        let recovery = RedirectRecoveryStore::open(&config.recovery_db_path()).unwrap();

        let backend = Arc::new(backend);
        let auth = Arc::new(auth);
        let session = SessionState::new();
        let app = AppState {
            config: Arc::new(config),
            settings: Arc::new(settings()),
            registry: Arc::new(registry),
            bootstrapper: Arc::new(AuthSessionBootstrapper::new(auth.clone(), session.clone())),
            session,
            backend: backend.clone() as Arc<dyn SwapBackend>,
            recovery: Arc::new(recovery),
        };

        Harness {
            app,
            backend,
            auth,
            _dir: dir,
        }
    }

    fn harness(backend: MockBackend) -> Harness {
        harness_with(backend, MockAuthService::new())
    }

    async fn wait_for(
        handle: &ControllerHandle,
        condition: impl FnMut(&ControllerState) -> bool,
    ) -> ControllerState {
        let mut rx = handle.subscribe();
        let state = timeout(Duration::from_secs(120), rx.wait_for(condition))
            .await
            .expect("condition not reached")
            .expect("controller closed");
        state.clone()
    }

    #[tokio::test(start_paused = true)]
    async fn status_sequence_drives_steps_and_stops_polling_at_completion() {
        let h = harness(
            MockBackend::new(swap("ZKSYNC_MAINNET"))
                .with_statuses(&["created", "deposit_detected", "completed"]),
        );
        let handle = SwapLifecycleController::spawn(h.app.clone());
        let mut transitions = handle.transitions();

        handle.submit(form("ZKSYNC_MAINNET")).unwrap();

        let mut seen = Vec::new();
        while seen.last() != Some(&SwapWithdrawalStep::Completed) {
            let step = timeout(Duration::from_secs(60), transitions.recv())
                .await
                .unwrap()
                .unwrap();
            seen.push(step);
        }
        assert_eq!(
            seen,
            vec![
                SwapWithdrawalStep::CreatingSwap,
                SwapWithdrawalStep::AwaitingUserAction(UserAction::DepositAddressShown),
                SwapWithdrawalStep::AwaitingConfirmation,
                SwapWithdrawalStep::Completed,
            ]
        );

        let state = wait_for(&handle, |s| !s.polling).await;
        assert_eq!(state.step, SwapWithdrawalStep::Completed);
        let polls = MockBackend::count(&h.backend.get_calls);
        assert_eq!(polls, 3);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(MockBackend::count(&h.backend.get_calls), polls);
        assert_eq!(MockBackend::count(&h.backend.create_calls), 1);
        assert_eq!(h.auth.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn network_fee_is_published_after_creation() {
        let h = harness(MockBackend::new(swap("ZKSYNC_MAINNET")));
        let handle = SwapLifecycleController::spawn(h.app.clone());

        handle.submit(form("ZKSYNC_MAINNET")).unwrap();
        let state = wait_for(&handle, |s| s.network_fee.is_some()).await;

        let fee = state.network_fee.unwrap();
        assert_eq!(fee.token, "ETH");
        assert_eq!(fee.gas, "0.0001");
    }

    #[tokio::test(start_paused = true)]
    async fn unactivated_address_opens_connect_prompt_without_duplicate_create() {
        let h = harness(MockBackend::new(swap("ZKSYNC_MAINNET")));
        h.backend.push_create_result(Err(BackendError::Api(ApiError::new(
            KnownErrorCode::UnactivatedAddress,
            "https://example/connect",
        ))));
        let handle = SwapLifecycleController::spawn(h.app.clone());

        handle.submit(form("ZKSYNC_MAINNET")).unwrap();
        let state = wait_for(&handle, |s| s.connect_prompt.is_some()).await;

        assert_eq!(state.step, SwapWithdrawalStep::FormEntry);
        assert_eq!(
            state.connect_prompt,
            Some(ConnectNetworkPrompt {
                network_display_name: "zkSync Lite".to_string(),
                app_url: "https://example/connect".to_string(),
            })
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(MockBackend::count(&h.backend.create_calls), 1);
        assert_eq!(MockBackend::count(&h.backend.get_calls), 0);

        // Only an explicit re-submit creates again.
        handle.submit(form("ZKSYNC_MAINNET")).unwrap();
        wait_for(&handle, |s| s.swap_id.is_some()).await;
        assert_eq!(MockBackend::count(&h.backend.create_calls), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn address_errors_map_to_notices() {
        let h = harness(MockBackend::new(swap("ZKSYNC_MAINNET")));
        h.backend.push_create_result(Err(BackendError::Api(ApiError::new(
            KnownErrorCode::InvalidAddress,
            "bad address",
        ))));
        h.backend.push_create_result(Err(BackendError::Api(ApiError::new(
            KnownErrorCode::BlacklistedAddress,
            "blocked",
        ))));
        h.backend.push_create_result(Err(BackendError::Api(ApiError::new(
            "SOMETHING_NEW".to_string(),
            "Try again later",
        ))));
        let handle = SwapLifecycleController::spawn(h.app.clone());

        let expected = [
            "Enter valid zkSync Lite address",
            BLACKLISTED_ADDRESS_NOTICE,
            "Try again later",
        ];
        for notice in expected {
            handle.submit(form("ZKSYNC_MAINNET")).unwrap();
            let state = wait_for(&handle, |s| s.notice.as_deref() == Some(notice)).await;
            assert_eq!(state.step, SwapWithdrawalStep::FormEntry);
        }
        assert_eq!(MockBackend::count(&h.backend.create_calls), 3);
        assert_eq!(MockBackend::count(&h.backend.get_calls), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_aborts_submit_before_creation() {
        let h = harness_with(
            MockBackend::new(swap("ZKSYNC_MAINNET")),
            MockAuthService::new().failing(),
        );
        let handle = SwapLifecycleController::spawn(h.app.clone());

        handle.submit(form("ZKSYNC_MAINNET")).unwrap();
        let state = wait_for(&handle, |s| s.submit_error.is_some()).await;

        assert_eq!(state.step, SwapWithdrawalStep::FormEntry);
        assert!(matches!(
            state.submit_error,
            Some(SubmitFailure::Auth(AuthError::AuthBootstrapFailed(_)))
        ));
        assert_eq!(MockBackend::count(&h.backend.create_calls), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.auth.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_status_holds_step_and_reports_fault() {
        let h = harness(
            MockBackend::new(swap("ZKSYNC_MAINNET"))
                .with_statuses(&["created", "teleporting", "completed"]),
        );
        let handle = SwapLifecycleController::spawn(h.app.clone());

        handle.submit(form("ZKSYNC_MAINNET")).unwrap();
        let state = wait_for(&handle, |s| s.fault.is_some()).await;
        assert_eq!(
            state.fault,
            Some(ControllerFault::UnrecognizedStatus("teleporting".to_string()))
        );
        assert_eq!(
            state.step,
            SwapWithdrawalStep::AwaitingUserAction(UserAction::DepositAddressShown)
        );
        assert!(state.polling);

        let state = wait_for(&handle, |s| s.step == SwapWithdrawalStep::Completed).await;
        assert_eq!(state.fault, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_waits_for_backend_acknowledgement() {
        let h = harness(MockBackend::new(swap("COINBASE")));
        h.backend
            .fail_cancel(BackendError::Transport("cancel returned 409".to_string()));
        let handle = SwapLifecycleController::spawn(h.app.clone());

        handle.submit(form("COINBASE")).unwrap();
        let state = wait_for(&handle, |s| s.step.is_polling()).await;
        assert_eq!(
            state.step,
            SwapWithdrawalStep::AwaitingUserAction(UserAction::ExchangeOAuthRedirect)
        );

        handle.cancel().unwrap();
        let state = wait_for(&handle, |s| s.notice.is_some()).await;
        assert!(state.step.is_polling());
        assert!(state.polling, "polling resumes after a rejected cancel");

        handle.cancel().unwrap();
        let state = wait_for(&handle, |s| s.step == SwapWithdrawalStep::Cancelled).await;
        assert!(!state.polling);
        assert_eq!(MockBackend::count(&h.backend.cancel_calls), 2);

        let polls = MockBackend::count(&h.backend.get_calls);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(MockBackend::count(&h.backend.get_calls), polls);
    }

    #[tokio::test]
    async fn out_of_order_poll_results_are_discarded() {
        let h = harness(MockBackend::new(swap("ZKSYNC_MAINNET")));
        let (mut controller, _rx) = SwapLifecycleController::new(h.app.clone());
        controller.state.swap_id = Some(h.backend.swap.id);
        controller.state.step =
            SwapWithdrawalStep::AwaitingUserAction(UserAction::DepositAddressShown);

        let mut detected = h.backend.swap.clone();
        detected.status = "deposit_detected".to_string();
        controller.handle(Event::PollCompleted {
            seq: 2,
            result: Ok(detected),
        });
        assert_eq!(controller.state.step, SwapWithdrawalStep::AwaitingConfirmation);

        controller.handle(Event::PollCompleted {
            seq: 1,
            result: Ok(h.backend.swap.clone()),
        });
        assert_eq!(controller.state.step, SwapWithdrawalStep::AwaitingConfirmation);

        // Results issued before polling stopped never apply.
        controller.sequence.store(10, Ordering::SeqCst);
        controller.stop_polling();
        assert_eq!(controller.min_valid_seq, 11);
        let mut done = h.backend.swap.clone();
        done.status = "completed".to_string();
        controller.handle(Event::PollCompleted {
            seq: 5,
            result: Ok(done),
        });
        assert_eq!(controller.state.step, SwapWithdrawalStep::AwaitingConfirmation);
        controller.shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_stops_polling() {
        let h = harness(MockBackend::new(swap("ZKSYNC_MAINNET")));
        let handle = SwapLifecycleController::spawn(h.app.clone());

        handle.submit(form("ZKSYNC_MAINNET")).unwrap();
        wait_for(&handle, |s| s.polling).await;
        handle.shutdown().await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        let polls = MockBackend::count(&h.backend.get_calls);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(MockBackend::count(&h.backend.get_calls), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_snapshot_is_restored_with_account_deposit_address() {
        let h = harness(MockBackend::new(swap("COINBASE")));
        h.backend.set_deposit_address(Ok("0xcoinbase".to_string()));

        let before = SwapLifecycleController::spawn(h.app.clone());
        let mut values = form("COINBASE");
        values.destination_address = None;
        before.begin_redirect(values.clone()).await.unwrap();
        before.shutdown().await;
        assert!(h.app.recovery.has_pending().unwrap());

        // A new controller stands in for the reloaded page.
        let after = SwapLifecycleController::spawn(h.app.clone());
        after.resume(callback("")).unwrap();
        let state = wait_for(&after, |s| s.deposit_address_from_account).await;

        assert_eq!(state.step, SwapWithdrawalStep::FormEntry);
        assert_eq!(state.form.amount, values.amount);
        assert_eq!(state.form.to.as_deref(), Some("COINBASE"));
        assert_eq!(state.form.destination_address.as_deref(), Some("0xcoinbase"));
        assert!(!state.resolving_deposit_address);
        assert_eq!(MockBackend::count(&h.backend.deposit_calls), 1);
        assert!(!h.app.recovery.has_pending().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_snapshot_falls_back_to_fresh_form() {
        let h = harness(MockBackend::new(swap("COINBASE")));
        let stale = SwapFormSnapshot::capture(
            form("COINBASE"),
            Utc::now() - chrono::Duration::seconds(5 * 60 + 1),
        );
        h.app.recovery.save(&stale).unwrap();

        let handle = SwapLifecycleController::spawn(h.app.clone());
        handle
            .resume(callback("&to=zksync_mainnet&amount=3"))
            .unwrap();
        let state = wait_for(&handle, |s| s.form.to.is_some()).await;

        // The stale snapshot's COINBASE destination is gone; the query wins.
        let defaults = h.app.settings.initial_form_values();
        assert_eq!(
            state.form,
            SwapFormValues {
                to: Some("ZKSYNC_MAINNET".to_string()),
                amount: Some("3".to_string()),
                ..defaults
            }
        );
        assert!(!h.app.recovery.has_pending().unwrap());
        assert!(!state.deposit_address_from_account);
        assert_eq!(MockBackend::count(&h.backend.deposit_calls), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn absent_snapshot_falls_back_to_fresh_form() {
        let h = harness(MockBackend::new(swap("COINBASE")));
        let handle = SwapLifecycleController::spawn(h.app.clone());

        handle.resume(callback("")).unwrap();
        handle.submit(SwapFormValues::default()).unwrap();
        let state = wait_for(&handle, |s| s.notice.is_some()).await;

        assert_eq!(state.step, SwapWithdrawalStep::FormEntry);
        assert_eq!(MockBackend::count(&h.backend.deposit_calls), 0);
        assert_eq!(MockBackend::count(&h.backend.create_calls), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn absent_snapshot_prefills_from_callback_query() {
        let h = harness(MockBackend::new(swap("COINBASE")));
        let handle = SwapLifecycleController::spawn(h.app.clone());

        handle
            .resume(callback(&format!("&from=ZKSYNC_MAINNET&destAddress={ADDRESS}")))
            .unwrap();
        let state = wait_for(&handle, |s| s.form.destination_address.is_some()).await;

        assert_eq!(state.form.from.as_deref(), Some("ZKSYNC_MAINNET"));
        assert_eq!(state.form.asset.as_deref(), Some("ETH"));
        assert_eq!(state.form.destination_address.as_deref(), Some(ADDRESS));
        assert!(!state.deposit_address_from_account);
        assert_eq!(MockBackend::count(&h.backend.deposit_calls), 0);
    }

    fn save_fresh_coinbase_snapshot(h: &Harness) {
        let mut values = form("COINBASE");
        values.destination_address = None;
        h.app
            .recovery
            .save(&SwapFormSnapshot::capture(values, Utc::now()))
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn deposit_address_resolved_after_submit_is_dropped() {
        let h = harness(MockBackend::new(swap("COINBASE")));
        h.backend.set_deposit_address(Ok("0xcoinbase".to_string()));
        h.backend.set_deposit_delay(Some(Duration::from_secs(3)));
        h.backend.push_create_result(Err(BackendError::Api(ApiError::new(
            KnownErrorCode::InvalidAddress,
            "bad address",
        ))));
        save_fresh_coinbase_snapshot(&h);

        let handle = SwapLifecycleController::spawn(h.app.clone());
        handle.resume(callback("")).unwrap();
        wait_for(&handle, |s| s.resolving_deposit_address).await;

        // The rejected submit lands back on the form before the lookup ends.
        handle.submit(form("COINBASE")).unwrap();
        let state = wait_for(&handle, |s| s.notice.is_some()).await;
        assert_eq!(state.step, SwapWithdrawalStep::FormEntry);
        assert!(!state.resolving_deposit_address);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(MockBackend::count(&h.backend.deposit_calls), 1);
        let state = handle.state();
        assert_eq!(state.form.destination_address.as_deref(), Some(ADDRESS));
        assert!(!state.deposit_address_from_account);
        assert!(!state.resolving_deposit_address);
    }

    #[tokio::test(start_paused = true)]
    async fn second_resume_ignores_earlier_deposit_lookup() {
        let h = harness(MockBackend::new(swap("COINBASE")));
        h.backend.set_deposit_address(Ok("0xcoinbase".to_string()));
        h.backend.set_deposit_delay(Some(Duration::from_secs(3)));
        save_fresh_coinbase_snapshot(&h);

        let handle = SwapLifecycleController::spawn(h.app.clone());
        handle.resume(callback("")).unwrap();
        wait_for(&handle, |s| s.resolving_deposit_address).await;

        // The first resume consumed the snapshot; this one starts fresh.
        handle.resume(callback("")).unwrap();
        wait_for(&handle, |s| !s.resolving_deposit_address).await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(MockBackend::count(&h.backend.deposit_calls), 1);
        let state = handle.state();
        assert_eq!(state.form, h.app.settings.initial_form_values());
        assert!(!state.deposit_address_from_account);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_in_flight_poll_never_completes() {
        let h = harness(MockBackend::new(swap("ZKSYNC_MAINNET")).with_statuses(&["completed"]));
        h.backend.set_poll_delay(Some(Duration::from_secs(10)));
        let handle = SwapLifecycleController::spawn(h.app.clone());
        let mut transitions = handle.transitions();

        handle.submit(form("ZKSYNC_MAINNET")).unwrap();
        while MockBackend::count(&h.backend.get_calls) == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        // The poll in flight would report "completed" once its delay ends.
        handle.cancel().unwrap();
        let state = wait_for(&handle, |s| s.step == SwapWithdrawalStep::Cancelled).await;
        assert!(!state.polling);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(handle.state().step, SwapWithdrawalStep::Cancelled);
        assert_eq!(MockBackend::count(&h.backend.get_calls), 1);

        let mut seen = Vec::new();
        while let Ok(step) = transitions.try_recv() {
            seen.push(step);
        }
        assert!(!seen.contains(&SwapWithdrawalStep::Completed));
        assert_eq!(seen.last(), Some(&SwapWithdrawalStep::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_during_in_flight_poll_stops_fetching() {
        let h = harness(MockBackend::new(swap("ZKSYNC_MAINNET")).with_statuses(&["completed"]));
        h.backend.set_poll_delay(Some(Duration::from_secs(10)));
        let handle = SwapLifecycleController::spawn(h.app.clone());

        handle.submit(form("ZKSYNC_MAINNET")).unwrap();
        while MockBackend::count(&h.backend.get_calls) == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        handle.shutdown().await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(MockBackend::count(&h.backend.get_calls), 1);
    }
}
