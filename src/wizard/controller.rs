use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::callback::{classify_callback, CallbackAction, CallbackParams};
use super::machine::{ManualForm, StepError, Ticket, Transition, WizardRun, WizardStep};
use super::WizardError;
use crate::config::WizardConfig;
use crate::error::ConnectError;
use crate::models::{HandshakeHandoff, ServiceType, RESOURCE_SELECT_MARKER};
use crate::providers::{AuthMode, ProviderAccessToken, ProviderAdapter, ProviderRegistry};
use crate::reconciler::{RefreshHandle, RefreshSignal};
use crate::session::Session;

pub const DASHBOARD_PATH: &str = "/dashboard";

/// What the wizard looks like right now, as served to the browser.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub open: bool,
    pub run_id: Option<Uuid>,
    pub provider: Option<ServiceType>,
    pub loading: bool,
    pub step: Option<WizardStep>,
    /// How long to show the confirmation before going back to the dashboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_delay_ms: Option<u64>,
}

/// Result of a provider redirecting back to `/callback/<provider>`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallbackOutcome {
    /// The flow continues in the resource picker on the dashboard.
    Redirect { location: String },
    #[serde(rename_all = "camelCase")]
    Connected {
        provider: ServiceType,
        display_delay_ms: u64,
        redirect: String,
    },
    Failed {
        provider: ServiceType,
        error: StepError,
        redirect: String,
    },
    /// The backend refused our credential; back to the entry point.
    SessionEnded { redirect: String },
}

pub struct WizardController {
    providers: Arc<ProviderRegistry>,
    session: Arc<Session>,
    refresh: RefreshHandle,
    settings: WizardConfig,
    run: Mutex<Option<WizardRun>>,
}

impl WizardController {
    pub fn new(
        providers: Arc<ProviderRegistry>,
        session: Arc<Session>,
        refresh: RefreshHandle,
        settings: WizardConfig,
    ) -> Self {
        WizardController {
            providers,
            session,
            refresh,
            settings,
            run: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<WizardRun>> {
        self.run.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn view_of(&self, run: Option<&WizardRun>) -> WizardView {
        let Some(run) = run else {
            return WizardView {
                open: false,
                run_id: None,
                provider: None,
                loading: false,
                step: None,
                display_delay_ms: None,
            };
        };
        let connected = matches!(run.step(), WizardStep::Connected);
        WizardView {
            open: true,
            run_id: Some(run.run_id),
            provider: Some(run.provider),
            loading: run.is_loading(),
            step: Some(run.step().clone()),
            display_delay_ms: connected.then_some(self.settings.connected_display_delay_ms),
        }
    }

    pub fn view(&self) -> WizardView {
        let guard = self.lock();
        self.view_of(guard.as_ref())
    }

    fn provider(&self, service_type: ServiceType) -> Result<Arc<dyn ProviderAdapter>, WizardError> {
        self.providers
            .get(service_type)
            .ok_or_else(|| WizardError::UnknownProvider(service_type.provider_slug().to_string()))
    }

    fn transition(
        &self,
        action: &'static str,
        apply: impl FnOnce(&mut WizardRun) -> Transition,
    ) -> Result<WizardView, WizardError> {
        let mut guard = self.lock();
        let run = guard.as_mut().ok_or(WizardError::NotOpen)?;
        match apply(&mut *run) {
            Transition::Applied => {
                debug!(
                    event_name = "wizard.transition",
                    event_domain = "wizard",
                    run_id = %run.run_id,
                    action,
                    step = run.step().name(),
                    "wizard moved"
                );
                Ok(self.view_of(Some(&*run)))
            }
            Transition::Rejected { step } => Err(WizardError::InvalidAction { action, step }),
        }
    }

    /// Apply a response only if the run and step that issued it are still current.
    fn apply_response(&self, ticket: &Ticket, apply: impl FnOnce(&mut WizardRun)) -> bool {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(run) if run.is_current(ticket) => {
                apply(run);
                true
            }
            _ => {
                info!(
                    event_name = "wizard.stale_response",
                    event_domain = "wizard",
                    run_id = %ticket.run_id,
                    step = ticket.step,
                    "Dropping response for a wizard step that is no longer active"
                );
                false
            }
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.lock()
            .as_ref()
            .map(|run| run.is_current(ticket))
            .unwrap_or(false)
    }

    /// The backend refused our credential mid-flow: close the wizard and end the
    /// session. Returns `false`, touching nothing, when the request was issued
    /// under a session that has since been replaced.
    async fn end_session(&self, epoch: u64) -> bool {
        match self.session.logout_if_current(epoch).await {
            Ok(false) => return false,
            Ok(true) => {}
            Err(e) => error!(
                event_name = "session.teardown_failed",
                event_domain = "session",
                "Failed to clear credentials: {}",
                e
            ),
        }
        self.lock().take();
        true
    }

    async fn submit_failed(
        &self,
        ticket: &Ticket,
        epoch: u64,
        err: ConnectError,
    ) -> Result<WizardView, WizardError> {
        if err.is_auth_rejected() {
            if self.end_session(epoch).await {
                return Err(WizardError::Connect(ConnectError::AuthRejected));
            }
            return Ok(self.view());
        }
        warn!(
            event_name = "wizard.submit_failed",
            event_domain = "wizard",
            run_id = %ticket.run_id,
            kind = err.kind(),
            "Submission failed: {}",
            err
        );
        self.apply_response(ticket, |run| run.fail_submit(StepError::from(&err)));
        Ok(self.view())
    }

    fn submit_succeeded(&self, ticket: &Ticket) -> WizardView {
        self.apply_response(ticket, |run| run.complete());
        info!(
            event_name = "wizard.connected",
            event_domain = "wizard",
            run_id = %ticket.run_id,
            "Connection created"
        );
        // The backend changed even if the user closed the wizard meanwhile.
        self.refresh.signal(RefreshSignal::WizardCompleted);
        self.view()
    }

    /// Start a new run for `service_type`, replacing any open one.
    pub fn open(&self, service_type: ServiceType) -> Result<WizardView, WizardError> {
        self.provider(service_type)?;
        let run = WizardRun::open(service_type);
        info!(
            event_name = "wizard.opened",
            event_domain = "wizard",
            run_id = %run.run_id,
            provider = service_type.provider_slug(),
            "Connection wizard opened"
        );
        let mut guard = self.lock();
        *guard = Some(run);
        Ok(self.view_of(guard.as_ref()))
    }

    pub fn back(&self) -> Result<WizardView, WizardError> {
        self.transition("back", |run| run.back())
    }

    /// Always safe: in-flight responses are dropped when they arrive.
    pub fn close(&self) -> WizardView {
        if let Some(run) = self.lock().take() {
            info!(
                event_name = "wizard.closed",
                event_domain = "wizard",
                run_id = %run.run_id,
                step = run.step().name(),
                "Connection wizard closed"
            );
        }
        self.view()
    }

    /// Build the provider redirect. Providers with resources to pick always
    /// continue in the picker after the callback.
    pub fn choose_delegated(&self) -> Result<WizardView, WizardError> {
        let service_type = {
            let guard = self.lock();
            guard.as_ref().ok_or(WizardError::NotOpen)?.provider
        };
        let provider = self.provider(service_type)?;
        let mode = if provider.resources().is_some() {
            AuthMode::ResourceSelect
        } else {
            AuthMode::Connect
        };
        let url = provider.build_authorization_url(mode);
        self.transition("choose_delegated", |run| {
            run.choose_delegated(url.to_string())
        })
    }

    pub fn choose_manual(&self) -> Result<WizardView, WizardError> {
        self.transition("choose_manual", |run| run.choose_manual())
    }

    /// Validate the token, and only when it is valid create the connection.
    pub async fn submit_manual(&self, name: &str, token: &str) -> Result<WizardView, WizardError> {
        let name = name.trim();
        let token = token.trim();

        let epoch = self.session.epoch();
        let (ticket, provider) = {
            let mut guard = self.lock();
            let run = guard.as_mut().ok_or(WizardError::NotOpen)?;
            let step = run.step().name();
            if !matches!(run.step(), WizardStep::ManualEntry { .. }) {
                return Err(WizardError::InvalidAction {
                    action: "submit_manual",
                    step,
                });
            }
            let provider = self.provider(run.provider)?;
            let ticket = run.begin_submit().ok_or(WizardError::InvalidAction {
                action: "submit_manual",
                step,
            })?;
            run.set_manual_form(ManualForm::new(name, token));
            if name.is_empty() || token.is_empty() {
                run.fail_submit(StepError::from(&ConnectError::ValidationFailed(
                    "a display name and a token are both required".to_string(),
                )));
                return Ok(self.view_of(Some(&*run)));
            }
            (ticket, provider)
        };

        let validation = match provider.validate_token(token).await {
            Ok(validation) => validation,
            Err(e) => return self.submit_failed(&ticket, epoch, e).await,
        };
        if !validation.is_valid {
            return self
                .submit_failed(
                    &ticket,
                    epoch,
                    ConnectError::ValidationFailed(format!(
                        "{} did not accept this token",
                        provider.get_name()
                    )),
                )
                .await;
        }

        // Closed or moved on while validating: create nothing.
        if !self.is_current(&ticket) {
            info!(
                event_name = "wizard.stale_response",
                event_domain = "wizard",
                run_id = %ticket.run_id,
                "Wizard moved on during validation; not creating the connection"
            );
            return Ok(self.view());
        }

        match provider.manual_setup(name, token).await {
            Ok(_) => Ok(self.submit_succeeded(&ticket)),
            Err(e) => self.submit_failed(&ticket, epoch, e).await,
        }
    }

    /// Consume a pending handoff, if any, and reopen the wizard in the picker.
    pub async fn resume_from_handoff(&self) -> Result<Option<WizardView>, WizardError> {
        let Some(raw) = self
            .session
            .store()
            .take_handoff()
            .await
            .map_err(WizardError::Store)?
        else {
            debug!(
                event_name = "wizard.no_handoff",
                event_domain = "wizard",
                "Picker requested but no handoff is pending"
            );
            return Ok(None);
        };

        let ttl = chrono::Duration::seconds(i64::from(self.settings.handoff_ttl_secs));
        let handoff = HandshakeHandoff::from_value(raw, ttl, Utc::now()).map_err(|e| {
            warn!(
                event_name = "wizard.invalid_handoff",
                event_domain = "wizard",
                "Discarding handoff: {}",
                e
            );
            WizardError::Connect(e)
        })?;

        let provider = self.provider(handoff.provider)?;
        if provider.resources().is_none() {
            return Err(WizardError::Connect(ConnectError::InvalidHandoff(format!(
                "{} has no resources to pick from",
                provider.get_name()
            ))));
        }

        let token = ProviderAccessToken::new(handoff.provider_access_token);
        let epoch = self.session.epoch();
        let ticket = {
            let run = WizardRun::resume_picking(handoff.provider, token.clone());
            info!(
                event_name = "wizard.resumed",
                event_domain = "wizard",
                run_id = %run.run_id,
                provider = handoff.provider.provider_slug(),
                "Reopening the resource picker from a handoff"
            );
            let ticket = run.ticket();
            *self.lock() = Some(run);
            ticket
        };

        self.load_resources(provider, ticket, epoch, token)
            .await
            .map(Some)
    }

    /// Fetch the picker's list again, e.g. after a network failure.
    pub async fn reload_resources(&self) -> Result<WizardView, WizardError> {
        let epoch = self.session.epoch();
        let (provider, ticket, token) = {
            let mut guard = self.lock();
            let run = guard.as_mut().ok_or(WizardError::NotOpen)?;
            let step = run.step().name();
            let provider = self.provider(run.provider)?;
            let ticket = run
                .begin_loading_resources()
                .ok_or(WizardError::InvalidAction {
                    action: "reload_resources",
                    step,
                })?;
            let token = run.provider_token().cloned().ok_or(WizardError::InvalidAction {
                action: "reload_resources",
                step,
            })?;
            (provider, ticket, token)
        };
        self.load_resources(provider, ticket, epoch, token).await
    }

    async fn load_resources(
        &self,
        provider: Arc<dyn ProviderAdapter>,
        ticket: Ticket,
        epoch: u64,
        token: ProviderAccessToken,
    ) -> Result<WizardView, WizardError> {
        let Some(catalog) = provider.resources() else {
            return Err(WizardError::UnknownProvider(provider.slug().to_string()));
        };
        match catalog.list_resources(token.secret()).await {
            Ok(resources) => {
                let selectable = resources.iter().filter(|r| r.is_selectable()).count();
                debug!(
                    event_name = "wizard.resources_loaded",
                    event_domain = "wizard",
                    run_id = %ticket.run_id,
                    total = resources.len(),
                    selectable,
                    "Loaded attachable resources"
                );
                self.apply_response(&ticket, |run| run.resources_loaded(resources));
            }
            Err(ConnectError::AuthRejected) => {
                if self.end_session(epoch).await {
                    return Err(WizardError::Connect(ConnectError::AuthRejected));
                }
            }
            Err(e) => {
                warn!(
                    event_name = "wizard.resources_failed",
                    event_domain = "wizard",
                    run_id = %ticket.run_id,
                    kind = e.kind(),
                    "Failed to list resources: {}",
                    e
                );
                self.apply_response(&ticket, |run| run.fail_submit(StepError::from(&e)));
            }
        }
        Ok(self.view())
    }

    /// Selecting an already-attached or unknown resource changes nothing.
    pub fn select_resource(&self, resource_id: u64) -> Result<WizardView, WizardError> {
        let mut guard = self.lock();
        let run = guard.as_mut().ok_or(WizardError::NotOpen)?;
        if !run.select_resource(resource_id) {
            debug!(
                event_name = "wizard.selection_ignored",
                event_domain = "wizard",
                run_id = %run.run_id,
                resource_id,
                "Resource is not selectable"
            );
        }
        Ok(self.view_of(Some(&*run)))
    }

    pub async fn submit_resource(&self) -> Result<WizardView, WizardError> {
        let epoch = self.session.epoch();
        let (ticket, provider, resource, token) = {
            let mut guard = self.lock();
            let run = guard.as_mut().ok_or(WizardError::NotOpen)?;
            let step = run.step().name();
            let rejected = WizardError::InvalidAction {
                action: "submit_resource",
                step,
            };
            if !matches!(run.step(), WizardStep::ResourcePicking { .. }) {
                return Err(rejected);
            }
            let provider = self.provider(run.provider)?;
            let Some(ticket) = run.begin_submit() else {
                return Err(rejected);
            };
            let (Some(resource), Some(token)) =
                (run.submitting_resource(), run.provider_token().cloned())
            else {
                run.fail_submit(StepError::from(&ConnectError::InvalidHandoff(
                    "the provider token for this flow is gone".to_string(),
                )));
                return Ok(self.view_of(Some(&*run)));
            };
            (ticket, provider, resource, token)
        };

        let Some(catalog) = provider.resources() else {
            return Err(WizardError::UnknownProvider(provider.slug().to_string()));
        };
        match catalog.attach_resource(&resource, token.secret()).await {
            Ok(_) => Ok(self.submit_succeeded(&ticket)),
            Err(e) => self.submit_failed(&ticket, epoch, e).await,
        }
    }

    /// Finish a provider redirect. Reads only the query string, never the
    /// in-memory run, which belonged to the page that redirected away.
    pub async fn handle_callback(
        &self,
        service_type: ServiceType,
        params: &CallbackParams,
    ) -> Result<CallbackOutcome, WizardError> {
        let provider = self.provider(service_type)?;
        let epoch = self.session.epoch();
        self.lock().take();

        let failed = |err: &ConnectError| {
            warn!(
                event_name = "wizard.callback_failed",
                event_domain = "wizard",
                provider = service_type.provider_slug(),
                kind = err.kind(),
                "Authorization callback failed: {}",
                err
            );
            CallbackOutcome::Failed {
                provider: service_type,
                error: StepError::from(err),
                redirect: DASHBOARD_PATH.to_string(),
            }
        };
        let rejected = |ended: bool| {
            if ended {
                CallbackOutcome::SessionEnded {
                    redirect: "/".to_string(),
                }
            } else {
                failed(&ConnectError::AuthRejected)
            }
        };

        match classify_callback(params) {
            CallbackAction::Fail(err) => Ok(failed(&err)),
            CallbackAction::ResourceSelect { code } => match provider.exchange_code(&code).await {
                Ok(token) => {
                    let handoff = HandshakeHandoff::resource_select(service_type, token.secret());
                    self.session
                        .store()
                        .put_handoff(handoff.to_value())
                        .await
                        .map_err(WizardError::Store)?;
                    info!(
                        event_name = "wizard.handoff_written",
                        event_domain = "wizard",
                        provider = service_type.provider_slug(),
                        "Code exchanged; continuing in the resource picker"
                    );
                    Ok(CallbackOutcome::Redirect {
                        location: format!("{}?picker={}", DASHBOARD_PATH, RESOURCE_SELECT_MARKER),
                    })
                }
                Err(ConnectError::AuthRejected) => Ok(rejected(self.end_session(epoch).await)),
                Err(e) => Ok(failed(&e)),
            },
            CallbackAction::Connect { code, state } => {
                match provider.complete_callback(&code, state.as_deref()).await {
                    Ok(()) => {
                        info!(
                            event_name = "wizard.connected",
                            event_domain = "wizard",
                            provider = service_type.provider_slug(),
                            "Provider connected through callback"
                        );
                        self.refresh.signal(RefreshSignal::WizardCompleted);
                        Ok(CallbackOutcome::Connected {
                            provider: service_type,
                            display_delay_ms: self.settings.connected_display_delay_ms,
                            redirect: DASHBOARD_PATH.to_string(),
                        })
                    }
                    Err(ConnectError::AuthRejected) => {
                        Ok(rejected(self.end_session(epoch).await))
                    }
                    Err(e) => Ok(failed(&e)),
                }
            }
        }
    }
}
