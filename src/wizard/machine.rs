//! Wizard states and transitions. Nothing in here performs I/O.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{ConnectError, Recovery};
use crate::models::{AttachableResource, ServiceType};
use crate::providers::ProviderAccessToken;

/// An error shown inline in the step that produced it.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StepError {
    pub kind: &'static str,
    pub message: String,
    pub recovery: Recovery,
}

impl From<&ConnectError> for StepError {
    fn from(err: &ConnectError) -> Self {
        StepError {
            kind: err.kind(),
            message: err.user_message(),
            recovery: err.recovery(),
        }
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManualForm {
    pub name: String,
    /// Kept so the user does not retype it after a failed validation; never serialized.
    #[serde(skip)]
    pub token: String,
    pub has_token: bool,
}

impl ManualForm {
    pub fn new(name: &str, token: &str) -> Self {
        ManualForm {
            name: name.to_string(),
            token: token.to_string(),
            has_token: !token.is_empty(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WizardStep {
    ChoosingMethod,
    #[serde(rename_all = "camelCase")]
    DelegatedRedirecting { authorization_url: String },
    ManualEntry {
        form: ManualForm,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<StepError>,
    },
    #[serde(rename_all = "camelCase")]
    ResourcePicking {
        resources: Vec<AttachableResource>,
        selected: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<StepError>,
    },
    /// Waiting for a creating call. `resume` is where a failure lands, input intact.
    Submitting {
        #[serde(skip)]
        resume: Box<WizardStep>,
    },
    Connected,
    Failed { error: StepError },
}

impl WizardStep {
    pub fn name(&self) -> &'static str {
        match self {
            WizardStep::ChoosingMethod => "choosing_method",
            WizardStep::DelegatedRedirecting { .. } => "delegated_redirecting",
            WizardStep::ManualEntry { .. } => "manual_entry",
            WizardStep::ResourcePicking { .. } => "resource_picking",
            WizardStep::Submitting { .. } => "submitting",
            WizardStep::Connected => "connected",
            WizardStep::Failed { .. } => "failed",
        }
    }

    /// Attach an error to a step that can display one inline.
    fn with_error(self, error: StepError) -> WizardStep {
        match self {
            WizardStep::ManualEntry { form, .. } => WizardStep::ManualEntry {
                form,
                error: Some(error),
            },
            WizardStep::ResourcePicking {
                resources,
                selected,
                ..
            } => WizardStep::ResourcePicking {
                resources,
                selected,
                error: Some(error),
            },
            _ => WizardStep::Failed { error },
        }
    }
}

/// Identifies the run and step that issued a request. A response is applied
/// only while both still match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub run_id: Uuid,
    pub step: u64,
}

/// One pass through the wizard for one provider.
#[derive(Debug, Clone)]
pub struct WizardRun {
    pub run_id: Uuid,
    pub provider: ServiceType,
    step_seq: u64,
    step: WizardStep,
    loading: bool,
    /// Handed-off provider token for the resource picker; never leaves the process.
    provider_token: Option<ProviderAccessToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The action is not available in the current step.
    Rejected { step: &'static str },
}

impl WizardRun {
    pub fn open(provider: ServiceType) -> Self {
        WizardRun {
            run_id: Uuid::new_v4(),
            provider,
            step_seq: 0,
            step: WizardStep::ChoosingMethod,
            loading: false,
            provider_token: None,
        }
    }

    /// A run that starts directly in the picker, after a handoff was consumed.
    pub fn resume_picking(provider: ServiceType, token: ProviderAccessToken) -> Self {
        WizardRun {
            run_id: Uuid::new_v4(),
            provider,
            step_seq: 0,
            step: WizardStep::ResourcePicking {
                resources: Vec::new(),
                selected: None,
                error: None,
            },
            loading: true,
            provider_token: Some(token),
        }
    }

    pub fn step(&self) -> &WizardStep {
        &self.step
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn provider_token(&self) -> Option<&ProviderAccessToken> {
        self.provider_token.as_ref()
    }

    pub fn ticket(&self) -> Ticket {
        Ticket {
            run_id: self.run_id,
            step: self.step_seq,
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.run_id == ticket.run_id && self.step_seq == ticket.step
    }

    fn advance(&mut self, step: WizardStep, loading: bool) {
        self.step_seq += 1;
        self.step = step;
        self.loading = loading;
    }

    fn rejected(&self) -> Transition {
        Transition::Rejected {
            step: self.step.name(),
        }
    }

    /// Back to method choice. Any request still in flight becomes stale.
    pub fn back(&mut self) -> Transition {
        match self.step {
            WizardStep::Connected | WizardStep::ChoosingMethod => self.rejected(),
            _ => {
                self.provider_token = None;
                self.advance(WizardStep::ChoosingMethod, false);
                Transition::Applied
            }
        }
    }

    pub fn choose_delegated(&mut self, authorization_url: String) -> Transition {
        if self.step != WizardStep::ChoosingMethod {
            return self.rejected();
        }
        self.advance(
            WizardStep::DelegatedRedirecting { authorization_url },
            false,
        );
        Transition::Applied
    }

    pub fn choose_manual(&mut self) -> Transition {
        if self.step != WizardStep::ChoosingMethod {
            return self.rejected();
        }
        self.advance(
            WizardStep::ManualEntry {
                form: ManualForm::default(),
                error: None,
            },
            false,
        );
        Transition::Applied
    }

    /// Enter `Submitting` from a step that creates something. The returned
    /// ticket must accompany the response.
    pub fn begin_submit(&mut self) -> Option<Ticket> {
        match &self.step {
            WizardStep::ManualEntry { .. } => {}
            WizardStep::ResourcePicking {
                selected: Some(_), ..
            } if !self.loading => {}
            _ => return None,
        }
        let resume = std::mem::replace(&mut self.step, WizardStep::Connected);
        self.advance(
            WizardStep::Submitting {
                resume: Box::new(resume),
            },
            true,
        );
        Some(self.ticket())
    }

    /// Replace the form that is being submitted (keeps input for a later failure).
    pub fn set_manual_form(&mut self, form: ManualForm) {
        if let WizardStep::Submitting { resume } = &mut self.step {
            if let WizardStep::ManualEntry { form: current, error } = resume.as_mut() {
                *current = form;
                *error = None;
            }
        }
    }

    /// A submission (or an intermediate step of it) failed: back to the step
    /// the user submitted from, with the error inline and input preserved.
    pub fn fail_submit(&mut self, error: StepError) {
        let step = match std::mem::replace(&mut self.step, WizardStep::Connected) {
            WizardStep::Submitting { resume } => resume.with_error(error),
            other => other.with_error(error),
        };
        self.advance(step, false);
    }

    pub fn complete(&mut self) {
        self.provider_token = None;
        self.advance(WizardStep::Connected, false);
    }

    /// Begin (re)loading the picker's resource list.
    pub fn begin_loading_resources(&mut self) -> Option<Ticket> {
        match &self.step {
            WizardStep::ResourcePicking { selected, .. } if self.provider_token.is_some() => {
                let selected = *selected;
                self.advance(
                    WizardStep::ResourcePicking {
                        resources: Vec::new(),
                        selected,
                        error: None,
                    },
                    true,
                );
                Some(self.ticket())
            }
            _ => None,
        }
    }

    pub fn resources_loaded(&mut self, resources: Vec<AttachableResource>) {
        let selected = match &self.step {
            WizardStep::ResourcePicking { selected, .. } => *selected,
            _ => None,
        };
        // A previous selection survives a reload only if it is still selectable.
        let selected = selected.filter(|id| {
            resources
                .iter()
                .any(|resource| resource.id == *id && resource.is_selectable())
        });
        self.advance(
            WizardStep::ResourcePicking {
                resources,
                selected,
                error: None,
            },
            false,
        );
    }

    /// Single selection. Unknown or already-attached resources leave the step untouched.
    pub fn select_resource(&mut self, resource_id: u64) -> bool {
        if self.loading {
            return false;
        }
        let WizardStep::ResourcePicking {
            resources,
            selected,
            ..
        } = &mut self.step
        else {
            return false;
        };
        let selectable = resources
            .iter()
            .any(|resource| resource.id == resource_id && resource.is_selectable());
        if !selectable {
            return false;
        }
        *selected = Some(resource_id);
        true
    }

    /// The selected resource while in `Submitting` from the picker.
    pub fn submitting_resource(&self) -> Option<AttachableResource> {
        let WizardStep::Submitting { resume } = &self.step else {
            return None;
        };
        let WizardStep::ResourcePicking {
            resources,
            selected: Some(id),
            ..
        } = resume.as_ref()
        else {
            return None;
        };
        resources.iter().find(|resource| resource.id == *id).cloned()
    }

    /// Apply a terminal failure for the whole run.
    pub fn fail(&mut self, error: StepError) {
        self.advance(WizardStep::Failed { error }, false);
    }
}
