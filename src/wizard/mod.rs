//! The connection wizard: a pure state machine (`machine`), callback
//! classification (`callback`) and the controller that performs the I/O.

pub mod callback;
pub mod controller;
pub mod machine;

use thiserror::Error;

pub use callback::{classify_callback, CallbackAction, CallbackParams};
pub use controller::{CallbackOutcome, WizardController, WizardView};
pub use machine::{ManualForm, StepError, Ticket, Transition, WizardRun, WizardStep};

use crate::error::ConnectError;

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("no connection wizard is open")]
    NotOpen,

    #[error("'{action}' is not available while {step}")]
    InvalidAction {
        action: &'static str,
        step: &'static str,
    },

    #[error("provider '{0}' is not configured")]
    UnknownProvider(String),

    #[error("credential store error: {0}")]
    Store(String),

    #[error(transparent)]
    Connect(#[from] ConnectError),
}
