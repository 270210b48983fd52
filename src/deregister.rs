//! Confirm-then-authenticate flow for deregistering a dataset.
//!
//! `Idle -> PendingDelete -> AwaitingPassword -> Submitting -> Done | Failed`
//!
//! Each step is an explicit transition driven by a UI event, so nothing
//! blocks waiting for the user. The submitting stage only disables the
//! submit affordance; it is not a lock.

use crate::error::{ApiError, ErrorKind};

/// Fallback text when the server gives no detail.
pub const DELETE_FAILED: &str = "Failed to delete dataset.";
pub const CONFIRM_PROMPT: &str =
    "Are you sure you want to permanently deregister this dataset? This action cannot be undone.";
pub const DELETE_SUCCEEDED: &str = "Dataset successfully deregistered.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTarget {
    pub hash: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeleteStage {
    #[default]
    Idle,
    PendingDelete(DeleteTarget),
    AwaitingPassword {
        target: DeleteTarget,
        password: String,
        error: Option<String>,
    },
    Submitting(DeleteTarget),
    Done(DeleteTarget),
    Failed {
        target: DeleteTarget,
        kind: ErrorKind,
        message: String,
    },
}

/// Request to send once the password step is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub hash: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteFlow {
    stage: DeleteStage,
}

impl DeleteFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> &DeleteStage {
        &self.stage
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.stage, DeleteStage::Idle)
    }

    /// Ask for confirmation. Ignored while a request is in flight.
    pub fn request(&mut self, hash: &str, name: &str) {
        if matches!(self.stage, DeleteStage::Submitting(_)) {
            return;
        }
        self.stage = DeleteStage::PendingDelete(DeleteTarget {
            hash: hash.to_string(),
            name: name.to_string(),
        });
    }

    pub fn confirm(&mut self) {
        if let DeleteStage::PendingDelete(target) = &self.stage {
            self.stage = DeleteStage::AwaitingPassword {
                target: target.clone(),
                password: String::new(),
                error: None,
            };
        }
    }

    pub fn password_changed(&mut self, value: String) {
        if let DeleteStage::AwaitingPassword { password, .. } = &mut self.stage {
            *password = value;
        }
    }

    /// Move to `Submitting` and return the request to send. An empty
    /// password stays on the password step with a validation message.
    pub fn submit(&mut self) -> Option<DeleteRequest> {
        let DeleteStage::AwaitingPassword {
            target,
            password,
            error,
        } = &mut self.stage
        else {
            return None;
        };

        if password.is_empty() {
            *error = Some("Please enter the admin password to proceed.".to_string());
            return None;
        }

        let request = DeleteRequest {
            hash: target.hash.clone(),
            password: std::mem::take(password),
        };
        self.stage = DeleteStage::Submitting(target.clone());
        Some(request)
    }

    /// Record the server's answer. Returns true when the dataset was
    /// deregistered.
    pub fn complete(&mut self, result: &Result<(), ApiError>) -> bool {
        let DeleteStage::Submitting(target) = &self.stage else {
            log::debug!("Delete result arrived outside of submission, ignored");
            return false;
        };
        let target = target.clone();

        match result {
            Ok(()) => {
                log::info!("Deregistered {}", target.hash);
                self.stage = DeleteStage::Done(target);
                true
            }
            Err(e) => {
                log::warn!("Deregistering {} failed: {}", target.hash, e);
                self.stage = DeleteStage::Failed {
                    target,
                    kind: e.kind(),
                    message: e.user_message(DELETE_FAILED),
                };
                false
            }
        }
    }

    /// From `Failed`, go back to the password step.
    pub fn retry(&mut self) {
        if let DeleteStage::Failed { target, .. } = &self.stage {
            self.stage = DeleteStage::AwaitingPassword {
                target: target.clone(),
                password: String::new(),
                error: None,
            };
        }
    }

    /// Close the flow. An in-flight submission can not be aborted, so
    /// cancelling is ignored while submitting.
    pub fn cancel(&mut self) {
        if !matches!(self.stage, DeleteStage::Submitting(_)) {
            self.stage = DeleteStage::Idle;
        }
    }
}
