//! Error report bodies.
//!
//! [`ErrorPayload`] is the JSON body of `/invocation/{id}/error` and
//! `/init/error`. [`XRayErrorCause`] is the optional diagnostic sent in the
//! X-Ray cause header.

use serde::{Deserialize, Serialize};

use crate::error::HandlerError;

/// JSON body of an error report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error_message: String,
    pub error_type: String,
    pub stack_trace: Vec<String>,
}

impl From<&HandlerError> for ErrorPayload {
    fn from(err: &HandlerError) -> Self {
        Self {
            error_message: err.message().to_string(),
            error_type: err.error_type().to_string(),
            stack_trace: err.stack_trace().to_vec(),
        }
    }
}

/// X-Ray error cause document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XRayErrorCause {
    pub working_directory: String,
    pub exceptions: Vec<XRayException>,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XRayException {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub stack: Vec<XRayStackFrame>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XRayStackFrame {
    pub label: String,
}

impl XRayErrorCause {
    /// Describe `err` relative to the current working directory.
    pub fn from_error(err: &HandlerError) -> Self {
        let working_directory = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        Self {
            working_directory,
            exceptions: vec![XRayException {
                error_type: err.error_type().to_string(),
                message: err.message().to_string(),
                stack: err
                    .stack_trace()
                    .iter()
                    .map(|label| XRayStackFrame {
                        label: label.clone(),
                    })
                    .collect(),
            }],
            paths: Vec::new(),
        }
    }

    /// Serialize for the header value.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
