use std::error::Error;
use std::fmt;

/// Errors raised by the model facade. These are raised synchronously at the
/// point of detection and propagate straight to the caller; the model holds no
/// state worth recovering, so callers simply re-invoke with corrected input.
#[derive(Debug)]
pub enum ModelError {
    MissingParameter(String),
    UnsupportedProvider(String),
    UnsupportedInstanceType { provider: String, instance_type: String },
    MissingObservationField { index: usize, field: &'static str },
    NotConfigured,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModelError::MissingParameter(what) => {
                write!(f, "required parameter not provided: {}", what)
            }
            ModelError::UnsupportedProvider(provider) => {
                write!(f, "provider not supported: {}", provider)
            }
            ModelError::UnsupportedInstanceType {
                provider,
                instance_type,
            } => write!(
                f,
                "instance type {} not supported for provider {}",
                instance_type, provider
            ),
            ModelError::MissingObservationField { index, field } => write!(
                f,
                "observation {} is missing required field `{}`",
                index, field
            ),
            ModelError::NotConfigured => {
                write!(f, "calculate called before configure")
            }
        }
    }
}

impl Error for ModelError {}
