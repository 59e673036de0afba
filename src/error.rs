use std::error::Error as StdError;
use std::fmt;

/// Error type shared by the pipeline, models and explanation engine.
#[derive(Debug)]
pub enum Error {
    /// Invalid configuration or input data: an all-missing feature, a bad
    /// split fraction, a shape mismatch, no positive training examples.
    Config(String),
    /// Operation called in the wrong lifecycle state, e.g. predicting with
    /// an unfitted pipeline. Programmer error, never retried.
    State(&'static str),
    /// Failure surfaced by the underlying classifier, propagated unchanged.
    Classifier(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::State(msg) => write!(f, "state error: {}", msg),
            Error::Classifier(msg) => write!(f, "classifier error: {}", msg),
        }
    }
}

impl StdError for Error {}

pub type Result<T> = std::result::Result<T, Error>;
