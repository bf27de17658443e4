use strum_macros::Display;
use thiserror::Error;

/// Crate-wide error type. Every variant carries a message with the stream
/// identity of the endpoint that produced it.
#[derive(Error, Debug)]
pub enum Error {
    #[error("NegotiationError [{kind}]: {message}")]
    NegotiationError {
        message: String,
        kind: NegotiationErrorKind,
    },
    #[error("EngineError [{kind}]: {message}")]
    EngineError {
        message: String,
        kind: EngineErrorKind,
    },
    #[error("RegistryError [{kind}]: {message}")]
    RegistryError {
        message: String,
        kind: RegistryErrorKind,
    },
    #[error("EndpointError [{kind}]: {message}")]
    EndpointError {
        message: String,
        kind: EndpointErrorKind,
    },
}

impl Error {
    pub fn new_negotiation(message: String, kind: NegotiationErrorKind) -> Error {
        Error::NegotiationError { message, kind }
    }

    pub fn new_engine(message: String, kind: EngineErrorKind) -> Error {
        Error::EngineError { message, kind }
    }

    pub fn new_registry(message: String, kind: RegistryErrorKind) -> Error {
        Error::RegistryError { message, kind }
    }

    pub fn new_endpoint(message: String, kind: EndpointErrorKind) -> Error {
        Error::EndpointError { message, kind }
    }
}

#[derive(Debug, Display, PartialEq, Eq)]
pub enum NegotiationErrorKind {
    OfferInvalidError,
    EngineRejectedError,
    AlreadyNegotiatedError,
}

#[derive(Debug, Display, PartialEq, Eq)]
pub enum EngineErrorKind {
    CallFailedError,
    RecordingFailedError,
}

#[derive(Debug, Display, PartialEq, Eq)]
pub enum RegistryErrorKind {
    NoPublisherError,
}

#[derive(Debug, Display, PartialEq, Eq)]
pub enum EndpointErrorKind {
    InvalidStateError,
    AlreadyExistsError,
    StoppedError,
}
