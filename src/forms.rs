//! Contact form submission.
//!
//! The site's only interactive surface. Submission is modeled as an explicit
//! state machine so the UI layer can only ever be in one of four states:
//!
//! ```text
//! Idle ──begin──► Submitting ──complete(Ok)───► Success
//!   ▲                 │
//!   └─────────────────┴──complete(Err)───────► Failed(message) ──begin──┐
//!                                                   ▲                   │
//!                                                   └───────────────────┘
//! ```
//!
//! `Success` is terminal; `Failed` allows retry. Server rejections (HTTP
//! status 400 and up) and transport failures both land in `Failed`, with
//! messages that distinguish the two. When the server's response body
//! carries a message, that message is shown instead of the status code.
//!
//! Request preparation mirrors what a plain HTML form would send: fields are
//! URL-encoded into the query string for GET or the body for POST, and a
//! `subject` field gets the site host prefixed (`[example.org] ...`) so
//! shared inboxes can filter by origin site.

use std::fmt;
use thiserror::Error;
use url::Url;
use url::form_urlencoded;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("invalid form action URL: {0}")]
    InvalidAction(#[from] url::ParseError),
    #[error("GET method cannot carry multipart/form-data")]
    GetWithMultipart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncType {
    #[default]
    UrlEncoded,
    Multipart,
}

/// Where and how a form submits.
#[derive(Debug, Clone)]
pub struct FormConfig {
    pub action: String,
    pub method: Method,
    pub enc_type: EncType,
    /// Site host injected into the `subject` field.
    pub host: String,
}

/// A prepared request, ready for a [`FormTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct FormRequest {
    pub url: Url,
    pub method: Method,
    pub body: Option<FormBody>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormBody {
    UrlEncoded(String),
    /// Field list for the transport to encode as multipart.
    Multipart(Vec<(String, String)>),
}

/// Build the request a submission would send.
///
/// Fields pass through in order; a `subject` field is rewritten to
/// `[host] original-subject`.
pub fn prepare_request(
    fields: &[(String, String)],
    config: &FormConfig,
) -> Result<FormRequest, FormError> {
    if config.method == Method::Get && config.enc_type == EncType::Multipart {
        return Err(FormError::GetWithMultipart);
    }

    let mut url = Url::parse(&config.action)?;
    let fields: Vec<(String, String)> = fields
        .iter()
        .map(|(key, value)| {
            if key == "subject" && !value.is_empty() {
                (key.clone(), format!("[{}] {}", config.host, value))
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect();

    let body = match config.method {
        Method::Get => {
            url.set_query(Some(&urlencode(&fields)));
            None
        }
        Method::Post => Some(match config.enc_type {
            EncType::UrlEncoded => FormBody::UrlEncoded(urlencode(&fields)),
            EncType::Multipart => FormBody::Multipart(fields),
        }),
    };

    Ok(FormRequest {
        url,
        method: config.method,
        body,
    })
}

fn urlencode(fields: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
}

/// What the server said, as far as the transport could parse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// Human-readable message parsed from the response body, when the
    /// server sent one. Form endpoints usually explain rejections here.
    pub message: Option<String>,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self { status, message: None }
    }

    pub fn with_message(status: u16, message: impl Into<String>) -> Self {
        Self { status, message: Some(message.into()) }
    }
}

/// Carries a prepared request to the server. Production wires this to an
/// HTTP client; tests use a canned implementation.
pub trait FormTransport {
    /// Returns the server's response, or a message for transport-level
    /// failures (DNS, refused connection, timeout).
    fn send(&self, request: &FormRequest) -> Result<TransportResponse, String>;
}

/// Submission lifecycle. See the module docs for the transition diagram.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting,
    Success,
    Failed(String),
}

impl SubmissionState {
    /// `Idle | Failed → Submitting`. Returns false (and stays put) from
    /// `Submitting` and `Success`.
    pub fn begin(&mut self) -> bool {
        match self {
            Self::Idle | Self::Failed(_) => {
                *self = Self::Submitting;
                true
            }
            Self::Submitting | Self::Success => false,
        }
    }

    /// `Submitting → Success | Failed`. Ignored in any other state.
    pub fn complete(&mut self, result: Result<(), String>) {
        if *self != Self::Submitting {
            return;
        }
        *self = match result {
            Ok(()) => Self::Success,
            Err(message) => Self::Failed(message),
        };
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting)
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Submitting => write!(f, "submitting"),
            Self::Success => write!(f, "success"),
            Self::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

/// Drive one full submission: transition the state, prepare and send the
/// request, classify the outcome.
pub fn submit<T: FormTransport>(
    state: &mut SubmissionState,
    fields: &[(String, String)],
    config: &FormConfig,
    transport: &T,
) -> Result<(), FormError> {
    if !state.begin() {
        return Ok(());
    }
    let request = match prepare_request(fields, config) {
        Ok(request) => request,
        Err(e) => {
            state.complete(Err(e.to_string()));
            return Err(e);
        }
    };
    let outcome = match transport.send(&request) {
        Ok(response) if response.status < 400 => Ok(()),
        // The server's own explanation beats a bare status code.
        Ok(response) => Err(response.message.unwrap_or_else(|| {
            format!("server rejected submission (HTTP {})", response.status)
        })),
        Err(message) => Err(format!("could not reach server: {message}")),
    };
    state.complete(outcome);
    Ok(())
}
