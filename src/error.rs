use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// HTTP-facing error type. Every fallible handler returns `Result<_, AppError>`
/// instead of unwrapping, so a single bad request can never take the process down.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("invalid range header")]
    InvalidRange,

    #[error("range not satisfiable")]
    RangeNotSatisfiable { size: u64 },

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("xml error: {0}")]
    Xml(#[from] crate::xml::XmlError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            AppError::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response()
            }
            AppError::InvalidRange | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            AppError::RangeNotSatisfiable { size } => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(axum::http::header::CONTENT_RANGE, format!("bytes */{size}"))],
            )
                .into_response(),
            AppError::Xml(_) | AppError::Io(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
        }
    }
}

/// The UPnP ContentDirectory:1 error code set (§7.3.20 of the CDS spec).
/// Only the subset this server can actually raise is named; the rest exist
/// so the fault table in SPEC_FULL.md §4.5 stays complete and self-documenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapErrorCode {
    InvalidAction = 401,
    InvalidArgs = 402,
    ActionFailed = 501,
    ArgumentValueInvalid = 600,
    NoSuchObject = 701,
    CannotProcessRequest = 720,
}

impl SoapErrorCode {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn description(self) -> &'static str {
        match self {
            SoapErrorCode::InvalidAction => "Invalid Action",
            SoapErrorCode::InvalidArgs => "Invalid Args",
            SoapErrorCode::ActionFailed => "Action Failed",
            SoapErrorCode::ArgumentValueInvalid => "Argument Value Invalid",
            SoapErrorCode::NoSuchObject => "No Such Object",
            SoapErrorCode::CannotProcessRequest => "Cannot Process the Request",
        }
    }
}

/// A SOAP fault raised while handling a ContentDirectory action. Converted to
/// an HTTP 500 with a filled `fault` template by the SOAP route handler.
#[derive(Debug, Clone, Copy)]
pub struct SoapFault {
    pub code: SoapErrorCode,
}

impl SoapFault {
    pub fn new(code: SoapErrorCode) -> Self {
        Self { code }
    }
}

impl From<crate::xml::XmlError> for SoapFault {
    fn from(_: crate::xml::XmlError) -> Self {
        SoapFault::new(SoapErrorCode::InvalidArgs)
    }
}

impl std::fmt::Display for SoapFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code.description(), self.code.code())
    }
}

impl std::error::Error for SoapFault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_not_satisfiable_reports_content_range_header() {
        let response = AppError::RangeNotSatisfiable { size: 1024 }.into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        let header = response.headers().get(axum::http::header::CONTENT_RANGE).unwrap();
        assert_eq!(header, "bytes */1024");
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(AppError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn soap_fault_codes_match_the_contentdirectory_table() {
        assert_eq!(SoapErrorCode::InvalidAction.code(), 401);
        assert_eq!(SoapErrorCode::NoSuchObject.code(), 701);
        assert_eq!(SoapErrorCode::CannotProcessRequest.code(), 720);
    }
}
