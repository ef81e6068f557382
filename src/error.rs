use std::fmt::{self, Debug, Display, Formatter};

use derive_more::Display;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A set of errors that can occur while classifying, decoding and assembling
/// request bodies, and in the CORS and method helpers.
#[derive(Display)]
#[non_exhaustive]
pub enum Error {
    /// The request's `Content-Type` does not match the parse path that was
    /// asked for (e.g. a JSON decode on a `text/plain` body).
    #[display(
        fmt = "content type mismatch: expected {}, got {}",
        expected,
        "found.as_deref().unwrap_or(\"<none>\")"
    )]
    ContentTypeMismatch {
        expected: &'static str,
        found: Option<String>,
    },

    /// The `Content-Type` header is not `multipart/form-data`.
    #[display(fmt = "Content-Type is not multipart/form-data")]
    NoMultipart,

    /// No boundary parameter found in the `Content-Type` header.
    #[display(fmt = "multipart boundary not found in Content-Type")]
    NoBoundary,

    /// Failed to convert the `Content-Type` to [`mime::Mime`] type.
    #[display(fmt = "failed to convert Content-Type to `mime::Mime` type: {}", _0)]
    DecodeContentType(mime::FromStrError),

    /// Multipart stream ended before the final boundary marker.
    #[display(fmt = "incomplete multipart stream")]
    IncompleteStream,

    /// The field data is found incomplete.
    #[display(
        fmt = "field '{}' received with incomplete data",
        "field_name.as_deref().unwrap_or(\"<unknown>\")"
    )]
    IncompleteFieldData { field_name: Option<String> },

    /// Couldn't read the field headers completely.
    #[display(fmt = "failed to read field complete headers")]
    IncompleteHeaders,

    /// Failed to read headers.
    #[display(fmt = "failed to read headers: {}", _0)]
    ReadHeaderFailed(httparse::Error),

    /// Failed to decode the field's raw header name to
    /// [`HeaderName`](http::header::HeaderName) type.
    #[display(fmt = "failed to decode field's raw header name: {:?} {}", name, cause)]
    DecodeHeaderName { name: String, cause: BoxError },

    /// Failed to decode the field's raw header value to
    /// [`HeaderValue`](http::header::HeaderValue) type.
    #[display(fmt = "failed to decode field's raw header value: {}", cause)]
    DecodeHeaderValue { value: Vec<u8>, cause: BoxError },

    /// Stream read failed.
    #[display(fmt = "stream read failed: {}", _0)]
    StreamReadFailed(BoxError),

    /// The request body was already taken out of the request.
    #[display(fmt = "request body already taken")]
    BodyAlreadyTaken,

    /// An uploaded file's byte source was accessed a second time. The
    /// underlying transport stream cannot be rewound, so each file is
    /// readable at most once.
    #[display(fmt = "uploaded file '{}' already consumed", file_name)]
    AlreadyConsumed { file_name: String },

    /// The method string is outside the supported closed set.
    #[display(
        fmt = "unsupported HTTP method '{}', expected one of {}",
        method,
        "crate::method::SUPPORTED_METHODS"
    )]
    UnsupportedMethod { method: String },

    /// An unknown field is detected when multipart
    /// [`constraints`](crate::Constraints::allowed_fields) are added.
    #[display(
        fmt = "unknown field received: {}",
        "field_name.as_deref().unwrap_or(\"<unknown>\")"
    )]
    UnknownField { field_name: Option<String> },

    /// The incoming field size exceeded the maximum limit.
    #[display(
        fmt = "field '{}' exceeded the maximum size limit: {} bytes",
        "field_name.as_deref().unwrap_or(\"<unknown>\")",
        limit
    )]
    FieldSizeExceeded { limit: u64, field_name: Option<String> },

    /// The incoming stream size exceeded the maximum limit.
    #[display(fmt = "stream size exceeded the maximum limit: {} bytes", limit)]
    StreamSizeExceeded { limit: u64 },

    /// The body failed to parse as JSON despite a JSON content type.
    #[cfg(feature = "json")]
    #[display(fmt = "failed to decode body as JSON: {}", _0)]
    DecodeJson(serde_json::Error),
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string().eq(&other.to_string())
    }
}

impl Eq for Error {}
