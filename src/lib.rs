//! Form body parsing and CORS helpers for HTTP services.
//!
//! This crate sits between an HTTP transport and application handlers. It
//! classifies request bodies by `Content-Type`, decodes
//! `multipart/form-data` uploads part by part from a forward-only byte
//! stream, decodes `application/x-www-form-urlencoded` and JSON bodies, and
//! wraps handlers with CORS origin negotiation. The transport is reached
//! through the narrow [`RequestReader`] trait, so any server type with a
//! header lookup, a method string and a one-shot body stream can plug in.
//!
//! - [`form`] / [`FormData`] — assembled text fields and uploaded files
//! - [`Multipart`] / [`Field`] — part-at-a-time streaming, bounded memory
//! - [`UploadedFile`] — single-use access to an upload's bytes
//! - [`Cors`] — origin negotiation and preflight short-circuiting
//! - [`Method`] — the closed set of supported request methods
//!
//! # Examples
//!
//! ```
//! use formbody::FormData;
//!
//! let form = FormData::from_urlencoded("name=ferris&lang=rust");
//! assert_eq!(form.field("name"), Some("ferris"));
//! assert_eq!(form.field("lang"), Some("rust"));
//! ```

pub use bytes;

pub use body::{classify, form, form_with_constraints, read_to_bytes, read_to_string, BodyKind};
#[cfg(feature = "json")]
pub use body::json;
pub use constraints::Constraints;
pub use cors::{Cors, CorsConfig};
pub use error::Error;
pub use field::Field;
pub use form::FormData;
pub use method::Method;
pub use multipart::Multipart;
pub use request::{BodyStream, RequestReader, LOCAL_ADDR, LOCAL_PORT, REMOTE_ADDR, REMOTE_PORT};
pub use size_limit::SizeLimit;
pub use upload::{UploadStream, UploadedFile};

mod body;
mod buffer;
mod constants;
mod constraints;
mod content_disposition;
mod cors;
mod error;
mod field;
mod form;
mod helpers;
mod method;
mod multipart;
mod request;
mod size_limit;
mod state;
mod upload;

/// A Result type often returned from methods that can have `formbody`
/// errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Parses the `Content-Type` header to extract the multipart boundary value.
pub fn parse_boundary<T: AsRef<str>>(content_type: T) -> crate::Result<String> {
    let m = content_type
        .as_ref()
        .parse::<mime::Mime>()
        .map_err(Error::DecodeContentType)?;

    if !(m.type_() == mime::MULTIPART_FORM_DATA.type_() && m.subtype() == mime::MULTIPART_FORM_DATA.subtype()) {
        return Err(Error::NoMultipart);
    }

    m.get_param(mime::BOUNDARY)
        .map(|name| name.as_str().to_owned())
        .ok_or(Error::NoBoundary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boundary() {
        let content_type = "multipart/form-data; boundary=ABCDEFG";
        assert_eq!(parse_boundary(content_type), Ok("ABCDEFG".to_owned()));

        let content_type = "multipart/form-data; boundary=------ABCDEFG";
        assert_eq!(parse_boundary(content_type), Ok("------ABCDEFG".to_owned()));

        let content_type = "multipart/form-data";
        assert_eq!(parse_boundary(content_type), Err(Error::NoBoundary));

        let content_type = "boundary=------ABCDEFG";
        assert!(parse_boundary(content_type).is_err());

        let content_type = "text/plain";
        assert!(parse_boundary(content_type).is_err());

        let content_type = "text/plain; boundary=------ABCDEFG";
        assert_eq!(parse_boundary(content_type), Err(Error::NoMultipart));
    }
}
