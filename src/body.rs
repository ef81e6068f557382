use std::borrow::Cow;

use bytes::{Bytes, BytesMut};
use encoding_rs::{Encoding, UTF_8};
use futures_util::stream::TryStreamExt;
#[cfg(feature = "json")]
use serde::de::DeserializeOwned;

use crate::request::RequestReader;
use crate::{parse_boundary, Constraints, FormData, Multipart};

/// How a request body should be parsed, judged from its `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// `application/x-www-form-urlencoded`
    UrlEncoded,
    /// `multipart/form-data`
    Multipart,
    /// `application/json`
    Json,
    /// Anything else, including a missing or unparseable `Content-Type`.
    Unsupported,
}

/// Classifies a `Content-Type` header value.
///
/// Only the MIME type component is compared; parameters such as `boundary`
/// or `charset` are ignored here and extracted downstream.
pub fn classify(content_type: Option<&str>) -> BodyKind {
    let mime = match content_type.and_then(|val| val.parse::<mime::Mime>().ok()) {
        Some(mime) => mime,
        None => return BodyKind::Unsupported,
    };

    if mime.type_() == mime::APPLICATION && mime.subtype() == mime::WWW_FORM_URLENCODED {
        BodyKind::UrlEncoded
    } else if mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA {
        BodyKind::Multipart
    } else if mime.type_() == mime::APPLICATION && mime.subtype() == mime::JSON {
        BodyKind::Json
    } else {
        BodyKind::Unsupported
    }
}

/// Drains the request body into one contiguous buffer.
pub async fn read_to_bytes<R: RequestReader>(req: &mut R) -> crate::Result<Bytes> {
    let mut stream = req.take_body().ok_or(crate::Error::BodyAlreadyTaken)?;

    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.try_next().await? {
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.freeze())
}

/// Drains the request body and decodes it as text, honoring the `charset`
/// parameter of the `Content-Type` header and defaulting to UTF-8.
pub async fn read_to_string<R: RequestReader>(req: &mut R) -> crate::Result<String> {
    let encoding_name = content_type(req)
        .and_then(|val| val.parse::<mime::Mime>().ok())
        .and_then(|mime| {
            mime.get_param(mime::CHARSET)
                .map(|charset| charset.as_str().to_owned())
        })
        .unwrap_or_else(|| "utf-8".to_owned());

    let encoding = Encoding::for_label(encoding_name.as_bytes()).unwrap_or(UTF_8);

    let bytes = read_to_bytes(req).await?;

    let (text, _, _) = encoding.decode(&bytes);

    match text {
        Cow::Owned(s) => Ok(s),
        Cow::Borrowed(s) => Ok(String::from(s)),
    }
}

/// Drains the request body and deserializes it as JSON.
///
/// The request must carry an `application/json` content type, otherwise this
/// fails with [`Error::ContentTypeMismatch`](crate::Error::ContentTypeMismatch)
/// without touching the body. A body that then fails to parse yields the
/// distinct [`Error::DecodeJson`](crate::Error::DecodeJson).
///
/// # Optional
///
/// This requires the `json` feature (on by default).
#[cfg(feature = "json")]
pub async fn json<R: RequestReader, T: DeserializeOwned>(req: &mut R) -> crate::Result<T> {
    let content_type = content_type(req);

    if classify(content_type.as_deref()) != BodyKind::Json {
        return Err(crate::Error::ContentTypeMismatch {
            expected: "application/json",
            found: content_type,
        });
    }

    let bytes = read_to_bytes(req).await?;
    serde_json::from_slice(&bytes).map_err(crate::Error::DecodeJson)
}

/// Parses the request body as a form, dispatching on its `Content-Type`.
///
/// `application/x-www-form-urlencoded` bodies are decoded synchronously once
/// drained; `multipart/form-data` bodies flow through [`Multipart`] and are
/// assembled part by part. Anything else fails with
/// [`Error::ContentTypeMismatch`](crate::Error::ContentTypeMismatch).
pub async fn form<R: RequestReader>(req: &mut R) -> crate::Result<FormData> {
    form_with_constraints(req, Constraints::default()).await
}

/// Like [`form`], with [`Constraints`] applied to the multipart path.
pub async fn form_with_constraints<R: RequestReader>(
    req: &mut R,
    constraints: Constraints,
) -> crate::Result<FormData> {
    let content_type = content_type(req);

    match classify(content_type.as_deref()) {
        BodyKind::UrlEncoded => {
            let bytes = read_to_bytes(req).await?;
            Ok(FormData::from_urlencoded(bytes))
        }
        BodyKind::Multipart => {
            // parse_boundary re-checks the MIME type; classification already
            // guarantees it, so only a missing boundary can fail here.
            let boundary = parse_boundary(content_type.as_deref().unwrap_or_default())?;
            let stream = req.take_body().ok_or(crate::Error::BodyAlreadyTaken)?;
            let multipart = Multipart::from_body_stream(stream, boundary, constraints);
            FormData::from_multipart(multipart).await
        }
        _ => Err(crate::Error::ContentTypeMismatch {
            expected: "application/x-www-form-urlencoded or multipart/form-data",
            found: content_type,
        }),
    }
}

fn content_type<R: RequestReader>(req: &R) -> Option<String> {
    req.header(http::header::CONTENT_TYPE.as_str()).map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(Some("application/x-www-form-urlencoded")),
            BodyKind::UrlEncoded
        );
        assert_eq!(
            classify(Some("multipart/form-data; boundary=X-BOUNDARY")),
            BodyKind::Multipart
        );
        assert_eq!(classify(Some("application/json")), BodyKind::Json);
        assert_eq!(classify(Some("application/json; charset=utf-8")), BodyKind::Json);
        assert_eq!(classify(Some("text/plain")), BodyKind::Unsupported);
        assert_eq!(classify(None), BodyKind::Unsupported);
    }

    #[test]
    fn test_classify_ignores_parameters() {
        assert_eq!(
            classify(Some("application/x-www-form-urlencoded; charset=utf-8")),
            BodyKind::UrlEncoded
        );
    }
}
