use std::borrow::Cow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use encoding_rs::{Encoding, UTF_8};
use futures_util::stream::{Stream, TryStreamExt};
use http::header::{self, HeaderMap};
#[cfg(feature = "json")]
use serde::de::DeserializeOwned;
use spin::mutex::spin::SpinMutex;

use crate::content_disposition::ContentDisposition;
use crate::state::{MultipartState, StreamingStage};

/// A single part of a `multipart/form-data` stream: its headers plus a
/// finite byte sub-stream scoped to the part's boundary-delimited segment.
///
/// The payload can be consumed through the
/// [`Stream`](futures_util::stream::Stream) impl (or [`chunk`](Field::chunk))
/// for chunk-at-a-time reads, or drained in one go with
/// [`bytes`](Field::bytes) / [`text`](Field::text). Dropping a `Field`
/// discards whatever payload was left unread and lets the parser advance to
/// the next part.
pub struct Field {
    state: Arc<SpinMutex<MultipartState>>,
    headers: HeaderMap,
    done: bool,
    meta: FieldMeta,
}

struct FieldMeta {
    name: Option<String>,
    file_name: Option<String>,
    content_type: Option<mime::Mime>,
    idx: usize,
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.meta.name)
            .field("file_name", &self.meta.file_name)
            .field("content_type", &self.meta.content_type)
            .field("index", &self.meta.idx)
            .field("headers", &self.headers)
            .field("done", &self.done)
            .finish()
    }
}

impl Field {
    pub(crate) fn new(
        state: Arc<SpinMutex<MultipartState>>,
        headers: HeaderMap,
        idx: usize,
        content_disposition: ContentDisposition,
    ) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<mime::Mime>().ok());

        Field {
            state,
            headers,
            done: false,
            meta: FieldMeta {
                name: content_disposition.field_name,
                file_name: content_disposition.file_name,
                content_type,
                idx,
            },
        }
    }

    /// The field name from the part's `Content-Disposition` header, if any.
    pub fn name(&self) -> Option<&str> {
        self.meta.name.as_deref()
    }

    /// The file name from the part's `Content-Disposition` header, if any.
    /// May be the empty string; its presence alone marks the part as a file.
    pub fn file_name(&self) -> Option<&str> {
        self.meta.file_name.as_deref()
    }

    /// The part's own `Content-Type`, if one was sent.
    pub fn content_type(&self) -> Option<&mime::Mime> {
        self.meta.content_type.as_ref()
    }

    /// The part's full header map.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The zero-based position of this part in the multipart stream.
    pub fn index(&self) -> usize {
        self.meta.idx
    }

    /// Reads the next payload chunk, or `None` once the part is exhausted.
    pub async fn chunk(&mut self) -> crate::Result<Option<Bytes>> {
        self.try_next().await
    }

    /// Drains the whole payload into one contiguous buffer.
    pub async fn bytes(mut self) -> crate::Result<Bytes> {
        let mut buf = BytesMut::new();

        while let Some(bytes) = self.chunk().await? {
            buf.extend_from_slice(&bytes);
        }

        Ok(buf.freeze())
    }

    /// Drains the payload and decodes it as text, UTF-8 by default.
    pub async fn text(self) -> crate::Result<String> {
        self.text_with_charset("utf-8").await
    }

    /// Drains the payload and decodes it as text, honoring the `charset`
    /// parameter of the part's `Content-Type` and falling back to
    /// `default_encoding`.
    pub async fn text_with_charset(self, default_encoding: &str) -> crate::Result<String> {
        let encoding_name = self
            .content_type()
            .and_then(|mime| mime.get_param(mime::CHARSET))
            .map(|charset| charset.as_str())
            .unwrap_or(default_encoding)
            .to_owned();

        let encoding = Encoding::for_label(encoding_name.as_bytes()).unwrap_or(UTF_8);

        let bytes = self.bytes().await?;

        let (text, _, _) = encoding.decode(&bytes);

        match text {
            Cow::Owned(s) => Ok(s),
            Cow::Borrowed(s) => Ok(String::from(s)),
        }
    }

    /// Drains the payload and deserializes it as JSON.
    ///
    /// # Optional
    ///
    /// This requires the `json` feature (on by default).
    #[cfg(feature = "json")]
    pub async fn json<T: DeserializeOwned>(self) -> crate::Result<T> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(crate::Error::DecodeJson)
    }
}

impl Stream for Field {
    type Item = Result<Bytes, crate::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        let mut state_guard = self.state.lock();
        let state = &mut *state_guard;

        if let Err(err) = state.buffer.poll_stream(cx) {
            return Poll::Ready(Some(Err(err)));
        }

        match state
            .buffer
            .read_field_data(state.boundary.as_str(), state.curr_field_name.as_deref())
        {
            Ok(Some((done, bytes))) => {
                state.curr_field_size_counter += bytes.len() as u64;

                if state.curr_field_size_counter > state.curr_field_size_limit {
                    return Poll::Ready(Some(Err(crate::Error::FieldSizeExceeded {
                        limit: state.curr_field_size_limit,
                        field_name: state.curr_field_name.clone(),
                    })));
                }

                if done {
                    drop(state_guard);
                    self.done = true;
                }

                Poll::Ready(Some(Ok(bytes)))
            }
            Ok(None) => Poll::Pending,
            Err(err) => Poll::Ready(Some(Err(err))),
        }
    }
}

impl Drop for Field {
    fn drop(&mut self) {
        let mut state = self.state.lock();

        if self.done {
            state.stage = StreamingStage::ReadingBoundary;
        } else {
            state.stage = StreamingStage::CleaningPrevFieldData;
        }

        state.is_prev_field_consumed = true;

        if let Some(waker) = state.next_field_waker.take() {
            waker.wake();
        }
    }
}
