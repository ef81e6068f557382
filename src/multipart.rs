use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt, TryStreamExt};
use spin::mutex::spin::SpinMutex;
#[cfg(feature = "tokio-io")]
use tokio::io::AsyncRead;
#[cfg(feature = "tokio-io")]
use tokio_util::io::ReaderStream;

use crate::buffer::StreamBuffer;
use crate::constants;
use crate::content_disposition::ContentDisposition;
use crate::helpers;
use crate::request::BodyStream;
use crate::state::{MultipartState, StreamingStage};
use crate::{Constraints, Field};

/// Parses a `multipart/form-data` byte stream into a sequence of
/// [`Field`](crate::Field)s.
///
/// The underlying transport is a single forward-only stream, so fields are
/// produced strictly in order and only one [`Field`](crate::Field) is alive
/// at a time. A [`Drop`](std::ops::Drop) implementation on `Field` signals
/// when it's time to move forward, so avoid leaking that type or anything
/// which contains it.
///
/// Fields can be consumed through the [`next_field`](Multipart::next_field)
/// method or through the [`Stream`](futures_util::stream::Stream) impl.
///
/// # Examples
///
/// ```
/// use std::convert::Infallible;
///
/// use formbody::bytes::Bytes;
/// use formbody::Multipart;
/// use futures::stream::once;
///
/// # async fn run() {
/// let data =
///     "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"my_text_field\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
/// let stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });
/// let mut multipart = Multipart::new(stream, "X-BOUNDARY");
///
/// while let Some(field) = multipart.next_field().await.unwrap() {
///     println!("Field: {:?}", field.text().await)
/// }
/// # }
/// # tokio::runtime::Runtime::new().unwrap().block_on(run());
/// ```
pub struct Multipart {
    state: Arc<SpinMutex<MultipartState>>,
    constraints: Constraints,
}

impl Multipart {
    /// Constructs a new `Multipart` from a stream of
    /// [`Bytes`](bytes::Bytes)-convertible chunks and a boundary.
    pub fn new<S, O, E, B>(stream: S, boundary: B) -> Multipart
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
        B: Into<String>,
    {
        Multipart::new_with_constraints(stream, boundary, Constraints::default())
    }

    /// Constructs a new `Multipart` with the given [`Constraints`].
    pub fn new_with_constraints<S, O, E, B>(stream: S, boundary: B, constraints: Constraints) -> Multipart
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
        B: Into<String>,
    {
        let stream = stream
            .map_ok(|b| b.into())
            .map_err(|err| crate::Error::StreamReadFailed(err.into()))
            .boxed();

        Multipart::from_body_stream(stream, boundary.into(), constraints)
    }

    pub(crate) fn from_body_stream(stream: BodyStream, boundary: String, constraints: Constraints) -> Multipart {
        let state = MultipartState {
            buffer: StreamBuffer::new(stream, constraints.size_limit.whole_stream),
            boundary,
            stage: StreamingStage::ReadingBoundary,
            is_prev_field_consumed: true,
            next_field_waker: None,
            next_field_idx: 0,
            curr_field_name: None,
            curr_field_size_limit: constraints.size_limit.per_field,
            curr_field_size_counter: 0,
        };

        Multipart {
            state: Arc::new(SpinMutex::new(state)),
            constraints,
        }
    }

    /// Constructs a new `Multipart` from an
    /// [`AsyncRead`](tokio::io::AsyncRead) reader and a boundary.
    ///
    /// # Optional
    ///
    /// This requires the optional `tokio-io` feature to be enabled.
    #[cfg(feature = "tokio-io")]
    pub fn with_reader<R, B>(reader: R, boundary: B) -> Multipart
    where
        R: AsyncRead + Send + 'static,
        B: Into<String>,
    {
        Multipart::new(ReaderStream::new(reader), boundary)
    }

    /// Constructs a new `Multipart` from an
    /// [`AsyncRead`](tokio::io::AsyncRead) reader, a boundary and
    /// [`Constraints`].
    ///
    /// # Optional
    ///
    /// This requires the optional `tokio-io` feature to be enabled.
    #[cfg(feature = "tokio-io")]
    pub fn with_reader_with_constraints<R, B>(reader: R, boundary: B, constraints: Constraints) -> Multipart
    where
        R: AsyncRead + Send + 'static,
        B: Into<String>,
    {
        Multipart::new_with_constraints(ReaderStream::new(reader), boundary, constraints)
    }

    /// Yields the next [`Field`](crate::Field) if available.
    pub async fn next_field(&mut self) -> crate::Result<Option<Field>> {
        self.try_next().await
    }

    /// Yields the next [`Field`](crate::Field) with its positional index as
    /// a tuple `(usize, Field)`.
    pub async fn next_field_with_idx(&mut self) -> crate::Result<Option<(usize, Field)>> {
        self.try_next().await.map(|f| f.map(|field| (field.index(), field)))
    }
}

impl Stream for Multipart {
    type Item = Result<Field, crate::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut state_guard = self.state.lock();
        let state = &mut *state_guard;

        if state.stage == StreamingStage::Eof {
            return Poll::Ready(None);
        }

        // The previous field owns the stream until it is dropped.
        if !state.is_prev_field_consumed {
            state.next_field_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        if let Err(err) = state.buffer.poll_stream(cx) {
            return Poll::Ready(Some(Err(err)));
        }

        if state.stage == StreamingStage::CleaningPrevFieldData {
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
                        log::trace!(
                            "discarded unread data of field '{}'",
                            state.curr_field_name.as_deref().unwrap_or("<unknown>")
                        );
                        state.stage = StreamingStage::ReadingBoundary;
                    } else {
                        return Poll::Pending;
                    }
                }
                Ok(None) => {
                    return Poll::Pending;
                }
                Err(err) => {
                    return Poll::Ready(Some(Err(err)));
                }
            }
        }

        if state.stage == StreamingStage::ReadingBoundary {
            let boundary = &state.boundary;
            let boundary_deriv_len = constants::BOUNDARY_EXT.len() + boundary.len() + 2;

            let boundary_bytes = match state.buffer.read_exact(boundary_deriv_len) {
                Some(bytes) => bytes,
                None => {
                    return if state.buffer.eof {
                        Poll::Ready(Some(Err(crate::Error::IncompleteStream)))
                    } else {
                        Poll::Pending
                    };
                }
            };

            let final_boundary = format!(
                "{}{}{}",
                constants::BOUNDARY_EXT,
                boundary,
                constants::BOUNDARY_EXT
            );
            if &boundary_bytes[..] == final_boundary.as_bytes() {
                state.stage = StreamingStage::Eof;
                return Poll::Ready(None);
            }

            let part_boundary = format!("{}{}{}", constants::BOUNDARY_EXT, boundary, constants::CRLF);
            if &boundary_bytes[..] != part_boundary.as_bytes() {
                return Poll::Ready(Some(Err(crate::Error::IncompleteStream)));
            }

            state.stage = StreamingStage::ReadingFieldHeaders;
        }

        if state.stage == StreamingStage::ReadingFieldHeaders {
            let header_bytes = match state.buffer.read_until(constants::CRLF_CRLF.as_bytes()) {
                Some(bytes) => bytes,
                None => {
                    return if state.buffer.eof {
                        Poll::Ready(Some(Err(crate::Error::IncompleteStream)))
                    } else {
                        Poll::Pending
                    };
                }
            };

            let mut headers = [httparse::EMPTY_HEADER; constants::MAX_HEADERS];

            let headers = match httparse::parse_headers(&header_bytes, &mut headers) {
                Ok(httparse::Status::Complete((_, raw_headers))) => {
                    match helpers::convert_raw_headers_to_header_map(raw_headers) {
                        Ok(headers) => headers,
                        Err(err) => {
                            return Poll::Ready(Some(Err(err)));
                        }
                    }
                }
                Ok(httparse::Status::Partial) => {
                    return Poll::Ready(Some(Err(crate::Error::IncompleteHeaders)));
                }
                Err(err) => {
                    return Poll::Ready(Some(Err(crate::Error::ReadHeaderFailed(err))));
                }
            };

            state.stage = StreamingStage::ReadingFieldData;
            state.is_prev_field_consumed = false;

            let field_idx = state.next_field_idx;
            state.next_field_idx += 1;

            let content_disposition = ContentDisposition::parse(&headers);
            let field_size_limit = self
                .constraints
                .size_limit
                .extract_size_limit_for(content_disposition.field_name.as_deref());

            state.curr_field_name = content_disposition.field_name.clone();
            state.curr_field_size_limit = field_size_limit;
            state.curr_field_size_counter = 0;

            drop(state_guard);

            let next_field = Field::new(Arc::clone(&self.state), headers, field_idx, content_disposition);

            if !self.constraints.is_it_allowed(next_field.name()) {
                return Poll::Ready(Some(Err(crate::Error::UnknownField {
                    field_name: next_field.name().map(str::to_owned),
                })));
            }

            return Poll::Ready(Some(Ok(next_field)));
        }

        state.next_field_waker = Some(cx.waker().clone());
        Poll::Pending
    }
}
