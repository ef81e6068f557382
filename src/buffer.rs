use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_util::stream::Stream;
use memchr::{memchr_iter, memmem};

use crate::constants;
use crate::request::BodyStream;

pub(crate) struct StreamBuffer {
    pub(crate) eof: bool,
    pub(crate) buf: BytesMut,
    pub(crate) stream: BodyStream,
    pub(crate) whole_stream_size_limit: u64,
    pub(crate) stream_size_counter: u64,
}

impl StreamBuffer {
    pub fn new(stream: BodyStream, whole_stream_size_limit: u64) -> Self {
        StreamBuffer {
            eof: false,
            buf: BytesMut::new(),
            stream,
            whole_stream_size_limit,
            stream_size_counter: 0,
        }
    }

    pub fn poll_stream(&mut self, cx: &mut Context<'_>) -> crate::Result<()> {
        if self.eof {
            return Ok(());
        }

        loop {
            match Pin::new(&mut self.stream).poll_next(cx) {
                Poll::Ready(Some(Ok(data))) => {
                    self.stream_size_counter += data.len() as u64;
                    if self.stream_size_counter > self.whole_stream_size_limit {
                        return Err(crate::Error::StreamSizeExceeded {
                            limit: self.whole_stream_size_limit,
                        });
                    }
                    self.buf.extend_from_slice(&data);
                }
                Poll::Ready(Some(Err(err))) => return Err(err),
                Poll::Ready(None) => {
                    self.eof = true;
                    return Ok(());
                }
                Poll::Pending => return Ok(()),
            }
        }
    }

    pub fn read_exact(&mut self, size: usize) -> Option<Bytes> {
        if size <= self.buf.len() {
            Some(self.buf.split_to(size).freeze())
        } else {
            None
        }
    }

    pub fn read_until(&mut self, pattern: &[u8]) -> Option<Bytes> {
        memmem::find(&self.buf, pattern).map(|idx| self.buf.split_to(idx + pattern.len()).freeze())
    }

    /// Reads payload bytes of the current part, stopping at the part's
    /// closing `CRLF--boundary` marker.
    ///
    /// Returns `(true, bytes)` when the marker was reached (the `CRLF` is
    /// consumed, the `--boundary` itself is left buffered), `(false, bytes)`
    /// for a partial read, and `None` when more input is needed first. Bytes
    /// that could be the start of a marker straddling a chunk edge are held
    /// back rather than emitted.
    pub fn read_field_data(
        &mut self,
        boundary: &str,
        field_name: Option<&str>,
    ) -> crate::Result<Option<(bool, Bytes)>> {
        if self.buf.is_empty() {
            return if self.eof {
                Err(crate::Error::IncompleteFieldData {
                    field_name: field_name.map(str::to_owned),
                })
            } else {
                Ok(None)
            };
        }

        let boundary_deriv = format!("{}{}{}", constants::CRLF, constants::BOUNDARY_EXT, boundary);

        match memmem::find(&self.buf, boundary_deriv.as_bytes()) {
            Some(idx) => {
                let bytes = self.buf.split_to(idx).freeze();
                // Discard the CRLF that terminated the payload.
                drop(self.buf.split_to(constants::CRLF.len()));
                Ok(Some((true, bytes)))
            }
            None => {
                if self.eof {
                    return Err(crate::Error::IncompleteFieldData {
                        field_name: field_name.map(str::to_owned),
                    });
                }

                // Only the trailing `boundary_deriv.len() - 1` bytes can hold
                // the start of a marker cut off by the chunk edge.
                let buf_len = self.buf.len();
                let window_start = buf_len.saturating_sub(boundary_deriv.len() - 1);
                let mut emit_up_to = buf_len;
                for rel_idx in memchr_iter(b'\r', &self.buf[window_start..]) {
                    let idx = window_start + rel_idx;
                    if boundary_deriv.as_bytes().starts_with(&self.buf[idx..]) {
                        emit_up_to = idx;
                        break;
                    }
                }

                if emit_up_to == 0 {
                    Ok(None)
                } else {
                    Ok(Some((false, self.buf.split_to(emit_up_to).freeze())))
                }
            }
        }
    }
}
