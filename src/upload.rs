use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_util::stream::Stream;

/// One uploaded file from a parsed form body.
///
/// The payload is readable **at most once**, through exactly one of
/// [`bytes`](UploadedFile::bytes) or [`stream`](UploadedFile::stream): the
/// handle models a one-pass transport stream with no rewind, and consuming
/// it flips the handle into a consumed state from which both accessors fail
/// with [`Error::AlreadyConsumed`](crate::Error::AlreadyConsumed).
#[derive(Debug)]
pub struct UploadedFile {
    file_name: String,
    content_type: mime::Mime,
    state: ReadState,
}

#[derive(Debug)]
enum ReadState {
    Unread(Vec<Bytes>),
    Consumed,
}

impl UploadedFile {
    pub(crate) fn new(file_name: String, content_type: Option<mime::Mime>, chunks: Vec<Bytes>) -> Self {
        UploadedFile {
            file_name,
            content_type: content_type.unwrap_or(mime::TEXT_PLAIN),
            state: ReadState::Unread(chunks),
        }
    }

    /// The original file name sent by the client. May be empty: an empty
    /// `filename=""` still classifies the part as a file.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The file's MIME type, `text/plain` when the part carried none.
    pub fn content_type(&self) -> &mime::Mime {
        &self.content_type
    }

    /// Whether the payload has already been read through either accessor.
    pub fn is_consumed(&self) -> bool {
        matches!(self.state, ReadState::Consumed)
    }

    /// Reads the whole payload into one contiguous buffer.
    ///
    /// Fails with [`Error::AlreadyConsumed`](crate::Error::AlreadyConsumed)
    /// if the payload was already read through either accessor.
    pub fn bytes(&mut self) -> crate::Result<Bytes> {
        let chunks = self.take_chunks()?;

        if chunks.len() == 1 {
            let mut chunks = chunks;
            return Ok(chunks.pop().unwrap_or_else(Bytes::new));
        }

        let mut buf = BytesMut::new();
        for chunk in &chunks {
            buf.extend_from_slice(chunk);
        }
        Ok(buf.freeze())
    }

    /// Opens the payload as a finite, non-restartable stream of chunks, in
    /// the order they arrived on the wire.
    ///
    /// Fails with [`Error::AlreadyConsumed`](crate::Error::AlreadyConsumed)
    /// if the payload was already read through either accessor.
    pub fn stream(&mut self) -> crate::Result<UploadStream> {
        let chunks = self.take_chunks()?;
        Ok(UploadStream {
            chunks: chunks.into(),
        })
    }

    fn take_chunks(&mut self) -> crate::Result<Vec<Bytes>> {
        match mem::replace(&mut self.state, ReadState::Consumed) {
            ReadState::Unread(chunks) => Ok(chunks),
            ReadState::Consumed => Err(crate::Error::AlreadyConsumed {
                file_name: self.file_name.clone(),
            }),
        }
    }
}

/// The byte stream of an [`UploadedFile`], obtained from
/// [`UploadedFile::stream`].
pub struct UploadStream {
    chunks: VecDeque<Bytes>,
}

impl Stream for UploadStream {
    type Item = crate::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.chunks.pop_front().map(Ok))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.chunks.len(), Some(self.chunks.len()))
    }
}
