use bytes::Bytes;
use futures_util::stream::BoxStream;

/// The body of a request: a finite stream of byte chunks, consumable exactly
/// once.
pub type BodyStream = BoxStream<'static, crate::Result<Bytes>>;

/// Connection metadata key for the peer address, e.g. `"203.0.113.7"`.
pub const REMOTE_ADDR: &str = "remote_addr";
/// Connection metadata key for the peer port.
pub const REMOTE_PORT: &str = "remote_port";
/// Connection metadata key for the local address the request arrived on.
pub const LOCAL_ADDR: &str = "local_addr";
/// Connection metadata key for the local port.
pub const LOCAL_PORT: &str = "local_port";

/// The capability this crate needs from a server's request type.
///
/// The parsing entry points ([`form`](crate::form), [`json`](crate::json),
/// [`read_to_string`](crate::read_to_string)) and the CORS middleware are
/// written against this trait rather than any particular HTTP framework, so
/// hooking them up is one small `impl` on the host's request type.
pub trait RequestReader {
    /// Looks up a request header by name. Lookup must be case-insensitive.
    fn header(&self, name: &str) -> Option<&str>;

    /// The raw request method string, e.g. `"GET"`.
    fn method(&self) -> &str;

    /// Takes the body stream out of the request. Returns `None` once the
    /// body has already been taken; the stream is not rewindable.
    fn take_body(&mut self) -> Option<BodyStream>;

    /// Transport-level connection metadata by key (see [`REMOTE_ADDR`] and
    /// friends). Transports without such metadata return `None`.
    fn connection_info(&self, _key: &str) -> Option<String> {
        None
    }
}
