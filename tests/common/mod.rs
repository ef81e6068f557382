#![allow(dead_code)]

use bytes::Bytes;
use formbody::{BodyStream, RequestReader};
use futures::stream::{self, StreamExt};

/// A minimal server-side request collaborator for exercising the parsing
/// entry points and the CORS middleware.
pub struct TestRequest {
    method: String,
    headers: Vec<(String, String)>,
    body: Option<BodyStream>,
    remote_addr: Option<String>,
}

impl TestRequest {
    pub fn new(method: &str) -> TestRequest {
        TestRequest {
            method: method.to_owned(),
            headers: Vec::new(),
            body: None,
            remote_addr: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> TestRequest {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Whole body delivered as a single chunk.
    pub fn with_body(mut self, data: impl Into<Bytes>) -> TestRequest {
        let data = data.into();
        self.body = Some(stream::iter(vec![formbody::Result::Ok(data)]).boxed());
        self
    }

    /// Body delivered one byte per chunk, stressing boundary detection
    /// across chunk edges.
    pub fn with_body_trickle(mut self, data: &[u8]) -> TestRequest {
        let chunks: Vec<formbody::Result<Bytes>> = data
            .iter()
            .map(|&b| formbody::Result::Ok(Bytes::copy_from_slice(&[b])))
            .collect();
        self.body = Some(stream::iter(chunks).boxed());
        self
    }

    pub fn with_remote_addr(mut self, addr: &str) -> TestRequest {
        self.remote_addr = Some(addr.to_owned());
        self
    }
}

impl RequestReader for TestRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn take_body(&mut self) -> Option<BodyStream> {
        self.body.take()
    }

    fn connection_info(&self, key: &str) -> Option<String> {
        match key {
            formbody::REMOTE_ADDR => self.remote_addr.clone(),
            _ => None,
        }
    }
}
