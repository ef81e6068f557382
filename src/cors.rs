use std::future::Future;

use bytes::Bytes;
use http::header::{
    HeaderMap, HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    ACCESS_CONTROL_MAX_AGE, ORIGIN, VARY,
};
use http::Response;

use crate::method::Method;
use crate::request::RequestReader;

const DEFAULT_ALLOW_HEADERS: [&str; 5] = [
    "Origin",
    "Content-Type",
    "Accept",
    "Authorization",
    "X-Requested-With",
];

/// The fixed CORS policy knobs and their defaults.
///
/// Alternate policies (say, disallowing credentials) are a field
/// substitution, not a code change.
pub struct CorsConfig {
    /// Emit `Access-Control-Allow-Credentials: true`. Default `true`; note
    /// that with credentials allowed, a wildcard origin is invalid, which is
    /// why [`Cors`] echoes the request origin back by default.
    pub allow_credentials: bool,
    /// Header names joined into `Access-Control-Allow-Headers`.
    pub allow_headers: Vec<String>,
    /// Method names joined into `Access-Control-Allow-Methods`. Defaults to
    /// the crate's full supported set.
    pub allow_methods: Vec<String>,
    /// Header names joined into `Access-Control-Expose-Headers`. Default
    /// empty (the header is still sent, with an empty value).
    pub expose_headers: Vec<String>,
    /// Preflight cache lifetime for `Access-Control-Max-Age`, in seconds.
    /// Default `86400`.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> CorsConfig {
        CorsConfig {
            allow_credentials: true,
            allow_headers: DEFAULT_ALLOW_HEADERS.iter().map(|s| s.to_string()).collect(),
            allow_methods: Method::ALL.iter().map(|m| m.as_str().to_string()).collect(),
            expose_headers: Vec::new(),
            max_age_secs: 86400,
        }
    }
}

/// A response-decorating wrapper around a downstream handler.
///
/// Per request: reads the `Origin` header, asks the configured origin
/// predicate whether to engage, short-circuits `OPTIONS` preflights with an
/// empty success response, and merges the assembled CORS headers into the
/// downstream response otherwise. Requests without an accepted origin pass
/// through completely untouched.
///
/// Holds only fixed configuration; there is no per-request state.
pub struct Cors {
    config: CorsConfig,
    added_headers: HeaderMap,
    allow_origin: Box<dyn Fn(&str) -> bool + Send + Sync>,
}

impl Cors {
    /// A middleware that engages for every origin, with default policy.
    pub fn new() -> Cors {
        Cors::with_config(CorsConfig::default())
    }

    /// A middleware with the given policy, engaging for every origin.
    pub fn with_config(config: CorsConfig) -> Cors {
        Cors {
            config,
            added_headers: HeaderMap::new(),
            allow_origin: Box::new(|_| true),
        }
    }

    /// Sets the origin predicate. A rejected origin means the request passes
    /// to the downstream handler with no CORS headers at all — the
    /// predicate's decision is final.
    pub fn allow_origin<F>(mut self, predicate: F) -> Cors
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.allow_origin = Box::new(predicate);
        self
    }

    /// Adds a header to the assembled CORS header set, overriding the
    /// default for that name.
    ///
    /// Supplying `Access-Control-Allow-Origin` here switches the middleware
    /// from echoing the request origin to the fixed value, and makes it
    /// emit `Vary: Origin` alongside.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Cors {
        self.added_headers.append(name, value);
        self
    }

    /// Runs one request through the middleware and the given downstream
    /// handler.
    ///
    /// The downstream handler's own headers win over the CORS defaults on
    /// collision; the allow-origin/vary decision is applied regardless.
    /// `OPTIONS` requests with an accepted origin never reach the handler.
    pub async fn handle<R, H, Fut>(&self, req: R, next: H) -> crate::Result<Response<Bytes>>
    where
        R: RequestReader,
        H: FnOnce(R) -> Fut,
        Fut: Future<Output = crate::Result<Response<Bytes>>>,
    {
        let origin = match req.header(ORIGIN.as_str()) {
            Some(origin) if (self.allow_origin)(origin) => origin.to_owned(),
            _ => return next(req).await,
        };

        let mut cors_headers = self.assemble_headers()?;

        if self.added_headers.contains_key(ACCESS_CONTROL_ALLOW_ORIGIN) {
            // A fixed allow-origin value still varies the effective response
            // per origin, in cache-correctness terms.
            cors_headers.append(VARY, HeaderValue::from_static("Origin"));
        } else {
            let echoed =
                HeaderValue::from_str(&origin).map_err(|err| crate::Error::DecodeHeaderValue {
                    value: origin.clone().into_bytes(),
                    cause: err.into(),
                })?;
            cors_headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, echoed);
        }

        let is_preflight = Method::resolve(req.method())
            .map(|method| method == Method::Options)
            .unwrap_or(false);

        if is_preflight {
            log::debug!("answering CORS preflight for origin '{}'", origin);

            let mut response = Response::new(Bytes::new());
            *response.headers_mut() = cors_headers;
            return Ok(response);
        }

        let mut response = next(req).await?;

        let headers = response.headers_mut();
        let handler_set: Vec<HeaderName> = headers.keys().cloned().collect();

        for (name, value) in &cors_headers {
            if *name == ACCESS_CONTROL_ALLOW_ORIGIN {
                headers.insert(name, value.clone());
            } else if *name == VARY {
                headers.append(name, value.clone());
            } else if !handler_set.contains(name) {
                headers.append(name, value.clone());
            }
        }

        Ok(response)
    }

    fn assemble_headers(&self) -> crate::Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            join_value(&self.config.expose_headers)?,
        );
        if self.config.allow_credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, join_value(&self.config.allow_headers)?);
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, join_value(&self.config.allow_methods)?);
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(self.config.max_age_secs));

        // Caller-supplied headers override the defaults wholesale.
        for name in self.added_headers.keys() {
            headers.remove(name);
        }
        for (name, value) in &self.added_headers {
            headers.append(name, value.clone());
        }

        Ok(headers)
    }
}

impl Default for Cors {
    fn default() -> Cors {
        Cors::new()
    }
}

fn join_value(values: &[String]) -> crate::Result<HeaderValue> {
    let joined = values.join(", ");
    HeaderValue::from_str(&joined).map_err(|err| crate::Error::DecodeHeaderValue {
        value: joined.into_bytes(),
        cause: err.into(),
    })
}
