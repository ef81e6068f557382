use crate::SizeLimit;

/// Constraints applied while parsing a multipart stream: which field names
/// are acceptable, and how large the stream and individual fields may grow.
///
/// # Examples
///
/// ```
/// use formbody::{Constraints, SizeLimit};
///
/// let constraints = Constraints::new()
///     .allowed_fields(vec!["comment", "attachment"])
///     .size_limit(SizeLimit::new().whole_stream(4 * 1024 * 1024));
/// ```
pub struct Constraints {
    pub(crate) size_limit: SizeLimit,
    pub(crate) allowed_fields: Option<Vec<String>>,
}

impl Constraints {
    /// Creates a set of constraints with no allowed-field restriction and
    /// default size limits.
    pub fn new() -> Constraints {
        Constraints::default()
    }

    /// Restricts parsing to the given field names; any other field fails
    /// with [`Error::UnknownField`](crate::Error::UnknownField).
    pub fn allowed_fields<N: Into<String>>(mut self, fields: Vec<N>) -> Constraints {
        self.allowed_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Applies the given [`SizeLimit`].
    pub fn size_limit(mut self, size_limit: SizeLimit) -> Constraints {
        self.size_limit = size_limit;
        self
    }

    pub(crate) fn is_it_allowed(&self, field: Option<&str>) -> bool {
        match &self.allowed_fields {
            Some(allowed) => field
                .map(|field| allowed.iter().any(|f| f == field))
                .unwrap_or(false),
            None => true,
        }
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Constraints {
            size_limit: SizeLimit::default(),
            allowed_fields: None,
        }
    }
}
