use std::collections::HashMap;

use percent_encoding::percent_decode;

use crate::{Multipart, UploadedFile};

/// The decoded contents of a form body: buffered text fields plus uploaded
/// files.
///
/// Built once per request by [`FormData::from_multipart`] or
/// [`FormData::from_urlencoded`] (usually via [`form`](crate::form)); the
/// maps are read-only afterwards. Duplicate names are last-write-wins.
#[derive(Debug)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    /// Drains a [`Multipart`] stream into a `FormData`.
    ///
    /// Parts carrying a `filename` parameter — even an empty one — become
    /// [`files`](FormData::files); parts with only a `name` are buffered and
    /// charset-decoded into [`fields`](FormData::fields). Parts without a
    /// usable `Content-Disposition` name are skipped, matching permissive
    /// form submission in the wild. Any decode error aborts assembly; no
    /// partial result is returned.
    pub async fn from_multipart(mut multipart: Multipart) -> crate::Result<FormData> {
        let mut fields = HashMap::new();
        let mut files = HashMap::new();

        while let Some(mut field) = multipart.next_field().await? {
            let name = match field.name() {
                Some(name) => name.to_owned(),
                None => {
                    log::debug!(
                        "skipping multipart part {} without a usable Content-Disposition name",
                        field.index()
                    );
                    continue;
                }
            };

            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let content_type = field.content_type().cloned();

                    // The transport is forward-only; capture the payload now
                    // so the handle survives the parser moving on.
                    let mut chunks = Vec::new();
                    while let Some(chunk) = field.chunk().await? {
                        chunks.push(chunk);
                    }

                    files.insert(name, UploadedFile::new(file_name, content_type, chunks));
                }
                None => {
                    fields.insert(name, field.text().await?);
                }
            }
        }

        Ok(FormData { fields, files })
    }

    /// Decodes an `application/x-www-form-urlencoded` body.
    ///
    /// Splits on `&` and `=`, decodes `+` as space and percent-escapes on
    /// both sides. Never produces files. Keys without a `=` decode to an
    /// empty value.
    pub fn from_urlencoded<B: AsRef<[u8]>>(body: B) -> FormData {
        let mut fields = HashMap::new();

        for pair in body.as_ref().split(|&b| b == b'&') {
            if pair.is_empty() {
                continue;
            }

            let mut halves = pair.splitn(2, |&b| b == b'=');
            let name = decode_component(halves.next().unwrap_or_default());
            let value = decode_component(halves.next().unwrap_or_default());
            fields.insert(name, value);
        }

        FormData {
            fields,
            files: HashMap::new(),
        }
    }

    /// The decoded text fields.
    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    /// Looks up one text field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The uploaded files, keyed by field name.
    pub fn files(&self) -> &HashMap<String, UploadedFile> {
        &self.files
    }

    /// Looks up one uploaded file by field name.
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    /// Looks up one uploaded file by field name, mutably, for consumption
    /// via [`UploadedFile::bytes`] or [`UploadedFile::stream`].
    pub fn file_mut(&mut self, name: &str) -> Option<&mut UploadedFile> {
        self.files.get_mut(name)
    }
}

fn decode_component(raw: &[u8]) -> String {
    let unplussed: Vec<u8> = raw
        .iter()
        .map(|&b| if b == b'+' { b' ' } else { b })
        .collect();

    percent_decode(&unplussed).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlencoded_basic() {
        let form = FormData::from_urlencoded("a=1&b=hello%20world&c=x%2By");
        assert_eq!(form.field("a"), Some("1"));
        assert_eq!(form.field("b"), Some("hello world"));
        assert_eq!(form.field("c"), Some("x+y"));
        assert!(form.files().is_empty());
    }

    #[test]
    fn test_urlencoded_plus_is_space() {
        let form = FormData::from_urlencoded("greeting=hello+there");
        assert_eq!(form.field("greeting"), Some("hello there"));
    }

    #[test]
    fn test_urlencoded_missing_value() {
        let form = FormData::from_urlencoded("lonely&pair=2");
        assert_eq!(form.field("lonely"), Some(""));
        assert_eq!(form.field("pair"), Some("2"));
    }

    #[test]
    fn test_urlencoded_last_write_wins() {
        let form = FormData::from_urlencoded("k=first&k=second");
        assert_eq!(form.field("k"), Some("second"));
    }

    #[test]
    fn test_urlencoded_encoded_key() {
        let form = FormData::from_urlencoded("my%20key=v");
        assert_eq!(form.field("my key"), Some("v"));
    }
}
