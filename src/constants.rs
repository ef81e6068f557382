use lazy_static::lazy_static;
use regex::Regex;

pub(crate) const DEFAULT_WHOLE_STREAM_SIZE_LIMIT: u64 = u64::MAX;
pub(crate) const DEFAULT_PER_FIELD_SIZE_LIMIT: u64 = u64::MAX;

pub(crate) const MAX_HEADERS: usize = 32;
pub(crate) const BOUNDARY_EXT: &str = "--";
pub(crate) const CRLF: &str = "\r\n";
pub(crate) const CRLF_CRLF: &str = "\r\n\r\n";

lazy_static! {
    // `name` must not match the tail of `filename`, hence the leading guard.
    pub(crate) static ref CONTENT_DISPOSITION_FIELD_NAME_RE: Regex =
        Regex::new(r#"(?:^|[;\s])name="([^"]+)""#).unwrap();
    // An empty filename is still a filename; browsers send `filename=""` for
    // file inputs left blank.
    pub(crate) static ref CONTENT_DISPOSITION_FILE_NAME_RE: Regex =
        Regex::new(r#"filename="([^"]*)""#).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_field_name_re() {
        let val = r#"form-data; name="my_field""#;
        let name = CONTENT_DISPOSITION_FIELD_NAME_RE.captures(val).unwrap();
        assert_eq!(name.get(1).unwrap().as_str(), "my_field");

        let val = r#"form-data; name="my field""#;
        let name = CONTENT_DISPOSITION_FIELD_NAME_RE.captures(val).unwrap();
        assert_eq!(name.get(1).unwrap().as_str(), "my field");

        let val = r#"form-data; name="my_field"; filename="file abc.txt""#;
        let name = CONTENT_DISPOSITION_FIELD_NAME_RE.captures(val).unwrap();
        assert_eq!(name.get(1).unwrap().as_str(), "my_field");

        let val = "form-data; name=\"你好\"; filename=\"file abc.txt\"";
        let name = CONTENT_DISPOSITION_FIELD_NAME_RE.captures(val).unwrap();
        assert_eq!(name.get(1).unwrap().as_str(), "你好");
    }

    #[test]
    fn test_field_name_re_ignores_filename() {
        let val = r#"form-data; filename="orphan.txt""#;
        assert!(CONTENT_DISPOSITION_FIELD_NAME_RE.captures(val).is_none());
    }

    #[test]
    fn test_content_disposition_file_name_re() {
        let val = r#"form-data; name="my_field"; filename="file_name.txt""#;
        let file_name = CONTENT_DISPOSITION_FILE_NAME_RE.captures(val).unwrap();
        assert_eq!(file_name.get(1).unwrap().as_str(), "file_name.txt");

        let val = r#"form-data; name="my_field"; filename="file name.txt""#;
        let file_name = CONTENT_DISPOSITION_FILE_NAME_RE.captures(val).unwrap();
        assert_eq!(file_name.get(1).unwrap().as_str(), "file name.txt");

        let val = "form-data; filename=\"কখগ-你好.txt\"";
        let file_name = CONTENT_DISPOSITION_FILE_NAME_RE.captures(val).unwrap();
        assert_eq!(file_name.get(1).unwrap().as_str(), "কখগ-你好.txt");
    }

    #[test]
    fn test_file_name_re_accepts_empty() {
        let val = r#"form-data; name="upload"; filename="""#;
        let file_name = CONTENT_DISPOSITION_FILE_NAME_RE.captures(val).unwrap();
        assert_eq!(file_name.get(1).unwrap().as_str(), "");
    }
}
