use std::time::{SystemTime, UNIX_EPOCH};

const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

/// Fields and an optional file for a `multipart/form-data` request.
///
/// Multipart support is minimal: one file part, no streaming.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    fields: Vec<(String, String)>,
    file: Option<FilePart>,
}

/// The file of a [`MultipartForm`].
#[derive(Debug, Clone)]
pub struct FilePart {
    name: String,
    file_name: String,
    content_type: Option<String>,
    data: Vec<u8>,
}

impl MultipartForm {
    /// Empty form.
    pub fn new() -> Self {
        MultipartForm::default()
    }

    /// Add a text field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Set the file part.
    pub fn file(mut self, file: FilePart) -> Self {
        self.file = Some(file);
        self
    }

    /// The text fields.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub(crate) fn encode(&self, boundary: &str) -> Vec<u8> {
        let mut out = Vec::new();

        for (name, value) in &self.fields {
            out.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    boundary, name, value
                )
                .as_bytes(),
            );
        }

        if let Some(file) = &self.file {
            out.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: {}\r\n\r\n",
                    boundary,
                    file.name,
                    file.file_name,
                    file.mime()
                )
                .as_bytes(),
            );
            out.extend_from_slice(&file.data);
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        out
    }
}

impl FilePart {
    /// File field `name` holding `data` as `file_name`.
    pub fn new(name: impl Into<String>, file_name: impl Into<String>, data: Vec<u8>) -> Self {
        FilePart {
            name: name.into(),
            file_name: file_name.into(),
            content_type: None,
            data,
        }
    }

    /// Content type of the file. Defaults to `application/octet-stream`.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub(crate) fn mime(&self) -> &str {
        match self.content_type.as_deref() {
            Some(c) if !c.is_empty() => c,
            _ => DEFAULT_FILE_TYPE,
        }
    }
}

/// A fresh multipart boundary.
pub(crate) fn boundary() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("------multipartformboundary{}", millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_prefix() {
        let b = boundary();
        assert!(b.starts_with("------multipartformboundary"));
        assert!(b.len() > "------multipartformboundary".len());
    }

    #[test]
    fn file_type_defaults() {
        let f = FilePart::new("f", "a.bin", vec![]);
        assert_eq!(f.mime(), "application/octet-stream");

        let f = FilePart::new("f", "a.bin", vec![]).content_type("");
        assert_eq!(f.mime(), "application/octet-stream");

        let f = FilePart::new("f", "a.png", vec![]).content_type("image/png");
        assert_eq!(f.mime(), "image/png");
    }

    #[test]
    fn encode_fields_and_file() {
        let form = MultipartForm::new()
            .field("title", "hello")
            .file(FilePart::new("upload", "a.txt", b"abc".to_vec()));

        let body = String::from_utf8(form.encode("XX")).unwrap();

        assert_eq!(
            body,
            "--XX\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nhello\r\n\
             --XX\r\nContent-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
             Content-Type: application/octet-stream\r\n\r\nabc\r\n\
             --XX--\r\n"
        );
    }
}
