//! Where a document comes from: a local path or a remote URL.

use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use url::Url;

use crate::error::EngineError;

/// A parsed document location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Path(PathBuf),
    Remote(Url),
}

impl DocumentSource {
    /// Parse a document URL.
    ///
    /// Accepts plain filesystem paths, `file://` URLs and `http(s)://` URLs.
    /// Percent-encoded paths (e.g. spaces as `%20`) are decoded when the raw
    /// path does not exist but the decoded one does.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(EngineError::LoadError("empty document URL".to_string()));
        }

        match Url::parse(raw) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(DocumentSource::Path)
                .map_err(|_| EngineError::LoadError(format!("not a local file URL: {}", raw))),
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(DocumentSource::Remote(url)),
            // Windows drive letters parse as one-letter schemes
            Ok(url) if url.scheme().len() > 1 => Err(EngineError::LoadError(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            ))),
            _ => Ok(DocumentSource::Path(decode_path(raw))),
        }
    }

    /// Read the raw document bytes.
    pub async fn fetch(&self) -> Result<Vec<u8>, EngineError> {
        match self {
            DocumentSource::Path(path) => {
                debug!("reading document from {}", path.display());
                tokio::fs::read(path)
                    .await
                    .map_err(|e| EngineError::FetchError(format!("{}: {}", path.display(), e)))
            }
            DocumentSource::Remote(url) => {
                debug!("downloading document from {}", url);
                let response = reqwest::get(url.clone())
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| EngineError::FetchError(e.to_string()))?;
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| EngineError::FetchError(e.to_string()))?;
                Ok(bytes.to_vec())
            }
        }
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Path(path) => write!(f, "{}", path.display()),
            DocumentSource::Remote(url) => write!(f, "{}", url),
        }
    }
}

fn decode_path(raw: &str) -> PathBuf {
    if Path::new(raw).exists() {
        return PathBuf::from(raw);
    }
    match urlencoding::decode(raw) {
        Ok(decoded) if decoded != raw && Path::new(&*decoded).exists() => {
            PathBuf::from(decoded.into_owned())
        }
        _ => PathBuf::from(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_plain_and_file_url_paths() {
        assert_eq!(
            DocumentSource::parse("docs/manual.pdf").unwrap(),
            DocumentSource::Path(PathBuf::from("docs/manual.pdf"))
        );

        #[cfg(unix)]
        assert_eq!(
            DocumentSource::parse("file:///tmp/report.pdf").unwrap(),
            DocumentSource::Path(PathBuf::from("/tmp/report.pdf"))
        );
    }

    #[test]
    fn test_parse_remote_and_unsupported() {
        let source = DocumentSource::parse("https://example.com/a.pdf").unwrap();
        assert!(matches!(source, DocumentSource::Remote(ref url) if url.host_str() == Some("example.com")));

        let err = DocumentSource::parse("ftp://example.com/a.pdf").unwrap_err();
        assert_eq!(err, EngineError::LoadError("unsupported URL scheme: ftp".to_string()));

        assert!(DocumentSource::parse("   ").is_err());
    }

    #[test]
    fn test_parse_decodes_percent_encoded_path() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("annual report.pdf");
        std::fs::write(&real, b"%PDF-1.7").unwrap();

        let encoded = format!("{}/annual%20report.pdf", dir.path().display());
        assert_eq!(DocumentSource::parse(&encoded).unwrap(), DocumentSource::Path(real));
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.4 test").unwrap();

        let source = DocumentSource::Path(file.path().to_path_buf());
        assert_eq!(source.fetch().await.unwrap(), b"%PDF-1.4 test".to_vec());

        let missing = DocumentSource::Path(file.path().with_extension("missing"));
        assert!(matches!(missing.fetch().await, Err(EngineError::FetchError(_))));
    }
}
