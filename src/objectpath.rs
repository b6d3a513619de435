//! Bidirectional mapping between DLNA object IDs, URL paths and filesystem
//! paths under a media root (component C2).

use std::path::{Path, PathBuf};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::AppError;

/// Characters that must be escaped when an `ObjectPath` segment is placed
/// into a URL path component.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'%');

/// A POSIX-style absolute path identifying a DLNA object, always stored with
/// a leading `/` and no trailing slash (except for the root itself, `"/"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn root() -> Self {
        ObjectPath("/".to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Basename of the path, empty string for the root.
    pub fn basename(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// Parse the path component of a request URI: percent-decoded, rooted at `/`.
    pub fn from_uri(raw_path: &str) -> Result<Self, AppError> {
        let decoded = percent_decode_str(raw_path)
            .decode_utf8()
            .map_err(|_| AppError::BadRequest("path is not valid utf-8".into()))?;
        Ok(normalize(&decoded))
    }

    /// Render as an absolute URL against `base` (e.g. `http://host:port`),
    /// re-percent-encoding each segment.
    pub fn as_uri(&self, base: &str) -> String {
        if self.is_root() {
            return format!("{}/", base.trim_end_matches('/'));
        }
        let mut out = base.trim_end_matches('/').to_string();
        for segment in self.0.split('/').filter(|s| !s.is_empty()) {
            out.push('/');
            out.push_str(&utf8_percent_encode(segment, PATH_SEGMENT).to_string());
        }
        out
    }

    /// `"0"` maps to the root; anything else must already be an absolute
    /// POSIX path and is taken as-is.
    pub fn from_id(id: &str) -> Result<Self, AppError> {
        if id == "0" {
            return Ok(ObjectPath::root());
        }
        if !id.starts_with('/') {
            return Err(AppError::BadRequest(format!("object id is not rooted: {id}")));
        }
        Ok(normalize(id))
    }

    /// Inverse of [`from_id`](Self::from_id).
    pub fn as_id(&self) -> String {
        if self.is_root() {
            "0".to_string()
        } else {
            self.0.clone()
        }
    }

    /// `root` + this object's filesystem-relative path = `fs_path`.
    pub fn from_path(root: &Path, fs_path: &Path) -> Result<Self, AppError> {
        let relative = fs_path
            .strip_prefix(root)
            .map_err(|_| AppError::BadRequest("path escapes media root".into()))?;
        if relative.as_os_str().is_empty() {
            return Ok(ObjectPath::root());
        }
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                std::path::Component::Normal(seg) => {
                    segments.push(seg.to_string_lossy().into_owned());
                }
                _ => return Err(AppError::BadRequest("unsupported path component".into())),
            }
        }
        Ok(ObjectPath(format!("/{}", segments.join("/"))))
    }

    /// Resolve this object path under `root`, rejecting anything that
    /// canonicalizes outside it (the `..`-escape guard).
    pub fn as_path(&self, root: &Path) -> Result<PathBuf, AppError> {
        let mut candidate = root.to_path_buf();
        for segment in self.0.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." || segment == "." {
                return Err(AppError::BadRequest("path traversal rejected".into()));
            }
            candidate.push(segment);
        }

        let canonical_root = root
            .canonicalize()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("media root unreadable: {e}")))?;
        let canonical_candidate = candidate.canonicalize().map_err(|_| AppError::NotFound)?;

        if !canonical_candidate.starts_with(&canonical_root) {
            return Err(AppError::BadRequest("path escapes media root".into()));
        }
        Ok(canonical_candidate)
    }
}

fn normalize(raw: &str) -> ObjectPath {
    let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        ObjectPath::root()
    } else {
        ObjectPath(format!("/{}", segments.join("/")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_round_trips_through_id() {
        let root = ObjectPath::root();
        assert_eq!(root.as_id(), "0");
        assert_eq!(ObjectPath::from_id("0").unwrap(), root);
    }

    #[test]
    fn nested_id_round_trips() {
        let p = ObjectPath::from_id("/movies/a.mp4").unwrap();
        assert_eq!(p.as_id(), "/movies/a.mp4");
    }

    #[test]
    fn from_path_and_as_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("movies")).unwrap();
        std::fs::write(dir.path().join("movies/a.mp4"), b"x").unwrap();

        let fs_path = dir.path().join("movies/a.mp4");
        let obj = ObjectPath::from_path(dir.path(), &fs_path).unwrap();
        assert_eq!(obj.as_str(), "/movies/a.mp4");

        let resolved = obj.as_path(dir.path()).unwrap();
        assert_eq!(resolved.canonicalize().unwrap(), fs_path.canonicalize().unwrap());
    }

    #[test]
    fn as_path_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let escaping = ObjectPath::from_id("/../etc/passwd").unwrap();
        assert!(escaping.as_path(dir.path()).is_err());
    }

    #[test]
    fn uri_round_trip_percent_encodes_segments() {
        let p = ObjectPath::from_uri("/media/My%20Movie.mp4").unwrap();
        assert_eq!(p.as_str(), "/media/My Movie.mp4");
        assert_eq!(p.as_uri("http://host:80"), "http://host:80/media/My%20Movie.mp4");
    }
}
