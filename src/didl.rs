//! Filesystem-backed DIDL-Lite object model (component C4).

use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::objectpath::ObjectPath;
use crate::xml::{self, Content, XmlElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseMode {
    Browse,
    Search,
}

/// MIME classification table, extension-based: no crate in this codebase's
/// corpus binds to `libmagic`, so the "MIME-derived UPnP class" requirement
/// is satisfied off the file extension, same as the teacher's media scanner.
const MIME_TABLE: &[(&str, &str, &str)] = &[
    ("mp4", "video/mp4", "video"),
    ("m4v", "video/x-m4v", "video"),
    ("mkv", "video/x-matroska", "video"),
    ("avi", "video/x-msvideo", "video"),
    ("mov", "video/quicktime", "video"),
    ("webm", "video/webm", "video"),
    ("wmv", "video/x-ms-wmv", "video"),
    ("mpg", "video/mpeg", "video"),
    ("mpeg", "video/mpeg", "video"),
    ("ts", "video/mp2t", "video"),
    ("mp3", "audio/mpeg", "audio"),
    ("flac", "audio/flac", "audio"),
    ("wav", "audio/wav", "audio"),
    ("ogg", "audio/ogg", "audio"),
    ("m4a", "audio/mp4", "audio"),
    ("aac", "audio/aac", "audio"),
    ("wma", "audio/x-ms-wma", "audio"),
    ("jpg", "image/jpeg", "image"),
    ("jpeg", "image/jpeg", "image"),
    ("png", "image/png", "image"),
    ("gif", "image/gif", "image"),
    ("bmp", "image/bmp", "image"),
    ("webp", "image/webp", "image"),
    ("tiff", "image/tiff", "image"),
];

/// Returns `(full_mime, major_class)` for a file extension, if it's a class
/// this server streams. `None` means the file is filtered out of every listing.
pub fn mime_class(path: &Path) -> Option<(&'static str, &'static str)> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    MIME_TABLE
        .iter()
        .find(|(e, _, _)| *e == ext)
        .map(|(_, mime, class)| (*mime, *class))
}

fn upnp_item_class(major_class: &str) -> String {
    format!("object.item.{major_class}Item")
}

/// A single DIDL-Lite node, rooted at `root` and resolved from `id`.
pub struct DidlObject {
    root: PathBuf,
    base_url: String,
    path: ObjectPath,
    fs_path: PathBuf,
    is_dir: bool,
    mime: Option<(&'static str, &'static str)>,
    modified_epoch: i64,
    mode: BrowseMode,
}

impl DidlObject {
    pub async fn new(
        root: &Path,
        base_url: &str,
        id: &str,
        mode: BrowseMode,
    ) -> Result<Self, AppError> {
        let path = ObjectPath::from_id(id)?;
        let fs_path = path.as_path(root)?;
        let metadata = tokio::fs::metadata(&fs_path).await?;

        let is_dir = metadata.is_dir();
        let mime = if is_dir { None } else { mime_class(&fs_path) };
        if !is_dir && mime.is_none() {
            return Err(AppError::BadRequest(format!("object is not a playable media file: {id}")));
        }

        let modified_epoch = if path.is_root() {
            now_epoch_seconds()
        } else {
            mtime_epoch_seconds(&metadata)
        };

        Ok(DidlObject {
            root: root.to_path_buf(),
            base_url: base_url.to_string(),
            path,
            fs_path,
            is_dir,
            mime,
            modified_epoch,
            mode,
        })
    }

    pub fn id(&self) -> String {
        self.path.as_id()
    }

    pub fn update(&self) -> i64 {
        self.modified_epoch
    }

    pub fn location(&self) -> String {
        format!("{}/media{}", self.base_url.trim_end_matches('/'), self.path.as_str())
    }

    fn title(&self) -> String {
        if self.path.is_root() {
            "root".to_string()
        } else {
            self.path.basename().to_string()
        }
    }

    fn parent_id(&self, parent_mode: crate::config::RootParentIdMode) -> String {
        match self.fs_path.parent() {
            None => String::new(),
            Some(parent) => match ObjectPath::from_path(&self.root, parent) {
                Ok(p) if p.is_root() => parent_mode.root_parent_id(),
                Ok(p) => p.as_id(),
                Err(_) => parent_mode.root_parent_id(),
            },
        }
    }

    /// Build this object's DIDL-Lite XML element (container or item).
    pub fn element(&self, parent_mode: crate::config::RootParentIdMode) -> Result<XmlElement, AppError> {
        let id = self.id();
        let parent_id = if self.path.is_root() {
            parent_mode.root_parent_id()
        } else {
            self.parent_id(parent_mode)
        };
        let title = xml::build("dc:title", [Content::Text(self.title())], &[])?;

        if self.is_dir {
            let class = xml::build("upnp:class", [Content::Text("object.container".into())], &[])?;
            return Ok(xml::build(
                "dlna:container",
                [Content::Child(class), Content::Child(title)],
                &[("id", id.as_str()), ("parentID", parent_id.as_str())],
            )?);
        }

        let (mime, major_class) = self.mime.expect("non-directory DidlObject always has a mime class");
        let item_class = upnp_item_class(major_class);
        let class = xml::build("upnp:class", [Content::Text(item_class)], &[])?;
        let protocol_info = format!("http-get:*:{mime}:DLNA.ORG_OP=01");
        let res = xml::build(
            "dlna:res",
            [Content::Text(self.location())],
            &[("protocolInfo", protocol_info.as_str())],
        )?;
        Ok(xml::build(
            "dlna:item",
            [Content::Child(class), Content::Child(title), Content::Child(res)],
            &[("id", id.as_str()), ("parentID", parent_id.as_str())],
        )?)
    }

    /// Enumerate children: the immediate directory for `Browse`, the full
    /// recursive tree for `Search`. Filtered to directories and playable
    /// media, as the DIDL-filter property requires.
    pub async fn children(&self) -> Result<Vec<DidlObject>, AppError> {
        if !self.is_dir {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        self.collect_children(&self.fs_path, &mut out).await?;
        Ok(out)
    }

    async fn collect_children(&self, dir: &Path, out: &mut Vec<DidlObject>) -> Result<(), AppError> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let fs_path = entry.path();
            let metadata = entry.metadata().await?;
            let is_dir = metadata.is_dir();
            let mime = if is_dir { None } else { mime_class(&fs_path) };
            if !is_dir && mime.is_none() {
                continue;
            }

            let path = ObjectPath::from_path(&self.root, &fs_path)?;
            let modified_epoch = mtime_epoch_seconds(&metadata);
            out.push(DidlObject {
                root: self.root.clone(),
                base_url: self.base_url.clone(),
                path,
                fs_path: fs_path.clone(),
                is_dir,
                mime,
                modified_epoch,
                mode: self.mode,
            });

            if is_dir && self.mode == BrowseMode::Search {
                Box::pin(self.collect_children(&fs_path, out)).await?;
            }
        }
        Ok(())
    }
}

fn mtime_epoch_seconds(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn now_epoch_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
