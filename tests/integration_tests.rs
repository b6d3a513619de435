use std::path::PathBuf;

use dlnasrv::config::RootParentIdMode;
use dlnasrv::didl::{BrowseMode, DidlObject};
use dlnasrv::templates::{self, TemplateBundle};

fn templates_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates")
}

fn make_media_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("movies")).unwrap();
    std::fs::write(dir.path().join("movies/a.mp4"), b"movie-bytes").unwrap();
    std::fs::write(dir.path().join("movies/notes.txt"), b"not media").unwrap();
    std::fs::create_dir_all(dir.path().join("movies/extras")).unwrap();
    std::fs::write(dir.path().join("movies/extras/b.mkv"), b"extra-bytes").unwrap();
    std::fs::write(dir.path().join("song.mp3"), b"song-bytes").unwrap();
    dir
}

#[test]
fn template_bundle_loads_every_named_document() {
    let bundle = TemplateBundle::load(&templates_dir()).expect("bundle should load from the real templates dir");
    let rendered = bundle
        .render(templates::DEVICE_DESCRIPTION, &[("friendlyName", "Living Room"), ("UDN", "uuid:abc")])
        .unwrap();
    assert!(rendered.contains("Living Room"));
    assert!(rendered.contains("uuid:abc"));
}

#[tokio::test]
async fn browse_lists_only_immediate_children_and_filters_non_media() {
    let dir = make_media_tree();
    let root = DidlObject::new(dir.path(), "http://host:80", "0", BrowseMode::Browse).await.unwrap();
    let children = root.children().await.unwrap();

    let names: Vec<String> = children.iter().map(|c| c.id()).collect();
    assert!(names.contains(&"/movies".to_string()));
    assert!(names.contains(&"/song.mp3".to_string()));
    assert!(!names.iter().any(|n| n.ends_with("notes.txt")));
    assert_eq!(children.len(), 2);
}

#[tokio::test]
async fn search_recurses_into_subdirectories() {
    let dir = make_media_tree();
    let root = DidlObject::new(dir.path(), "http://host:80", "0", BrowseMode::Search).await.unwrap();
    let children = root.children().await.unwrap();

    let names: Vec<String> = children.iter().map(|c| c.id()).collect();
    assert!(names.contains(&"/movies/extras/b.mkv".to_string()));
    assert!(names.contains(&"/movies/a.mp4".to_string()));
}

#[tokio::test]
async fn item_element_carries_a_res_with_protocol_info() {
    let dir = make_media_tree();
    let obj = DidlObject::new(dir.path(), "http://host:80", "/song.mp3", BrowseMode::Browse).await.unwrap();
    let element = obj.element(RootParentIdMode::MinusOne).unwrap();
    let serialized = dlnasrv::xml::serialize(&element).unwrap();
    assert!(serialized.contains("protocolInfo"));
    assert!(serialized.contains("audio/mpeg"));
    assert!(serialized.contains("http://host:80/media/song.mp3"));
}

#[tokio::test]
async fn root_container_reports_configured_parent_id() {
    let dir = make_media_tree();
    let obj = DidlObject::new(dir.path(), "http://host:80", "0", BrowseMode::Browse).await.unwrap();
    let element = obj.element(RootParentIdMode::Zero).unwrap();
    let serialized = dlnasrv::xml::serialize(&element).unwrap();
    assert!(serialized.contains("parentID=\"0\""));
}
