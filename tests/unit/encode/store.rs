use std::io::Read as _;

use super::*;
use crate::foundation::core::Rgba8;

fn temp_dir(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "panelpress_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

#[test]
fn stems_are_sanitized() {
    assert_eq!(sanitize_stem("My Comic: Page 1!"), "my-comic-page-1");
    assert_eq!(sanitize_stem("  --  "), "");
    assert_eq!(sanitize_stem("Ünïcode"), "n-code");
    assert!(sanitize_stem(&"x".repeat(100)).len() <= 40);
}

#[test]
fn names_are_validated() {
    assert!(validate_name("comic-1-2.png").is_ok());
    for bad in ["", ".png", "../x.png", "a/b.png", "a\\b.png", "x.jpg", "x..png"] {
        assert!(
            matches!(validate_name(bad), Err(PressError::Input(_))),
            "accepted {bad:?}"
        );
    }
}

#[test]
fn persist_then_open_round_trips() {
    let dir = temp_dir("store_roundtrip");
    let store = OutputStore::new(&dir).unwrap();
    let surface = RasterSurface::filled(4, 3, Rgba8::rgb(10, 20, 30));

    let out = store.persist(&surface, Some("Space Cats")).unwrap();
    assert_eq!(store.dir(), dir.as_path());
    assert!(out.name.starts_with("space-cats-"));
    assert!(out.name.ends_with(".png"));
    assert_eq!(out.path, dir.join(&out.name));
    validate_name(&out.name).unwrap();

    let mut bytes = Vec::new();
    store.open(&out.name).unwrap().read_to_end(&mut bytes).unwrap();
    let img = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (4, 3));
    assert_eq!(img.get_pixel(3, 2).0, [10, 20, 30, 255]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn names_are_unique_and_default_to_comic() {
    let dir = temp_dir("store_names");
    let store = OutputStore::new(&dir).unwrap();
    let surface = RasterSurface::filled(1, 1, Rgba8::rgb(0, 0, 0));

    let a = store.persist(&surface, None).unwrap();
    let b = store.persist(&surface, Some("???")).unwrap();
    assert!(a.name.starts_with("comic-"));
    assert!(b.name.starts_with("comic-"));
    assert_ne!(a.name, b.name);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn open_rejects_bad_and_missing_names() {
    let dir = temp_dir("store_open");
    let store = OutputStore::new(&dir).unwrap();
    assert!(matches!(store.open("../etc.png"), Err(PressError::Input(_))));
    assert!(matches!(store.open("nope.png"), Err(PressError::Other(_))));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn stores_sharing_a_directory_never_overwrite_each_other() {
    let dir = temp_dir("store_shared");
    let a = OutputStore::new(&dir).unwrap();
    let b = OutputStore::new(&dir).unwrap();
    let small = RasterSurface::filled(1, 1, Rgba8::rgb(255, 0, 0));
    let large = RasterSurface::filled(2, 2, Rgba8::rgb(0, 0, 255));

    let mut names = std::collections::HashSet::new();
    let mut from_a = Vec::new();
    for _ in 0..50 {
        let ra = a.persist(&small, Some("page")).unwrap();
        let rb = b.persist(&large, Some("page")).unwrap();
        assert!(names.insert(ra.name.clone()));
        assert!(names.insert(rb.name.clone()));
        from_a.push(ra);
    }

    for r in &from_a {
        let img = image::open(&r.path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (1, 1), "{} was replaced", r.name);
    }
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 100);

    let _ = std::fs::remove_dir_all(&dir);
}
