use super::*;

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

fn surface() -> RasterSurface {
    // Opaque red, then half-transparent blue (premultiplied).
    RasterSurface::from_premul_bytes(2, 1, vec![255, 0, 0, 255, 0, 0, 128, 128]).unwrap()
}

#[test]
fn encodes_straight_alpha_png() {
    let mut buf = Vec::new();
    encode_png(&surface(), &mut buf).unwrap();
    assert_eq!(&buf[..8], b"\x89PNG\r\n\x1a\n");

    let decoded = image::load_from_memory(&buf).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (2, 1));
    assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 255]);
    assert_eq!(decoded.get_pixel(1, 0).0, [0, 0, 255, 128]);
}

#[test]
fn file_write_replaces_part_file() {
    let dir = temp_dir("png_write");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("out.png");

    write_png_file(&surface(), &path).unwrap();
    assert!(path.exists());
    assert!(!dir.join("out.png.part").exists());
    let decoded = image::open(&path).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (2, 1));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn file_write_into_missing_directory_is_an_encode_error() {
    let dir = temp_dir("png_missing");
    let err = write_png_file(&surface(), &dir.join("out.png")).unwrap_err();
    assert!(matches!(err, PressError::Encode(_)));
}

#[test]
fn exclusive_write_never_replaces_an_existing_file() {
    let dir = temp_dir("png_exclusive");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("out.png");

    assert!(write_png_file_new(&surface(), &path).unwrap());
    let other = RasterSurface::from_premul_bytes(1, 1, vec![0, 255, 0, 255]).unwrap();
    assert!(!write_png_file_new(&other, &path).unwrap());

    let decoded = image::open(&path).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (2, 1));
    assert!(!dir.join("out.png.part").exists());

    let _ = std::fs::remove_dir_all(&dir);
}
