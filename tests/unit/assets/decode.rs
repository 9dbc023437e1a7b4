use std::io::Cursor;

use base64::Engine as _;

use super::*;

fn png_bytes(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn decode_image_png_dimensions_and_premul() {
    let buf = png_bytes(1, 1, [100, 50, 200, 128]);

    let prepared = decode_image(&buf).unwrap();
    assert_eq!(prepared.width, 1);
    assert_eq!(prepared.height, 1);
    assert_eq!(
        prepared.rgba8_premul.as_slice(),
        &[
            ((100u16 * 128 + 127) / 255) as u8,
            ((50u16 * 128 + 127) / 255) as u8,
            ((200u16 * 128 + 127) / 255) as u8,
            128u8
        ]
    );
}

#[test]
fn decode_image_reports_aspect() {
    let prepared = decode_image(&png_bytes(4, 2, [0, 0, 0, 255])).unwrap();
    assert_eq!(prepared.aspect(), 2.0);
}

#[test]
fn decode_image_rejects_garbage() {
    assert!(decode_image(b"<html>not found</html>").is_err());
}

#[test]
fn data_url_detection_is_case_insensitive() {
    assert!(is_data_url("data:image/png;base64,AAAA"));
    assert!(is_data_url("DATA:,x"));
    assert!(!is_data_url("dat"));
    assert!(!is_data_url("https://example.com/data:x"));
}

#[test]
fn data_url_base64_round_trips_png() {
    let png = png_bytes(2, 3, [1, 2, 3, 255]);
    let b64 = base64::engine::general_purpose::STANDARD.encode(&png);
    let url = format!("data:image/png;base64,{b64}");
    assert_eq!(decode_data_url(&url).unwrap(), png);
    assert_eq!(decode_image(&decode_data_url(&url).unwrap()).unwrap().height, 3);
}

#[test]
fn data_url_percent_payload() {
    assert_eq!(decode_data_url("data:text/plain,a%20b").unwrap(), b"a b");
}

#[test]
fn data_url_errors() {
    assert!(decode_data_url("data:image/png;base64").is_err());
    assert!(decode_data_url("data:image/png;base64,!!!").is_err());
    assert!(decode_data_url("http://x").is_err());
}
