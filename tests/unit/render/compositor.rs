use std::io::Cursor;

use super::*;
use crate::assets::fetch::InMemoryFetcher;
use crate::markup::model::{ImageRef, PanelShape};

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];

fn png_bytes(rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(1, 1, image::Rgba(rgba));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn opts() -> CompositorOpts {
    CompositorOpts {
        canvas: Canvas::square(200).unwrap(),
        ..CompositorOpts::default()
    }
}

fn rect_panel(index: usize, r: (f64, f64, f64, f64), href: Option<&str>) -> PanelDescriptor {
    let rect = Rect::new(r.0, r.1, r.0 + r.2, r.1 + r.3);
    PanelDescriptor {
        index,
        shape: Some(PanelShape::Rect(rect)),
        image: href.map(|h| ImageRef {
            href: h.to_string(),
            frame: Some(rect),
        }),
        label: None,
    }
}

fn resolver(fetcher: InMemoryFetcher) -> ImageResolver {
    ImageResolver::new(Arc::new(fetcher), Vec::new(), "http://h")
}

fn assert_close(px: Option<[u8; 4]>, want: [u8; 4]) {
    let px = px.unwrap();
    for c in 0..4 {
        assert!(
            px[c].abs_diff(want[c]) <= 3,
            "pixel {px:?} differs from {want:?}"
        );
    }
}

#[test]
fn rect_panel_clips_cover_overflow() {
    let r = resolver(InMemoryFetcher::new().with_body("http://h/red.png", png_bytes(RED)));
    let panels = vec![rect_panel(0, (10.0, 10.0, 40.0, 20.0), Some("/red.png"))];

    let compositor = Compositor::new(opts());
    assert_eq!(compositor.opts().canvas, Canvas::square(200).unwrap());
    let out = compositor.composite(&panels, &r).unwrap();
    assert_eq!(out.surface.width, 200);
    assert_eq!(out.outcomes[0].status, PanelStatus::Drawn);

    // Box is (20,20)-(100,60); a square image covers it and overflows vertically.
    assert_close(out.surface.pixel(60, 40), RED);
    assert_close(out.surface.pixel(60, 10), [255, 255, 255, 255]);
    assert_close(out.surface.pixel(60, 70), [255, 255, 255, 255]);
}

#[test]
fn shapeless_panel_draws_unclipped() {
    let r = resolver(InMemoryFetcher::new().with_body("http://h/red.png", png_bytes(RED)));
    let frame = Rect::new(10.0, 10.0, 50.0, 30.0);
    let panels = vec![PanelDescriptor {
        index: 0,
        shape: None,
        image: Some(ImageRef {
            href: "/red.png".to_string(),
            frame: Some(frame),
        }),
        label: None,
    }];

    let out = Compositor::new(opts()).composite(&panels, &r).unwrap();
    assert_eq!(out.outcomes[0].status, PanelStatus::Drawn);
    assert_close(out.surface.pixel(60, 10), RED);
}

#[test]
fn borders_sit_above_later_panel_fills() {
    let r = resolver(
        InMemoryFetcher::new()
            .with_body("http://h/a.png", png_bytes(BLUE))
            .with_body("http://h/b.png", png_bytes(GREEN)),
    );
    let panels = vec![
        rect_panel(0, (10.0, 10.0, 40.0, 40.0), Some("/a.png")),
        rect_panel(1, (30.0, 30.0, 40.0, 40.0), Some("/b.png")),
    ];

    let out = Compositor::new(opts()).composite(&panels, &r).unwrap();
    let s = &out.surface;

    // A's right and bottom edges run through B's fill.
    assert_close(s.pixel(100, 80), [0, 0, 0, 255]);
    assert_close(s.pixel(80, 100), [0, 0, 0, 255]);
    assert_close(s.pixel(80, 50), BLUE);
    assert_close(s.pixel(120, 80), GREEN);
    assert_close(s.pixel(90, 90), GREEN);
}

#[test]
fn failed_image_degrades_to_placeholder_only_for_that_panel() {
    let r = resolver(
        InMemoryFetcher::new()
            .with_body("http://h/1.png", png_bytes(RED))
            .with_body("http://h/3.png", png_bytes(BLUE)),
    );
    let panels = vec![
        rect_panel(0, (0.0, 0.0, 30.0, 30.0), Some("/1.png")),
        rect_panel(1, (35.0, 0.0, 30.0, 30.0), Some("/2.png")),
        rect_panel(2, (70.0, 0.0, 30.0, 30.0), Some("/3.png")),
    ];

    let out = Compositor::new(opts()).composite(&panels, &r).unwrap();
    assert_eq!(out.outcomes.len(), 3);
    assert_eq!(out.outcomes[0].status, PanelStatus::Drawn);
    assert!(matches!(
        &out.outcomes[1].status,
        PanelStatus::Placeholder { error: ImageError::Fetch { reason, .. } } if reason == "HTTP 404"
    ));
    assert_eq!(out.outcomes[1].index, 1);
    assert_eq!(out.outcomes[2].status, PanelStatus::Drawn);

    assert_close(out.surface.pixel(30, 15), RED);
    assert_close(out.surface.pixel(80, 7), [0xe0, 0xe0, 0xe0, 255]);
    assert_close(out.surface.pixel(170, 15), BLUE);
}

#[test]
fn missing_image_and_missing_box_are_reported() {
    let r = resolver(InMemoryFetcher::new());
    let panels = vec![
        rect_panel(0, (0.0, 0.0, 50.0, 50.0), None),
        PanelDescriptor {
            index: 1,
            shape: None,
            image: Some(ImageRef {
                href: "/x.png".to_string(),
                frame: None,
            }),
            label: None,
        },
    ];

    let out = Compositor::new(opts()).composite(&panels, &r).unwrap();
    assert_eq!(out.outcomes[0].status, PanelStatus::NoImage);
    assert!(matches!(
        out.outcomes[1].status,
        PanelStatus::ExtractionGap { .. }
    ));
    assert_eq!(r.stats().lookups, 0);
    assert_close(out.surface.pixel(50, 50), [255, 255, 255, 255]);
    assert_close(out.surface.pixel(100, 50), [0, 0, 0, 255]);
}

#[test]
fn shared_image_key_is_fetched_once() {
    let fetcher = Arc::new(InMemoryFetcher::new().with_body("http://h/p.png", png_bytes(RED)));
    let r = ImageResolver::new(fetcher.clone(), Vec::new(), "http://h");
    let panels = vec![
        rect_panel(0, (0.0, 0.0, 40.0, 40.0), Some("/p.png")),
        rect_panel(1, (50.0, 0.0, 40.0, 40.0), Some("p.png")),
    ];

    Compositor::new(opts()).composite(&panels, &r).unwrap();
    assert_eq!(fetcher.requests("http://h/p.png"), 1);
    assert_eq!(r.stats().hits, 1);
}
