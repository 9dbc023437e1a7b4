use super::*;

#[test]
fn canvas_square_validates_bounds() {
    assert!(Canvas::square(0).is_err());
    assert!(Canvas::square(70_000).is_err());
    assert!(matches!(
        Canvas::square(MAX_CANVAS_SIDE + 1),
        Err(PressError::Input(_))
    ));
    assert!(matches!(Canvas::square(60_000), Err(PressError::Input(_))));
    assert_eq!(Canvas::square(MAX_CANVAS_SIDE).unwrap().width, MAX_CANVAS_SIDE);
    let c = Canvas::square(2000).unwrap();
    assert_eq!((c.width, c.height), (2000, 2000));
    assert_eq!(c.pixel_count(), 4_000_000);
}

#[test]
fn percent_coordinates_scale_to_canvas() {
    let c = Canvas::square(2000).unwrap();
    assert_eq!(c.x(0.0), 0.0);
    assert_eq!(c.x(100.0), 2000.0);
    assert_eq!(c.y(12.5), 250.0);
    assert_eq!(c.point(Point::new(50.0, 25.0)), Point::new(1000.0, 500.0));
}

#[test]
fn rect_transform_matches_box_formula() {
    let c = Canvas::square(2000).unwrap();
    let r = c.rect(Rect::new(10.0, 20.0, 40.0, 70.0));
    assert_eq!(r, Rect::new(200.0, 400.0, 800.0, 1400.0));
    assert_eq!(r.width(), 600.0);
    assert_eq!(r.height(), 1000.0);
}

#[test]
fn premultiply_and_hex() {
    assert_eq!(Rgba8::rgb(10, 20, 30).premultiplied(), [10, 20, 30, 255]);
    assert_eq!(
        Rgba8::from_array([200, 100, 0, 0]).premultiplied(),
        [0, 0, 0, 0]
    );
    assert_eq!(Rgba8::rgb(255, 0, 16).to_hex_rgb(), "#ff0010");
}
