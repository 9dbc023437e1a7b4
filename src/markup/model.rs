use crate::foundation::core::{BezPath, Canvas, Point, Rect};

/// Panel geometry in normalized layout space (`0..=100` on both axes).
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub enum PanelShape {
    /// Axis-aligned rectangle.
    Rect(Rect),
    /// Polygon vertices in input order. Never empty.
    Polygon(Vec<Point>),
}

impl PanelShape {
    /// Bounding box in layout space.
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Rect(r) => *r,
            Self::Polygon(points) => {
                let mut it = points.iter();
                let Some(first) = it.next() else {
                    return Rect::ZERO;
                };
                it.fold(Rect::from_points(*first, *first), |acc, p| acc.union_pt(*p))
            }
        }
    }

    /// Closed outline in canvas space.
    ///
    /// Rectangles start at their top-left corner and run clockwise. Polygons visit every vertex
    /// in input order and close back to the first one.
    pub fn canvas_path(&self, canvas: Canvas) -> BezPath {
        let mut path = BezPath::new();
        match self {
            Self::Rect(r) => {
                let r = canvas.rect(*r);
                path.move_to((r.x0, r.y0));
                path.line_to((r.x1, r.y0));
                path.line_to((r.x1, r.y1));
                path.line_to((r.x0, r.y1));
            }
            Self::Polygon(points) => {
                for (i, p) in points.iter().enumerate() {
                    let p = canvas.point(*p);
                    if i == 0 {
                        path.move_to(p);
                    } else {
                        path.line_to(p);
                    }
                }
            }
        }
        path.close_path();
        path
    }
}

/// Image element found inside a panel group.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ImageRef {
    /// Raw reference string exactly as written in the markup.
    pub href: String,
    /// Placement box in layout space. `None` when the element's box attributes are missing or
    /// malformed.
    pub frame: Option<Rect>,
}

/// Numeric panel label.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PanelLabel {
    /// Label digits.
    pub text: String,
    /// Text anchor (baseline start) in layout space.
    pub anchor: Point,
}

/// One panel extracted from the layout markup. Immutable once extracted.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PanelDescriptor {
    /// 0-based position in document order (also the content-pass z-order).
    pub index: usize,
    /// Clip/border geometry. `None` when the group only carried an image or a label.
    pub shape: Option<PanelShape>,
    /// Linked image, if any.
    pub image: Option<ImageRef>,
    /// Panel-number label, if any.
    pub label: Option<PanelLabel>,
}

impl PanelDescriptor {
    /// 1-based panel number used in human-facing text.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// Box the image is fitted into: the image element's own box, else the shape bounds.
    pub fn image_box(&self) -> Option<Rect> {
        let image = self.image.as_ref()?;
        image
            .frame
            .or_else(|| self.shape.as_ref().map(PanelShape::bounds))
    }
}
