use crate::{
    foundation::core::{Point, Rect},
    foundation::error::{PressError, PressResult},
    markup::model::{ImageRef, PanelDescriptor, PanelLabel, PanelShape},
};

/// Element name of a panel group.
const GROUP_TAG: &str = "g";

/// Extract panel descriptors from layout markup (an SVG document).
///
/// Every `<g>` element is a panel candidate, visited in document order. Only the group's
/// direct children are inspected, and at most one of each recognized element is used:
///
/// - `<rect x y width height>`
/// - `<polygon points>`
/// - `<image x y width height href>` (`xlink:href` is accepted too)
/// - `<text x y>` whose content is a non-negative integer
///
/// Missing or malformed attributes leave the corresponding field empty. Groups with none of the
/// recognized children are skipped, and a group whose only shape is a polygon without usable
/// vertices is dropped.
///
/// Groups are not treated as containers of sub-panels: a group nested inside another group is
/// a separate candidate and the outer group only sees its own direct children.
pub fn extract_panels(markup: &str) -> PressResult<Vec<PanelDescriptor>> {
    if markup.trim().is_empty() {
        return Err(PressError::input("markup is required"));
    }

    let opts = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = roxmltree::Document::parse_with_options(markup, opts)
        .map_err(|e| PressError::input(format!("markup is not well-formed: {e}")))?;

    let mut panels = Vec::new();
    for group in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == GROUP_TAG)
    {
        if let Some(panel) = extract_group(group, panels.len()) {
            panels.push(panel);
        }
    }

    tracing::debug!(panels = panels.len(), "extracted panels");
    Ok(panels)
}

fn extract_group(group: roxmltree::Node<'_, '_>, index: usize) -> Option<PanelDescriptor> {
    let mut rect_el = None;
    let mut polygon_el = None;
    let mut image_el = None;
    let mut label = None;

    for child in group.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "rect" if rect_el.is_none() => rect_el = Some(child),
            "polygon" if polygon_el.is_none() => polygon_el = Some(child),
            "image" if image_el.is_none() => image_el = Some(child),
            "text" if label.is_none() => label = numeric_label(child),
            _ => {}
        }
    }

    if rect_el.is_none() && polygon_el.is_none() && image_el.is_none() && label.is_none() {
        return None;
    }

    let polygon = polygon_el.and_then(|el| el.attribute("points").and_then(parse_points));
    let rect = rect_el.and_then(element_box);
    if polygon_el.is_some() && polygon.is_none() && rect.is_none() {
        return None;
    }

    let shape = match (polygon, rect) {
        (Some(points), _) => Some(PanelShape::Polygon(points)),
        (None, Some(r)) => Some(PanelShape::Rect(r)),
        (None, None) => None,
    };

    let image = image_el.and_then(|el| {
        let href = el
            .attributes()
            .find(|a| a.name() == "href")
            .map(|a| a.value().trim())
            .filter(|v| !v.is_empty())?;
        Some(ImageRef {
            href: href.to_string(),
            frame: element_box(el),
        })
    });

    Some(PanelDescriptor {
        index,
        shape,
        image,
        label,
    })
}

/// Read `x`, `y`, `width`, `height` into a layout-space rectangle.
fn element_box(el: roxmltree::Node<'_, '_>) -> Option<Rect> {
    let x = el.attribute("x").and_then(parse_number)?;
    let y = el.attribute("y").and_then(parse_number)?;
    let w = el.attribute("width").and_then(parse_number)?;
    let h = el.attribute("height").and_then(parse_number)?;
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    Some(Rect::new(x, y, x + w, y + h))
}

fn numeric_label(el: roxmltree::Node<'_, '_>) -> Option<PanelLabel> {
    let text: String = el
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let text = text.trim();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let x = el.attribute("x").and_then(parse_number)?;
    let y = el.attribute("y").and_then(parse_number)?;
    Some(PanelLabel {
        text: text.to_string(),
        anchor: Point::new(x, y),
    })
}

/// Parse a single coordinate. Accepts an optional trailing `%` or `px`.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let s = s
        .strip_suffix('%')
        .or_else(|| s.strip_suffix("px"))
        .unwrap_or(s)
        .trim_end();
    let v = s.parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

/// Parse polygon `points` (`x,y x,y ...`). Any malformed coordinate invalidates the list.
pub(crate) fn parse_points(raw: &str) -> Option<Vec<Point>> {
    let coords = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(parse_number)
        .collect::<Option<Vec<f64>>>()?;
    if coords.is_empty() || coords.len() % 2 != 0 {
        return None;
    }
    Some(
        coords
            .chunks_exact(2)
            .map(|xy| Point::new(xy[0], xy[1]))
            .collect(),
    )
}

#[cfg(test)]
#[path = "../../tests/unit/markup/extract.rs"]
mod tests;
