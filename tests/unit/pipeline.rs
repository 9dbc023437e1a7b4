use std::collections::HashMap;

use super::*;
use crate::assets::resolve::ImageError;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |k: &str| map.get(k).cloned()
}

#[test]
fn defaults_match_the_documented_policy() {
    let opts = ConvertOpts::default();
    assert_eq!(opts.canvas_size, 2000);
    assert_eq!(opts.default_base_url, "http://localhost:3000");
    assert_eq!(opts.fetch_timeout, Duration::from_secs(10));
    assert_eq!(opts.max_redirects, 5);
    assert!(!opts.parallel_fetch);
    assert_eq!(opts.fetch_threads, None);
}

#[test]
fn env_overrides_apply_when_valid() {
    let opts = ConvertOpts::from_lookup(lookup(&[
        ("PANELPRESS_CANVAS_SIZE", "512"),
        ("PANELPRESS_BASE_URL", " https://comics.example "),
        ("PANELPRESS_FETCH_TIMEOUT_MS", "2500"),
        ("PANELPRESS_MAX_REDIRECTS", "0"),
        ("PANELPRESS_PARALLEL_FETCH", "TRUE"),
        ("PANELPRESS_FETCH_THREADS", "3"),
    ]));
    assert_eq!(opts.canvas_size, 512);
    assert_eq!(opts.default_base_url, "https://comics.example");
    assert_eq!(opts.fetch_timeout, Duration::from_millis(2500));
    assert_eq!(opts.max_redirects, 0);
    assert!(opts.parallel_fetch);
    assert_eq!(opts.fetch_threads, Some(3));
}

#[test]
fn invalid_env_values_are_ignored() {
    let opts = ConvertOpts::from_lookup(lookup(&[
        ("PANELPRESS_CANVAS_SIZE", "0"),
        ("PANELPRESS_BASE_URL", "   "),
        ("PANELPRESS_FETCH_TIMEOUT_MS", "soon"),
        ("PANELPRESS_MAX_REDIRECTS", "-1"),
        ("PANELPRESS_PARALLEL_FETCH", "maybe"),
        ("PANELPRESS_FETCH_THREADS", "0"),
    ]));
    assert_eq!(opts, ConvertOpts::default());
}

#[test]
fn compositor_opts_validate_sizes() {
    let c = ConvertOpts::default().compositor_opts().unwrap();
    assert_eq!(c.canvas, Canvas::square(2000).unwrap());
    assert_eq!(c.border_width_px, 6.0);

    let bad_canvas = ConvertOpts {
        canvas_size: 0,
        ..ConvertOpts::default()
    };
    assert!(matches!(bad_canvas.compositor_opts(), Err(PressError::Input(_))));

    let bad_border = ConvertOpts {
        border_width_px: f64::NAN,
        ..ConvertOpts::default()
    };
    assert!(matches!(bad_border.compositor_opts(), Err(PressError::Input(_))));
}

#[test]
fn only_degraded_panels_become_diagnostics() {
    let outcome = |index, status| PanelOutcome { index, status };
    let err = ImageError::Fetch {
        url: "http://h/2.png".to_string(),
        reason: "HTTP 404".to_string(),
    };

    assert!(PanelDiagnostic::from_outcome(&outcome(0, PanelStatus::Drawn)).is_none());
    assert!(PanelDiagnostic::from_outcome(&outcome(0, PanelStatus::NoImage)).is_none());

    let d = PanelDiagnostic::from_outcome(&outcome(1, PanelStatus::Placeholder { error: err }))
        .unwrap();
    assert_eq!(d.index, 1);
    assert!(d.message.starts_with("panel 2: fetch failed for http://h/2.png"));

    let gap = PanelDiagnostic::from_outcome(&outcome(
        4,
        PanelStatus::ExtractionGap {
            reason: "no box".to_string(),
        },
    ))
    .unwrap();
    assert_eq!(gap.message, "panel 5: no box");
}

#[test]
fn diagnostics_serialize_with_tagged_status() {
    let d = PanelDiagnostic {
        index: 1,
        status: PanelStatus::Placeholder {
            error: ImageError::Decode {
                url: "u".to_string(),
                reason: "r".to_string(),
            },
        },
        message: "m".to_string(),
    };
    let v = serde_json::to_value(&d).unwrap();
    assert_eq!(v["index"], 1);
    assert_eq!(v["status"]["status"], "placeholder");
    assert_eq!(v["status"]["error"]["kind"], "decode");
}

#[test]
fn converter_keeps_its_options() {
    let opts = ConvertOpts {
        canvas_size: 640,
        parallel_fetch: true,
        ..ConvertOpts::default()
    };
    let converter = Converter::new(
        opts.clone(),
        Arc::new(crate::assets::fetch::InMemoryFetcher::new()),
    );
    assert_eq!(converter.opts(), &opts);
    assert_eq!(Converter::with_http(opts.clone()).opts(), &opts);
}
