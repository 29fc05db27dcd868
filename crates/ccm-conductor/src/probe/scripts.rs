//! Page scripts run by the probes.

pub const READY_STATE: &str = "return document.readyState;";

pub const SCROLL_OFFSET: &str = "return window.pageYOffset;";

pub const SCROLL_PROBE: &str = "window.scrollTo(0, 100);";

/// `arguments[0]` is inside the viewport and is what a click at its centre
/// would hit.
pub const HIT_TEST: &str = r#"
var elem = arguments[0];
var rect = elem.getBoundingClientRect();
if (rect.top < 0 || rect.left < 0 ||
    rect.bottom > window.innerHeight || rect.right > window.innerWidth) {
    return false;
}
var cx = rect.left + rect.width / 2;
var cy = rect.top + rect.height / 2;
return document.elementFromPoint(cx, cy) === elem;
"#;

pub const HAS_DATA_LAYER: &str = "return typeof window.dataLayer !== 'undefined';";

pub const HAS_SATELLITE: &str = "return typeof window._satellite !== 'undefined';";

/// Analytics tag kinds and the global each one defines.
pub const ANALYTICS_GLOBALS: &[(&str, &str, &str)] = &[
    ("gtm", "dataLayer", HAS_DATA_LAYER),
    ("adobe", "_satellite", HAS_SATELLITE),
];
