//! Fixed code tables: issue and activity codes, their labels and colours.

use ratatui::style::Color;

/// Issue codes offered in the themes checklist, in display order.
pub const ISSUE_CODES: [&str; 3] = ["E", "F", "S"];

/// Activity codes offered in the local-activity checklist. "9" is not listed;
/// it is the implicit "none" sentinel.
pub const ACTIVITY_CODES: [&str; 8] = ["1", "2", "3", "4", "5", "6", "7", "8"];

/// Activity code selected when the activity group is "unselected".
pub const ACTIVITY_SENTINEL: &str = "9";

pub const EIF_PURPLE: &str = "#653279";
pub const EIF_GREEN: &str = "#007D8A";
pub const EIF_PINK: &str = "#E0004D";
pub const EIF_GOLD: &str = "#DBC600";
pub const EIF_BLUE: &str = "#009EE3";
pub const EIF_GREY: &str = "#373A36";

/// Marker colour keyed by issue code.
pub const POINT_COLORS: [(&str, &str); 4] = [
    ("E", EIF_GREEN),
    ("F", EIF_PINK),
    ("S", EIF_GOLD),
    ("X", EIF_BLUE),
];

/// Hover labels for issue codes.
pub const ISSUE_LABELS: [(&str, &str); 3] = [
    ("E", "Early Childhood Services"),
    ("F", "Family Relations & Parental Conflict"),
    ("S", "Speech & Language Support"),
];

/// Hover labels for activity codes, sentinel included.
pub const ACTIVITY_LABELS: [(&str, &str); 9] = [
    ("1", "Strategy"),
    ("2", "Workforce"),
    ("3", "Partnership"),
    ("4", "Community"),
    ("5", "Services & Interventions"),
    ("6", "Coordinated Working"),
    ("7", "Outcomes & Experience"),
    ("8", "Evaluation"),
    ("9", "None"),
];

/// Checklist labels. These differ from the hover labels for some activities.
pub const ISSUE_OPTIONS: [(&str, &str); 3] = ISSUE_LABELS;

pub const ACTIVITY_OPTIONS: [(&str, &str); 8] = [
    ("1", "Strategy Development"),
    ("2", "Workforce Development"),
    ("3", "Partnership Working"),
    ("4", "Co-Production"),
    ("5", "Services & Interventions"),
    ("6", "Coordinated Working"),
    ("7", "Experience & Outcome"),
    ("8", "Evaluation"),
];

/// Purple scale for the area background layer, lightest first.
pub const AREA_COLORSCALE: [&str; 10] = [
    "#E3DDE5", "#CBC0D2", "#B7A6C2", "#A58FB3", "#957AA6",
    "#85679A", "#78568E", "#6C4684", "#5F3478", "#52256F",
];

/// Replaces every occurrence of a table key in `raw` with its value, one pass,
/// leaving everything else (delimiters, unknown codes) untouched.
///
/// `"1,5"` with the activity labels becomes `"Strategy,Services & Interventions"`.
/// Replacement text is never re-scanned, so a label containing a code letter
/// stays intact.
pub fn substitute_codes(raw: &str, table: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(raw.len() * 4);
    let mut rest = raw;
    'outer: while !rest.is_empty() {
        for (code, label) in table {
            if !code.is_empty() && rest.starts_with(code) {
                out.push_str(label);
                rest = &rest[code.len()..];
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// Parses `#RRGGBB` into a terminal colour.
pub fn hex_color(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    Some(Color::Rgb((value >> 16) as u8, (value >> 8) as u8, value as u8))
}

/// Picks the colour-scale bucket for `weight` within `[min, max]`.
pub fn scale_color(weight: u32, min: u32, max: u32) -> &'static str {
    let steps = AREA_COLORSCALE.len();
    if max <= min {
        return AREA_COLORSCALE[steps - 1];
    }
    let t = (weight.clamp(min, max) - min) as f64 / (max - min) as f64;
    let idx = ((t * (steps - 1) as f64).round() as usize).min(steps - 1);
    AREA_COLORSCALE[idx]
}

pub fn is_issue_code(code: &str) -> bool {
    ISSUE_CODES.contains(&code)
}

pub fn is_activity_code(code: &str) -> bool {
    ACTIVITY_CODES.contains(&code) || code == ACTIVITY_SENTINEL
}
