//! Renderer-agnostic description of the case-study map.
//!
//! A [`Figure`] holds one marker trace and the map layout. It serializes to
//! JSON for web map renderers and converts to a GeoJSON feature collection;
//! the terminal canvas in `map_draw` reads it directly.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::{Serialize, Serializer, ser::SerializeTuple};

use crate::data::CaseStudy;

/// Keeps the viewer's pan and zoom across figure updates.
pub const VIEW_REVISION: &str = "casemap";

pub const MAP_CENTER: MapCenter = MapCenter { lat: 52.9, lon: -2.0 };
pub const MAP_ZOOM: f64 = 6.2;

pub const HOVER_TEMPLATE: &str = concat!(
    "<b>%{customdata[1]}</b><br>",
    "<i>Click to View Description</i><br><br>",
    "<b>Area:</b> %{customdata[2]}<br>",
    "<b>Themes:</b> %{customdata[3]}<br>",
    "<b>Local Activity:</b> %{customdata[4]}<br>",
    "<extra></extra>",
);

/// Names of the payload fields, in positional order.
pub const PAYLOAD_FIELDS: [&str; 14] = [
    "link",
    "case_title",
    "area",
    "hover_issue",
    "hover_action",
    "hover_summary",
    "summary",
    "year",
    "rel_tool_name",
    "rel_tool_link",
    "contact_name",
    "contact_title",
    "contactors",
    "contact_email",
];

/// Metadata carried by a marker for hover and click. Serialized as a
/// positional array in [`PAYLOAD_FIELDS`] order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarkerPayload {
    pub link: Option<String>,
    pub case_title: String,
    pub area: String,
    pub hover_issue: String,
    pub hover_action: String,
    pub hover_summary: String,
    pub summary: String,
    pub year: String,
    pub rel_tool_name: String,
    pub rel_tool_link: String,
    pub contact_name: String,
    pub contact_title: String,
    pub contact_org: String,
    pub contact_email: String,
}

impl MarkerPayload {
    pub fn from_case(case: &CaseStudy) -> Self {
        Self {
            link: case.link.clone(),
            case_title: case.case_title.clone(),
            area: match (&case.region, case.area.is_empty()) {
                (Some(region), true) => region.clone(),
                _ => case.area.clone(),
            },
            hover_issue: case.hover_issue.clone(),
            hover_action: case.hover_action.clone(),
            hover_summary: case.hover_summary.clone(),
            summary: case.summary.clone(),
            year: case.year.clone(),
            rel_tool_name: case.rel_tool_name.clone(),
            rel_tool_link: case.rel_tool_link.clone(),
            contact_name: case.contact_name.clone(),
            contact_title: case.contact_title.clone(),
            contact_org: case.contact_org.clone(),
            contact_email: case.contact_email.clone(),
        }
    }

    /// Field at `index`, `None` for a missing link or an index out of range.
    pub fn get(&self, index: usize) -> Option<&str> {
        let value = match index {
            0 => return self.link.as_deref(),
            1 => &self.case_title,
            2 => &self.area,
            3 => &self.hover_issue,
            4 => &self.hover_action,
            5 => &self.hover_summary,
            6 => &self.summary,
            7 => &self.year,
            8 => &self.rel_tool_name,
            9 => &self.rel_tool_link,
            10 => &self.contact_name,
            11 => &self.contact_title,
            12 => &self.contact_org,
            13 => &self.contact_email,
            _ => return None,
        };
        Some(value.as_str())
    }
}

impl Serialize for MarkerPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(PAYLOAD_FIELDS.len())?;
        for idx in 0..PAYLOAD_FIELDS.len() {
            tup.serialize_element(&self.get(idx))?;
        }
        tup.end()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MarkerStyle {
    pub opacity: f64,
    pub size: f64,
}

pub const DEFAULT_MARKER: MarkerStyle = MarkerStyle { opacity: 0.75, size: 10.0 };
pub const SELECTED_MARKER: MarkerStyle = MarkerStyle { opacity: 0.4, size: 25.0 };
pub const UNSELECTED_MARKER: MarkerStyle = MarkerStyle { opacity: 0.75, size: 10.0 };

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HoverLabel {
    pub align: &'static str,
    pub bordercolor: &'static str,
}

/// Point markers with per-marker colour and payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerTrace {
    pub mode: &'static str,
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
    pub color: Vec<String>,
    pub marker: MarkerStyle,
    pub selected: MarkerStyle,
    pub unselected: MarkerStyle,
    pub hoverinfo: &'static str,
    pub hovertext: Vec<String>,
    pub hovertemplate: &'static str,
    pub hoverlabel: HoverLabel,
    pub customdata: Vec<MarkerPayload>,
}

impl MarkerTrace {
    pub fn len(&self) -> usize {
        self.lon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lon.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MapCenter {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Margin {
    pub t: u16,
    pub b: u16,
    pub l: u16,
    pub r: u16,
}

/// Tile provider settings. The token and style are passed through untouched.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapboxConfig {
    pub accesstoken: String,
    pub style: String,
    pub center: MapCenter,
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapLayout {
    pub uirevision: &'static str,
    pub clickmode: &'static str,
    pub hovermode: &'static str,
    pub hoverdistance: u32,
    pub margin: Margin,
    pub mapbox: MapboxConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<MarkerTrace>,
    pub layout: MapLayout,
}

/// Tile credentials carried into every figure.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileSource {
    pub access_token: String,
    pub style: String,
}

impl Figure {
    /// Builds the figure for an already filtered set of case studies.
    pub fn build<'a, I>(cases: I, tiles: &TileSource) -> Self
    where
        I: IntoIterator<Item = &'a CaseStudy>,
    {
        let mut trace = MarkerTrace {
            mode: "markers",
            lon: Vec::new(),
            lat: Vec::new(),
            color: Vec::new(),
            marker: DEFAULT_MARKER,
            selected: SELECTED_MARKER,
            unselected: UNSELECTED_MARKER,
            hoverinfo: "text",
            hovertext: Vec::new(),
            hovertemplate: HOVER_TEMPLATE,
            hoverlabel: HoverLabel { align: "left", bordercolor: "white" },
            customdata: Vec::new(),
        };
        for case in cases {
            trace.lon.push(case.lon);
            trace.lat.push(case.lat);
            trace.color.push(case.point_color.clone());
            trace.hovertext.push(case.case_title.clone());
            trace.customdata.push(MarkerPayload::from_case(case));
        }

        Self {
            data: vec![trace],
            layout: MapLayout {
                uirevision: VIEW_REVISION,
                clickmode: "event+select",
                hovermode: "closest",
                hoverdistance: 2,
                margin: Margin { t: 0, b: 0, l: 0, r: 0 },
                mapbox: MapboxConfig {
                    accesstoken: tiles.access_token.clone(),
                    style: tiles.style.clone(),
                    center: MAP_CENTER,
                    zoom: MAP_ZOOM,
                    bearing: 0.0,
                    pitch: 0.0,
                },
            },
        }
    }

    pub fn markers(&self) -> &MarkerTrace {
        &self.data[0]
    }

    /// Point features with the colour, hover text and named payload fields.
    pub fn to_geojson(&self) -> FeatureCollection {
        let trace = self.markers();
        let features = (0..trace.len())
            .map(|i| {
                let mut props = JsonObject::new();
                props.insert("color".into(), trace.color[i].clone().into());
                props.insert("hovertext".into(), trace.hovertext[i].clone().into());
                let payload = &trace.customdata[i];
                for (idx, name) in PAYLOAD_FIELDS.iter().enumerate() {
                    let value = payload
                        .get(idx)
                        .map_or(serde_json::Value::Null, |v| v.into());
                    props.insert((*name).into(), value);
                }
                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(Value::Point(vec![trace.lon[i], trace.lat[i]]))),
                    id: None,
                    properties: Some(props),
                    foreign_members: None,
                }
            })
            .collect();
        FeatureCollection { bbox: None, features, foreign_members: None }
    }
}

/// Fills `%{customdata[N]}` placeholders of `template` from `payload`.
pub fn render_template(template: &str, payload: &MarkerPayload) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("%{customdata[") {
        out.push_str(&rest[..start]);
        let after = &rest[start + "%{customdata[".len()..];
        match after.find("]}") {
            Some(end) => {
                let value = after[..end]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| payload.get(i))
                    .unwrap_or("");
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Turns hover markup into plain lines: `<br>` breaks, other tags dropped.
pub fn markup_to_lines(markup: &str) -> Vec<String> {
    let mut lines = vec![String::new()];
    let mut rest = markup;
    while let Some(open) = rest.find('<') {
        if let Some(line) = lines.last_mut() {
            line.push_str(&rest[..open]);
        }
        let Some(close) = rest[open..].find('>') else {
            rest = &rest[open..];
            break;
        };
        let tag = &rest[open + 1..open + close];
        if tag.eq_ignore_ascii_case("br") || tag.eq_ignore_ascii_case("br/") {
            lines.push(String::new());
        }
        rest = &rest[open + close + 1..];
    }
    if let Some(line) = lines.last_mut() {
        line.push_str(rest);
    }
    while lines.last().is_some_and(|l| l.is_empty()) && lines.len() > 1 {
        lines.pop();
    }
    lines
}
