use geo::{Area, Coord, Geometry, MultiPolygon, Point, Polygon};
use geojson::GeoJson;
use ratatui::layout::Rect as TuiRect;
use ratatui::style::{Color, Style};
use ratatui::symbols::Marker;
use ratatui::widgets::canvas::{Canvas, Circle, Line, Points};
use ratatui::widgets::{Block, Borders};
use ratatui::Frame;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::codes::{hex_color, scale_color};
use crate::data::AreaWeight;
use crate::figure::{MapLayout, MarkerTrace};
use crate::state::{AppState, Panel};

/// Fragments smaller than this share of an area's largest polygon are dropped.
const FRAGMENT_SHARE: f64 = 0.20;

/// Degrees of longitude visible at zoom 0 across the canvas.
const WORLD_SPAN: f64 = 720.0;

/// What part of the map is on screen.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: f64,
    /// Revision of the figure this view belongs to.
    pub revision: Option<String>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { center_lat: 0.0, center_lon: 0.0, zoom: 1.0, revision: None }
    }
}

impl Viewport {
    /// Adopts the layout's view unless the user already moved a view with the
    /// same revision.
    pub fn sync(&mut self, layout: &MapLayout) {
        if self.revision.as_deref() == Some(layout.uirevision) {
            return;
        }
        self.reset(layout);
    }

    pub fn reset(&mut self, layout: &MapLayout) {
        self.center_lat = layout.mapbox.center.lat;
        self.center_lon = layout.mapbox.center.lon;
        self.zoom = layout.mapbox.zoom;
        self.revision = Some(layout.uirevision.to_string());
    }

    fn lon_span(&self) -> f64 {
        WORLD_SPAN / 2f64.powf(self.zoom)
    }

    /// Visible `(x_bounds, y_bounds)` for a canvas of `cols` x `rows` cells.
    /// Cells are about twice as tall as wide.
    pub fn bounds(&self, cols: u16, rows: u16) -> ([f64; 2], [f64; 2]) {
        let lon_span = self.lon_span();
        let aspect = if cols == 0 { 1.0 } else { 2.0 * rows as f64 / cols as f64 };
        let lat_span = lon_span * aspect * self.center_lat.to_radians().cos().abs().max(0.1);
        (
            [self.center_lon - lon_span / 2.0, self.center_lon + lon_span / 2.0],
            [self.center_lat - lat_span / 2.0, self.center_lat + lat_span / 2.0],
        )
    }

    /// Moves the centre by a fraction of the visible span.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let span = self.lon_span();
        self.center_lon = (self.center_lon + dx * span).clamp(-180.0, 180.0);
        self.center_lat = (self.center_lat + dy * span * 0.6).clamp(-85.0, 85.0);
    }

    pub fn zoom_by(&mut self, delta: f64) {
        self.zoom = (self.zoom + delta).clamp(0.0, 16.0);
    }

    /// Map coordinates of a terminal cell inside `inner`.
    pub fn cell_to_lonlat(&self, inner: TuiRect, col: u16, row: u16) -> Option<(f64, f64)> {
        if inner.width == 0 || inner.height == 0 {
            return None;
        }
        if col < inner.x || row < inner.y || col >= inner.x + inner.width || row >= inner.y + inner.height {
            return None;
        }
        let (xb, yb) = self.bounds(inner.width, inner.height);
        let fx = (col - inner.x) as f64 + 0.5;
        let fy = (row - inner.y) as f64 + 0.5;
        let lon = xb[0] + (xb[1] - xb[0]) * fx / inner.width as f64;
        let lat = yb[1] - (yb[1] - yb[0]) * fy / inner.height as f64;
        Some((lon, lat))
    }

    /// Degrees per cell along each axis.
    fn cell_size(&self, inner: TuiRect) -> (f64, f64) {
        let (xb, yb) = self.bounds(inner.width, inner.height);
        (
            (xb[1] - xb[0]) / inner.width.max(1) as f64,
            (yb[1] - yb[0]) / inner.height.max(1) as f64,
        )
    }
}

/// Index of the marker closest to `(lon, lat)`, if within `max_cells` cells.
pub fn nearest_marker(
    trace: &MarkerTrace,
    viewport: &Viewport,
    inner: TuiRect,
    lon: f64,
    lat: f64,
    max_cells: f64,
) -> Option<usize> {
    let (cw, ch) = viewport.cell_size(inner);
    let target = Point::new(lon / cw, lat / ch);
    trace
        .lon
        .iter()
        .zip(&trace.lat)
        .enumerate()
        .map(|(i, (x, y))| {
            let d = Point::new(x / cw, y / ch) - target;
            (i, d.x().hypot(d.y()))
        })
        .filter(|(_, d)| *d <= max_cells)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Area outlines behind the markers, shaded by area weight.
pub struct AreaLayer {
    items: Vec<(Color, MultiPolygon<f64>)>,
}

impl AreaLayer {
    /// Builds the layer from boundary features keyed by `nuts318cd`.
    /// Features without a weight row are skipped.
    pub fn new(raw: GeoJson, weights: &[AreaWeight]) -> Result<Self, geojson::Error> {
        let min = weights.iter().map(|w| w.weight).min().unwrap_or(0);
        let max = weights.iter().map(|w| w.weight).max().unwrap_or(0);
        let by_code: HashMap<&str, u32> = weights.iter().map(|w| (w.code.as_str(), w.weight)).collect();

        let mut items = Vec::new();
        let mut drawn: HashSet<String> = HashSet::new();
        if let GeoJson::FeatureCollection(fc) = raw {
            for feature in fc.features {
                let code = feature
                    .properties
                    .as_ref()
                    .and_then(|p| p.get("nuts318cd").and_then(|v| v.as_str()))
                    .unwrap_or("")
                    .to_string();
                let Some(weight) = by_code.get(code.as_str()).copied() else {
                    continue;
                };
                let Some(gj) = feature.geometry else {
                    continue;
                };
                let geom: Geometry<f64> = gj.value.try_into()?;
                let mp = match geom {
                    Geometry::Polygon(p) => p.into(),
                    Geometry::MultiPolygon(m) => drop_fragments(m),
                    _ => continue,
                };
                let color = hex_color(scale_color(weight, min, max)).unwrap_or(Color::Gray);
                items.push((color, mp));
                drawn.insert(code);
            }
        }
        for area in weights.iter().filter(|w| !drawn.contains(&w.code)) {
            debug!(code = %area.code, name = ?area.name, "area has no boundary");
        }
        Ok(Self { items })
    }

    pub fn feature_count(&self) -> usize {
        self.items.len()
    }
}

/// Keeps the polygons of a multipolygon that are at least
/// [`FRAGMENT_SHARE`] of its largest one.
fn drop_fragments(mp: MultiPolygon<f64>) -> MultiPolygon<f64> {
    if mp.0.len() < 2 {
        return mp;
    }
    let max_area = mp.0.iter().map(|p| p.unsigned_area()).fold(0.0, f64::max);
    let threshold = max_area * FRAGMENT_SHARE;
    let kept: Vec<Polygon<f64>> = mp.0.iter().filter(|p| p.unsigned_area() >= threshold).cloned().collect();
    if kept.is_empty() { mp } else { MultiPolygon(kept) }
}

fn ring_lines(coords: &[Coord<f64>], color: Color, ctx: &mut ratatui::widgets::canvas::Context<'_>) {
    for window in coords.windows(2) {
        let (a, b) = (window[0], window[1]);
        ctx.draw(&Line { x1: a.x, y1: a.y, x2: b.x, y2: b.y, color });
    }
    if let (Some(first), Some(last)) = (coords.first(), coords.last()) {
        ctx.draw(&Line { x1: last.x, y1: last.y, x2: first.x, y2: first.y, color });
    }
}

/// Draws the background areas, every marker, then the clicked and hovered
/// markers on top.
pub fn render(f: &mut Frame<'_>, area: TuiRect, state: &AppState) {
    let viewport = &state.viewport;
    let layer = state.layer.as_ref();
    let (selected, hovered) = (state.selected_point, state.hovered);
    let focused = state.active_panel == Panel::Map;
    let trace = state.figure.markers();
    let title = format!(" Case studies: {} ", trace.len());
    let border = if focused { Style::default().fg(Color::Magenta) } else { Style::default() };
    let block = Block::default().title(title).borders(Borders::ALL).border_style(border);
    let inner = block.inner(area);
    let (x_bounds, y_bounds) = viewport.bounds(inner.width, inner.height);
    let (cell_w, _) = viewport.cell_size(inner);

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            if let Some(layer) = layer {
                for (color, mp) in &layer.items {
                    for poly in &mp.0 {
                        ring_lines(&poly.exterior().0, *color, ctx);
                    }
                }
                ctx.layer();
            }

            for i in 0..trace.len() {
                let color = hex_color(&trace.color[i]).unwrap_or(Color::White);
                ctx.draw(&Points { coords: &[(trace.lon[i], trace.lat[i])], color });
            }

            // Marker sizes are in pixels of the web figure; a size of 10 is one cell.
            if let Some(i) = selected.filter(|i| *i < trace.len()) {
                let color = hex_color(&trace.color[i]).unwrap_or(Color::White);
                let radius = cell_w * trace.selected.size / 20.0;
                ctx.draw(&Circle { x: trace.lon[i], y: trace.lat[i], radius, color });
            }
            if let Some(i) = hovered.filter(|i| *i < trace.len()) {
                let radius = cell_w * trace.marker.size / 20.0;
                ctx.draw(&Circle { x: trace.lon[i], y: trace.lat[i], radius, color: Color::White });
            }
        });
    f.render_widget(canvas, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::sample_book;
    use crate::figure::{Figure, TileSource, VIEW_REVISION};

    fn figure() -> Figure {
        let book = sample_book(1);
        Figure::build(&book.cases, &TileSource::default())
    }

    #[test]
    fn sync_resets_only_on_new_revision() {
        let fig = figure();
        let mut vp = Viewport::default();
        vp.sync(&fig.layout);
        assert_eq!(vp.zoom, 6.2);
        assert_eq!(vp.revision.as_deref(), Some(VIEW_REVISION));

        vp.pan(0.5, 0.0);
        vp.zoom_by(1.0);
        let moved = vp.clone();
        vp.sync(&fig.layout);
        assert_eq!(vp, moved);

        vp.revision = Some("older".into());
        vp.sync(&fig.layout);
        assert_eq!(vp.center_lon, -2.0);
        assert_eq!(vp.zoom, 6.2);
    }

    #[test]
    fn bounds_are_centered() {
        let mut vp = Viewport::default();
        vp.reset(&figure().layout);
        let (xb, yb) = vp.bounds(80, 40);
        assert!(((xb[0] + xb[1]) / 2.0 - -2.0).abs() < 1e-9);
        assert!(((yb[0] + yb[1]) / 2.0 - 52.9).abs() < 1e-9);
        assert!(xb[1] > xb[0] && yb[1] > yb[0]);
    }

    #[test]
    fn cells_outside_the_canvas_have_no_coordinates() {
        let mut vp = Viewport::default();
        vp.reset(&figure().layout);
        let inner = TuiRect::new(10, 5, 60, 30);
        assert!(vp.cell_to_lonlat(inner, 9, 10).is_none());
        assert!(vp.cell_to_lonlat(inner, 70, 10).is_none());
        let (lon, lat) = vp.cell_to_lonlat(inner, 40, 20).unwrap();
        assert!((lon - -2.0).abs() < 0.5);
        assert!((lat - 52.9).abs() < 0.5);
    }

    #[test]
    fn click_finds_the_nearest_marker_within_reach() {
        let fig = figure();
        let mut vp = Viewport::default();
        vp.reset(&fig.layout);
        let inner = TuiRect::new(0, 0, 80, 40);
        let trace = fig.markers();
        let manchester = trace.hovertext.iter().position(|t| t == "Talk Manchester").unwrap();
        let hit = nearest_marker(trace, &vp, inner, trace.lon[manchester] + 0.01, trace.lat[manchester], 2.0);
        assert_eq!(hit, Some(manchester));
        assert_eq!(nearest_marker(trace, &vp, inner, 10.0, 60.0, 2.0), None);
    }

    #[test]
    fn render_reads_focus_and_count_from_state() {
        use ratatui::{Terminal, backend::TestBackend};

        let mut state = AppState::new(sample_book(1), TileSource::default(), None);
        state.active_panel = Panel::Map;
        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        terminal.draw(|f| render(f, f.area(), &state)).unwrap();
        let buffer = terminal.backend().buffer();
        let top: String = (0..buffer.area.width).map(|x| buffer[(x, 0)].symbol()).collect();
        assert!(top.contains("Case studies: 4"));
        assert_eq!(buffer[(0, 0)].fg, Color::Magenta);
    }

    #[test]
    fn layer_keeps_weighted_areas_and_drops_fragments() {
        let raw = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"nuts318cd":"UKD33"},"geometry":{"type":"MultiPolygon","coordinates":[
                [[[-2.3,53.4],[-2.1,53.4],[-2.1,53.6],[-2.3,53.6],[-2.3,53.4]]],
                [[[-2.0,53.0],[-1.99,53.0],[-1.99,53.01],[-2.0,53.0]]]]}},
            {"type":"Feature","properties":{"nuts318cd":"ZZZ99"},"geometry":{"type":"Polygon","coordinates":[
                [[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,0.0]]]}}]}"#;
        let book = sample_book(1);
        let layer = AreaLayer::new(raw.parse().unwrap(), &book.areas).unwrap();
        assert_eq!(layer.feature_count(), 1);
        assert_eq!(layer.items[0].1.0.len(), 1);
    }
}
