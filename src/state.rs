use crossterm::event::{KeyCode, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tracing::{debug, info};

use crate::{
    codes::{ACTIVITY_OPTIONS, ISSUE_OPTIONS},
    data::CaseBook,
    detail::DetailPanel,
    figure::{Figure, MarkerPayload, TileSource},
    filter::{Selection, filter_cases},
    map_draw::{AreaLayer, Viewport, nearest_marker},
    toggle::{Group, SelectionToggle},
};

/// How far from a marker, in cells, a click or hover still hits it.
const HIT_CELLS: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Panel {
    Issues,
    Activities,
    Map,
}

/// A checklist: row 0 is the select/unselect-all button, then one row per option.
#[derive(Clone, Debug)]
pub struct Checklist {
    pub group: Group,
    pub toggle: SelectionToggle,
    pub cursor: usize,
}

impl Checklist {
    fn new(group: Group) -> Self {
        Self { group, toggle: SelectionToggle::new(group), cursor: 0 }
    }

    pub fn options(&self) -> &'static [(&'static str, &'static str)] {
        match self.group {
            Group::Issues => &ISSUE_OPTIONS,
            Group::Activities => &ACTIVITY_OPTIONS,
        }
    }

    fn rows(&self) -> usize {
        self.options().len() + 1
    }
}

pub struct AppState {
    pub book: CaseBook,
    pub tiles: TileSource,
    pub layer: Option<AreaLayer>,
    pub selection: Selection,
    pub issues: Checklist,
    pub activities: Checklist,
    pub figure: Figure,
    pub viewport: Viewport,
    /// Payload of the last clicked marker; survives filter changes.
    pub clicked: Option<MarkerPayload>,
    pub detail: DetailPanel,
    pub selected_point: Option<usize>,
    pub hovered: Option<usize>,
    pub active_panel: Panel,
    /// Canvas area from the last draw, for mouse hit-testing.
    pub map_inner: Rect,
}

impl AppState {
    pub const HELP_TEXT: &'static str = "\
Tab: next panel   ↑/↓: move   Space/Enter: check
a: select / unselect all   +/-: zoom   arrows: pan (map)
n/p: next/previous marker   Enter: open marker   r: reset view
Esc: clear selection   q: quit";

    pub fn new(book: CaseBook, tiles: TileSource, layer: Option<AreaLayer>) -> Self {
        let selection = Selection::default();
        let figure = Figure::build(filter_cases(&book.cases, &selection), &tiles);
        let mut viewport = Viewport::default();
        viewport.sync(&figure.layout);
        Self {
            book,
            tiles,
            layer,
            selection,
            issues: Checklist::new(Group::Issues),
            activities: Checklist::new(Group::Activities),
            figure,
            viewport,
            clicked: None,
            detail: DetailPanel::Prompt,
            selected_point: None,
            hovered: None,
            active_panel: Panel::Issues,
            map_inner: Rect::default(),
        }
    }

    /// Recomputes the markers after a selection change. The viewport keeps
    /// the user's pan and zoom while the view revision stays the same.
    fn refresh_figure(&mut self) {
        let subset = filter_cases(&self.book.cases, &self.selection);
        self.figure = Figure::build(subset, &self.tiles);
        self.viewport.sync(&self.figure.layout);
        self.selected_point = None;
        self.hovered = None;
        debug!(
            issues = self.selection.issues.len(),
            activities = self.selection.activities.len(),
            markers = self.figure.markers().len(),
            "figure updated"
        );
    }

    fn checklist_mut(&mut self, group: Group) -> &mut Checklist {
        match group {
            Group::Issues => &mut self.issues,
            Group::Activities => &mut self.activities,
        }
    }

    /// Presses the group's "Select / Unselect All" button.
    pub fn press_toggle(&mut self, group: Group) {
        let list = self.checklist_mut(group);
        let (toggle, codes) = list.toggle.press();
        list.toggle = toggle;
        debug!(?group, clicks = toggle.clicks, ?codes, "select/unselect all");
        let target = match group {
            Group::Issues => &mut self.selection.issues,
            Group::Activities => &mut self.selection.activities,
        };
        *target = codes.into_iter().collect();
        self.refresh_figure();
    }

    /// Checks or unchecks one option of a group.
    pub fn flip_option(&mut self, group: Group, code: &str) {
        let target = match group {
            Group::Issues => &mut self.selection.issues,
            Group::Activities => &mut self.selection.activities,
        };
        Selection::flip(target, code);
        self.refresh_figure();
    }

    /// A click on the map: `Some(i)` hits marker `i`, `None` clears.
    pub fn click_marker(&mut self, index: Option<usize>) {
        let trace = self.figure.markers();
        self.clicked = index.and_then(|i| trace.customdata.get(i).cloned());
        self.selected_point = index.filter(|i| *i < trace.len());
        self.detail = DetailPanel::format(self.clicked.as_ref());
        if let Some(payload) = &self.clicked {
            info!(title = %payload.case_title, "case study opened");
        }
        debug!(detail = %self.detail.plain_text(), "detail panel updated");
    }

    pub fn hovered_payload(&self) -> Option<&MarkerPayload> {
        self.hovered.and_then(|i| self.figure.markers().customdata.get(i))
    }

    fn cycle_hover(&mut self, forward: bool) {
        let n = self.figure.markers().len();
        if n == 0 {
            self.hovered = None;
            return;
        }
        self.hovered = Some(match (self.hovered, forward) {
            (None, true) => 0,
            (None, false) => n - 1,
            (Some(i), true) => (i + 1) % n,
            (Some(i), false) => (i + n - 1) % n,
        });
    }

    fn activate_checklist_row(&mut self, group: Group) {
        let list = match group {
            Group::Issues => &self.issues,
            Group::Activities => &self.activities,
        };
        let (cursor, options) = (list.cursor, list.options());
        match cursor {
            0 => self.press_toggle(group),
            row => {
                if let Some((code, _)) = options.get(row - 1) {
                    self.flip_option(group, code);
                }
            }
        }
    }

    /// Returns true when the app should quit.
    pub fn handle_input(&mut self, key: KeyCode) -> bool {
        use KeyCode::*;
        match key {
            Char('q') => return true,
            Tab => {
                self.active_panel = match self.active_panel {
                    Panel::Issues => Panel::Activities,
                    Panel::Activities => Panel::Map,
                    Panel::Map => Panel::Issues,
                };
            }
            BackTab => {
                self.active_panel = match self.active_panel {
                    Panel::Issues => Panel::Map,
                    Panel::Activities => Panel::Issues,
                    Panel::Map => Panel::Activities,
                };
            }
            Esc => self.click_marker(None),
            _ => match self.active_panel {
                Panel::Issues => self.checklist_key(Group::Issues, key),
                Panel::Activities => self.checklist_key(Group::Activities, key),
                Panel::Map => self.map_key(key),
            },
        }
        false
    }

    fn checklist_key(&mut self, group: Group, key: KeyCode) {
        use KeyCode::*;
        match key {
            Up => {
                let list = self.checklist_mut(group);
                list.cursor = list.cursor.saturating_sub(1);
            }
            Down => {
                let list = self.checklist_mut(group);
                if list.cursor + 1 < list.rows() {
                    list.cursor += 1;
                }
            }
            Char(' ') | Enter => self.activate_checklist_row(group),
            Char('a') => self.press_toggle(group),
            _ => {}
        }
    }

    fn map_key(&mut self, key: KeyCode) {
        use KeyCode::*;
        match key {
            Left => self.viewport.pan(-0.1, 0.0),
            Right => self.viewport.pan(0.1, 0.0),
            Up => self.viewport.pan(0.0, 0.1),
            Down => self.viewport.pan(0.0, -0.1),
            Char('+') | Char('=') => self.viewport.zoom_by(0.5),
            Char('-') => self.viewport.zoom_by(-0.5),
            Char('r') => self.viewport.reset(&self.figure.layout),
            Char('n') => self.cycle_hover(true),
            Char('p') => self.cycle_hover(false),
            Enter => {
                if self.hovered.is_some() {
                    self.click_marker(self.hovered);
                }
            }
            _ => {}
        }
    }

    /// Mouse over the map canvas: move hovers, left click selects, wheel zooms.
    pub fn handle_mouse(&mut self, event: MouseEvent) {
        let Some((lon, lat)) = self.viewport.cell_to_lonlat(self.map_inner, event.column, event.row) else {
            return;
        };
        let hit = nearest_marker(self.figure.markers(), &self.viewport, self.map_inner, lon, lat, HIT_CELLS);
        match event.kind {
            MouseEventKind::Moved => self.hovered = hit,
            MouseEventKind::Down(MouseButton::Left) => {
                self.active_panel = Panel::Map;
                self.hovered = hit;
                // Clicking empty map keeps the current detail, like the web figure.
                if hit.is_some() {
                    self.click_marker(hit);
                }
            }
            MouseEventKind::ScrollUp => self.viewport.zoom_by(0.25),
            MouseEventKind::ScrollDown => self.viewport.zoom_by(-0.25),
            _ => {}
        }
    }
}
