use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::codes::{EIF_GOLD, EIF_GREEN, EIF_GREY, EIF_PINK, EIF_PURPLE, ISSUE_LABELS, hex_color};
use crate::detail::Segment;
use crate::figure::{markup_to_lines, render_template};
use crate::map_draw;
use crate::state::{AppState, Checklist, Panel};

const TITLE: &str = "Transforming Early Intervention for Families";
const SUBTITLE: &str = "Case Studies from Local Areas";
const ABOUT: &str = "This map provides quick and easy access to examples of innovation and good practice by local \
authorities and partners across England and Wales. To focus on a specific theme or local activity select your area \
of interest to filter the results, then pick a point on the map for a summary and a link to the full case study.";

fn palette(hex: &str) -> Color {
    hex_color(hex).unwrap_or(Color::Reset)
}

fn heading(text: &str) -> Span<'_> {
    Span::styled(text, Style::default().fg(palette(EIF_PURPLE)).add_modifier(Modifier::BOLD))
}

pub fn draw(f: &mut Frame<'_>, state: &mut AppState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(f.area());

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(11),
            Constraint::Min(6),
            Constraint::Length(5),
        ])
        .split(columns[0]);

    draw_title(f, left[0]);
    let about = Paragraph::new(ABOUT)
        .block(Block::default().borders(Borders::ALL).title(heading(" About This Map ")))
        .style(Style::default().fg(palette(EIF_GREY)))
        .wrap(Wrap { trim: true });
    f.render_widget(about, left[1]);
    draw_checklist(f, left[2], " Themes ", &state.issues, &state.selection.issues, state.active_panel == Panel::Issues);
    draw_checklist(
        f,
        left[3],
        " Local Activity ",
        &state.activities,
        &state.selection.activities,
        state.active_panel == Panel::Activities,
    );
    draw_detail(f, left[4], state);
    draw_legend(f, left[5]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(8)])
        .split(columns[1]);

    state.map_inner = Block::default().borders(Borders::ALL).inner(right[0]);
    map_draw::render(f, right[0], state);
    draw_hover(f, right[1], state);
}

fn draw_title(f: &mut Frame<'_>, area: Rect) {
    let text = Text::from(vec![
        Line::from(heading(TITLE)),
        Line::from(Span::styled(
            SUBTITLE,
            Style::default().fg(palette("#85679A")).add_modifier(Modifier::BOLD | Modifier::ITALIC),
        )),
    ]);
    f.render_widget(Paragraph::new(text).block(Block::default().borders(Borders::ALL)), area);
}

fn draw_checklist(
    f: &mut Frame<'_>,
    area: Rect,
    title: &str,
    list: &Checklist,
    checked: &std::collections::BTreeSet<String>,
    focused: bool,
) {
    let mut items = vec![ListItem::new(Span::styled(
        "‹ Select / Unselect All ›",
        Style::default().fg(palette(EIF_PURPLE)),
    ))];
    items.extend(list.options().iter().map(|(code, label)| {
        let mark = if checked.contains(*code) { "[x]" } else { "[ ]" };
        ListItem::new(format!("{mark} {label}"))
    }));

    let border = if focused { Style::default().fg(Color::Magenta) } else { Style::default() };
    let widget = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(heading(title)).border_style(border))
        .highlight_symbol(">> ")
        .highlight_style(Style::default().add_modifier(Modifier::BOLD));
    let mut list_state = ListState::default();
    if focused {
        list_state.select(Some(list.cursor));
    }
    f.render_stateful_widget(widget, area, &mut list_state);
}

fn draw_detail(f: &mut Frame<'_>, area: Rect, state: &AppState) {
    let grey = Style::default().fg(palette(EIF_GREY));
    let mut lines: Vec<Line> = vec![Line::default()];
    for seg in state.detail.segments() {
        let Some(current) = lines.last_mut() else { break };
        match seg {
            Segment::Title(t) => {
                current.push_span(Span::styled(t, grey.add_modifier(Modifier::BOLD)));
                lines.push(Line::default());
            }
            Segment::Text(t) => current.push_span(Span::styled(t, grey.add_modifier(Modifier::ITALIC))),
            Segment::Label(t) => current.push_span(Span::styled(t, grey.add_modifier(Modifier::BOLD))),
            Segment::LineBreak => lines.push(Line::default()),
            Segment::Link { label, href, new_window } => {
                let link = Style::default().fg(palette(EIF_GREEN));
                lines.push(Line::from(Span::styled(label, link.add_modifier(Modifier::BOLD))));
                let arrow = if new_window { " ↗" } else { "" };
                lines.push(Line::from(Span::styled(format!("{href}{arrow}"), link.add_modifier(Modifier::UNDERLINED))));
            }
        }
    }
    let panel = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(heading(" Project Information ")))
        .wrap(Wrap { trim: true });
    f.render_widget(panel, area);
}

fn draw_legend(f: &mut Frame<'_>, area: Rect) {
    let lines: Vec<Line> = [EIF_GREEN, EIF_PINK, EIF_GOLD]
        .iter()
        .zip(ISSUE_LABELS)
        .map(|(color, (_, label))| {
            Line::from(vec![
                Span::styled("● ", Style::default().fg(palette(color))),
                Span::raw(label),
            ])
        })
        .collect();
    let legend = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(heading(" Map Legend ")));
    f.render_widget(legend, area);
}

fn draw_hover(f: &mut Frame<'_>, area: Rect, state: &AppState) {
    let text = match state.hovered_payload() {
        Some(payload) => {
            let trace = state.figure.markers();
            markup_to_lines(&render_template(trace.hovertemplate, payload)).join("\n")
        }
        None => AppState::HELP_TEXT.to_string(),
    };
    let hover = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(hover, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::sample_book;
    use crate::figure::TileSource;
    use ratatui::{Terminal, backend::TestBackend};

    fn screen(state: &mut AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(160, 50)).unwrap();
        terminal.draw(|f| draw(f, state)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn renders_checklists_and_prompt() {
        let mut state = AppState::new(sample_book(1), TileSource::default(), None);
        let out = screen(&mut state);
        assert!(out.contains("[x] Early Childhood Services"));
        assert!(out.contains("[x] Strategy Development"));
        assert!(out.contains("Case studies: 4"));
        assert!(out.contains("Select a location on the map"));
        assert!(state.map_inner.width > 0);
    }

    #[test]
    fn renders_the_clicked_case() {
        let mut state = AppState::new(sample_book(1), TileSource::default(), None);
        let i = state.figure.markers().hovertext.iter().position(|t| t == "Flying Start").unwrap();
        state.click_marker(Some(i));
        state.hovered = Some(i);
        let out = screen(&mut state);
        assert!(out.contains("Flying Start"));
        assert!(out.contains("[Click For More Information]"));
        assert!(out.contains("Area: Cardiff"));
    }
}
