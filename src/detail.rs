use crate::figure::MarkerPayload;

pub const PROMPT: &str = "Select a location on the map to display more information about the case study here.";
pub const NO_INFORMATION: &str = "No project information available";
pub const LINK_LABEL: &str = "[Click For More Information]";

/// One piece of the project information panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Title(String),
    Text(String),
    Label(String),
    LineBreak,
    /// A hyperlink; `new_window` asks the viewer to open it in a new context.
    Link { label: String, href: String, new_window: bool },
}

/// What the project information panel shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetailPanel {
    Prompt,
    NoInformation,
    Case(Vec<Segment>),
}

impl DetailPanel {
    /// Formats the clicked marker's payload, if any.
    pub fn format(clicked: Option<&MarkerPayload>) -> Self {
        let Some(payload) = clicked else {
            return Self::Prompt;
        };
        let Some(link) = payload.link.as_deref().filter(|l| !l.is_empty()) else {
            return Self::NoInformation;
        };
        Self::Case(vec![
            Segment::Title(payload.case_title.clone()),
            Segment::Text(payload.area.clone()),
            Segment::Text(", ".to_string()),
            Segment::Text(payload.year.clone()),
            Segment::LineBreak,
            Segment::Label("Description: ".to_string()),
            Segment::Text(payload.summary.clone()),
            Segment::Link {
                label: LINK_LABEL.to_string(),
                href: link.to_string(),
                new_window: true,
            },
        ])
    }

    pub fn segments(&self) -> Vec<Segment> {
        match self {
            Self::Prompt => vec![Segment::Text(PROMPT.to_string())],
            Self::NoInformation => vec![Segment::Text(NO_INFORMATION.to_string())],
            Self::Case(segments) => segments.clone(),
        }
    }

    /// Flattens the panel to plain text, for logs and tests.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for seg in self.segments() {
            match seg {
                Segment::Title(t) => {
                    out.push_str(&t);
                    out.push('\n');
                }
                Segment::Text(t) | Segment::Label(t) => out.push_str(&t),
                Segment::LineBreak => out.push('\n'),
                Segment::Link { label, href, .. } => {
                    out.push('\n');
                    out.push_str(&label);
                    out.push_str(" <");
                    out.push_str(&href);
                    out.push('>');
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> MarkerPayload {
        MarkerPayload {
            link: Some("https://example.org/a".into()),
            case_title: "Family hubs".into(),
            area: "Stockton".into(),
            year: "2021".into(),
            summary: "A joined-up early years offer.".into(),
            ..Default::default()
        }
    }

    #[test]
    fn nothing_clicked_shows_prompt() {
        assert_eq!(DetailPanel::format(None), DetailPanel::Prompt);
        assert_eq!(DetailPanel::Prompt.plain_text(), PROMPT);
    }

    #[test]
    fn empty_or_missing_link_has_no_information() {
        let mut p = payload();
        p.link = None;
        assert_eq!(DetailPanel::format(Some(&p)), DetailPanel::NoInformation);
        p.link = Some(String::new());
        let panel = DetailPanel::format(Some(&p));
        assert_eq!(panel.plain_text(), "No project information available");
    }

    #[test]
    fn case_fields_appear_in_order() {
        let panel = DetailPanel::format(Some(&payload()));
        let DetailPanel::Case(segments) = &panel else {
            panic!("expected case panel, got {panel:?}");
        };
        assert_eq!(segments[0], Segment::Title("Family hubs".into()));
        assert_eq!(segments[4], Segment::LineBreak);
        assert_eq!(
            segments[7],
            Segment::Link {
                label: LINK_LABEL.into(),
                href: "https://example.org/a".into(),
                new_window: true,
            }
        );

        let text = panel.plain_text();
        let order = [
            "Family hubs",
            "Stockton",
            ", ",
            "2021",
            "Description: ",
            "A joined-up early years offer.",
            "[Click For More Information]",
            "https://example.org/a",
        ];
        let mut from = 0;
        for needle in order {
            let at = text[from..].find(needle).unwrap_or_else(|| panic!("{needle:?} missing or out of order"));
            from += at + needle.len();
        }
    }
}
