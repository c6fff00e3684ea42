use crate::codes::{ACTIVITY_CODES, ACTIVITY_SENTINEL, ISSUE_CODES};

/// The two checklist groups with a "Select / Unselect All" button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Group {
    Issues,
    Activities,
}

impl Group {
    /// Every option the button selects.
    pub fn options(self) -> &'static [&'static str] {
        match self {
            Group::Issues => &ISSUE_CODES,
            Group::Activities => &ACTIVITY_CODES,
        }
    }

    /// What "unselect all" leaves checked. The activity group keeps its
    /// "none" sentinel so cases without an activity still show.
    pub fn cleared(self) -> &'static [&'static str] {
        match self {
            Group::Issues => &[],
            Group::Activities => &[ACTIVITY_SENTINEL],
        }
    }
}

/// Click counter of one select/unselect-all button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionToggle {
    pub group: Group,
    pub clicks: u32,
}

impl SelectionToggle {
    pub const INITIAL_CLICKS: u32 = 1;

    pub fn new(group: Group) -> Self {
        Self { group, clicks: Self::INITIAL_CLICKS }
    }

    /// Registers one press and returns the new toggle with the selection it
    /// produces: even counts clear the group, odd counts select everything.
    pub fn press(self) -> (Self, Vec<String>) {
        let next = Self { clicks: self.clicks.wrapping_add(1), ..self };
        let codes = if next.clicks % 2 == 0 {
            self.group.cleared()
        } else {
            self.group.options()
        };
        (next, codes.iter().map(|c| c.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_toggle_alternates_between_none_and_all() {
        let t = SelectionToggle::new(Group::Issues);
        let (t, sel) = t.press();
        assert_eq!(t.clicks, 2);
        assert!(sel.is_empty());
        let (t, sel) = t.press();
        assert_eq!(t.clicks, 3);
        assert_eq!(sel, vec!["E", "F", "S"]);
    }

    #[test]
    fn activity_toggle_clears_to_sentinel() {
        let (t, sel) = SelectionToggle::new(Group::Activities).press();
        assert_eq!(sel, vec!["9"]);
        let (_, sel) = t.press();
        assert_eq!(sel, vec!["1", "2", "3", "4", "5", "6", "7", "8"]);
    }

    #[test]
    fn parity_of_the_counter_decides() {
        let even = SelectionToggle { group: Group::Issues, clicks: 5 };
        assert!(even.press().1.is_empty());
        let odd = SelectionToggle { group: Group::Issues, clicks: 6 };
        assert_eq!(odd.press().1.len(), 3);
    }
}
