use std::collections::BTreeSet;

use crate::codes::{ACTIVITY_CODES, ACTIVITY_SENTINEL, ISSUE_CODES};
use crate::data::CaseStudy;

/// The checked codes of both checklists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub issues: BTreeSet<String>,
    pub activities: BTreeSet<String>,
}

impl Default for Selection {
    /// Everything checked, the activity sentinel included.
    fn default() -> Self {
        Self {
            issues: ISSUE_CODES.iter().map(|c| c.to_string()).collect(),
            activities: ACTIVITY_CODES
                .iter()
                .chain(std::iter::once(&ACTIVITY_SENTINEL))
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

impl Selection {
    pub fn new<I, A>(issues: I, activities: A) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            issues: issues.into_iter().map(Into::into).collect(),
            activities: activities.into_iter().map(Into::into).collect(),
        }
    }

    /// Checks or unchecks one code in a set.
    pub fn flip(set: &mut BTreeSet<String>, code: &str) {
        if !set.remove(code) {
            set.insert(code.to_string());
        }
    }

    /// Whether `case` passes both facets.
    ///
    /// The activity facet is a substring match on the raw activity string,
    /// so `"1"` matches `"1,2"`. An empty set on either facet matches nothing.
    pub fn matches(&self, case: &CaseStudy) -> bool {
        if !self.issues.contains(&case.issue) {
            return false;
        }
        match case.action.as_deref() {
            Some(action) => self
                .activities
                .iter()
                .any(|code| !code.is_empty() && action.contains(code.as_str())),
            None => false,
        }
    }
}

/// Returns the case studies that pass `selection`, in table order.
pub fn filter_cases<'a>(cases: &'a [CaseStudy], selection: &Selection) -> Vec<&'a CaseStudy> {
    if selection.issues.is_empty() || selection.activities.is_empty() {
        return Vec::new();
    }
    cases.iter().filter(|c| selection.matches(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::sample_book;

    fn titles(cases: &[&CaseStudy]) -> Vec<String> {
        let mut t: Vec<String> = cases.iter().map(|c| c.case_title.clone()).collect();
        t.sort();
        t
    }

    #[test]
    fn full_selection_returns_whole_table() {
        let book = sample_book(1);
        let out = filter_cases(&book.cases, &Selection::default());
        assert_eq!(out.len(), book.cases.len());
        assert!(out.iter().zip(&book.cases).all(|(a, b)| std::ptr::eq(*a, b)));
    }

    #[test]
    fn empty_facets_return_nothing() {
        let book = sample_book(1);
        let no_issue = Selection::new(Vec::<String>::new(), ["1", "2", "3"]);
        let no_activity = Selection::new(["E", "F", "S"], Vec::<String>::new());
        assert!(filter_cases(&book.cases, &no_issue).is_empty());
        assert!(filter_cases(&book.cases, &no_activity).is_empty());
    }

    #[test]
    fn activity_matches_inside_multi_code_strings() {
        let book = sample_book(1);
        let out = filter_cases(&book.cases, &Selection::new(["E", "S"], ["5"]));
        assert_eq!(titles(&out), vec!["Family hubs"]);
        let out = filter_cases(&book.cases, &Selection::new(["S"], ["8"]));
        assert_eq!(titles(&out), vec!["Talk Manchester"]);
    }

    #[test]
    fn sentinel_selects_cases_without_activity() {
        let book = sample_book(1);
        let out = filter_cases(&book.cases, &Selection::new(["E", "F", "S"], ["9"]));
        assert_eq!(titles(&out), vec!["Flying Start"]);
    }

    #[test]
    fn every_result_satisfies_both_predicates() {
        let book = sample_book(9);
        let selections = [
            Selection::new(["E"], ["1", "3"]),
            Selection::new(["F", "S"], ["2", "3", "9"]),
            Selection::new(["E", "F"], ["5", "8"]),
        ];
        for sel in &selections {
            for case in filter_cases(&book.cases, sel) {
                assert!(sel.issues.contains(&case.issue));
                let action = case.action.as_deref().unwrap();
                assert!(sel.activities.iter().any(|a| action.contains(a.as_str())));
                assert!(book.cases.iter().any(|c| std::ptr::eq(c, case)));
            }
        }
    }

    #[test]
    fn missing_activity_never_matches() {
        let mut book = sample_book(1);
        book.cases[0].action = None;
        let out = filter_cases(&book.cases, &Selection::default());
        assert_eq!(out.len(), book.cases.len() - 1);
    }

    #[test]
    fn flip_toggles_membership() {
        let mut sel = Selection::default();
        Selection::flip(&mut sel.issues, "F");
        assert!(!sel.issues.contains("F"));
        Selection::flip(&mut sel.issues, "F");
        assert!(sel.issues.contains("F"));
    }
}
