//! Reference/selection roles for a comparison plot.

use serde::{Deserialize, Serialize};

fn has_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|token| token.eq_ignore_ascii_case(word))
}

/// A dataset is the wild-type reference when `WT` appears as a whole word
/// in its name or id.
pub fn is_reference(id: &str, name: &str) -> bool {
    has_word(name, "wt") || has_word(id, "wt")
}

/// Which dataset is drawn as base and which as overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotRoles<'a> {
    pub base: Option<&'a str>,
    pub overlay: Option<&'a str>,
}

/// Reference dataset, current selection, and the show-reference toggle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSelection {
    reference: Option<String>,
    selected: Option<String>,
    show_reference: bool,
}

impl ComparisonSelection {
    /// Starts with the reference selected
    pub fn new(reference: Option<String>) -> Self {
        Self {
            selected: reference.clone(),
            reference,
            show_reference: true,
        }
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn show_reference(&self) -> bool {
        self.show_reference
    }

    pub fn select(&mut self, id: Option<String>) {
        self.selected = id;
    }

    pub fn set_show_reference(&mut self, show: bool) {
        self.show_reference = show;
    }

    pub fn toggle_reference(&mut self) {
        self.show_reference = !self.show_reference;
    }

    /// A non-reference entry is selected while a reference exists
    pub fn is_comparing(&self) -> bool {
        matches!((&self.reference, &self.selected), (Some(r), Some(s)) if r != s)
    }

    pub fn roles(&self) -> PlotRoles<'_> {
        if self.is_comparing() && self.show_reference {
            PlotRoles {
                base: self.reference(),
                overlay: self.selected(),
            }
        } else {
            PlotRoles {
                base: self.selected(),
                overlay: None,
            }
        }
    }

    /// Pick base and overlay from loaded data. Without reference data the
    /// selection is shown alone.
    pub fn assign<T>(&self, reference: Option<T>, selected: Option<T>) -> (Option<T>, Option<T>) {
        match reference {
            Some(reference) if self.is_comparing() && self.show_reference => (Some(reference), selected),
            _ => (selected, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_detection() {
        assert!(is_reference("sim1", "WT baseline"));
        assert!(is_reference("traces-wt", "traces"));
        assert!(!is_reference("traces_wt", "traces"));
        assert!(is_reference("a", "wt"));
        assert!(!is_reference("sim_wt2", "WTX"));
        assert!(!is_reference("newt", "Twitch"));
    }

    #[test]
    fn test_roles_with_reference_shown() {
        let mut sel = ComparisonSelection::new(Some("wt".into()));
        assert_eq!(sel.roles(), PlotRoles { base: Some("wt"), overlay: None });

        sel.select(Some("e999k".into()));
        assert_eq!(sel.roles(), PlotRoles { base: Some("wt"), overlay: Some("e999k") });

        sel.toggle_reference();
        assert_eq!(sel.roles(), PlotRoles { base: Some("e999k"), overlay: None });
    }

    #[test]
    fn test_assign_falls_back_without_reference_data() {
        let mut sel = ComparisonSelection::new(Some("wt".into()));
        sel.select(Some("mut".into()));
        assert_eq!(sel.assign(Some(1), Some(2)), (Some(1), Some(2)));
        assert_eq!(sel.assign(None, Some(2)), (Some(2), None));

        let none = ComparisonSelection::new(None);
        assert_eq!(none.assign(Some(1), Some(2)), (Some(2), None));
    }
}
