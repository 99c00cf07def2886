use serde_json::{json, Value};

/// Accept/reject sets over category names.
///
/// A name is never in both sets. Accepting a rejected name only removes it
/// from the rejected set, and rejecting an accepted name only removes it from
/// the accepted set, which mirrors how selections are toggled in a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    accepted: Vec<String>,
    rejected: Vec<String>,
    reject_all: bool,
}

impl CategoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if let Some(index) = self.rejected.iter().position(|n| *n == name) {
                self.rejected.remove(index);
            } else if !self.accepted.contains(&name) {
                self.accepted.push(name);
            }
        }
        self.reject_all = false;
    }

    pub fn reject<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if let Some(index) = self.accepted.iter().position(|n| *n == name) {
                self.accepted.remove(index);
            } else if !self.rejected.contains(&name) {
                self.rejected.push(name);
            }
        }
    }

    pub fn accept_all(&mut self) {
        self.clean_filter();
    }

    pub fn reject_all(&mut self) {
        self.clean_filter();
        self.reject_all = true;
    }

    /// Drop every accepted/rejected name and the reject-all flag.
    pub fn clean_filter(&mut self) {
        self.accepted.clear();
        self.rejected.clear();
        self.reject_all = false;
    }

    pub fn is_rejected(&self, name: &str) -> bool {
        if self.rejected.iter().any(|n| n == name) {
            return true;
        }
        if !self.accepted.is_empty() {
            return !self.accepted.iter().any(|n| n == name);
        }
        self.reject_all
    }

    pub fn is_all_rejected(&self) -> bool {
        self.reject_all
    }

    pub fn accepted(&self) -> &[String] {
        &self.accepted
    }

    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.rejected.is_empty() && !self.reject_all
    }

    /// `{accept: [..]}` or `{reject: [..]}`; rejecting everything is an empty
    /// accept list.
    pub fn to_json(&self) -> Value {
        if self.reject_all {
            json!({ "accept": [] })
        } else if !self.accepted.is_empty() {
            json!({ "accept": self.accepted })
        } else if !self.rejected.is_empty() {
            json!({ "reject": self.rejected })
        } else {
            json!({})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_and_reject_are_exclusive() {
        let mut filter = CategoryFilter::new();
        filter.reject(["A", "B"]);
        assert_eq!(filter.to_json(), json!({ "reject": ["A", "B"] }));

        filter.accept(["A"]);
        assert_eq!(filter.rejected(), ["B"]);
        assert!(filter.accepted().is_empty());
        assert!(filter.is_rejected("B"));
        assert!(!filter.is_rejected("A"));
    }

    #[test]
    fn test_accepted_names_reject_everything_else() {
        let mut filter = CategoryFilter::new();
        filter.accept(["A", "B", "A"]);
        assert_eq!(filter.to_json(), json!({ "accept": ["A", "B"] }));
        assert!(!filter.is_rejected("A"));
        assert!(filter.is_rejected("C"));

        filter.reject(["A"]);
        assert_eq!(filter.accepted(), ["B"]);
    }

    #[test]
    fn test_reject_all() {
        let mut filter = CategoryFilter::new();
        filter.accept(["A"]);
        filter.reject_all();
        assert!(filter.is_rejected("A"));
        assert!(filter.is_rejected("anything"));
        assert!(!filter.is_empty());
        assert_eq!(filter.to_json(), json!({ "accept": [] }));

        filter.accept_all();
        assert!(filter.is_empty());
        assert_eq!(filter.to_json(), json!({}));
    }
}
