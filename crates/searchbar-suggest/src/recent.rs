// Recent searches - bounded, most recent first

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RecentSearches {
    capacity: usize,
    items: VecDeque<String>,
}

impl RecentSearches {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    // remember a submitted query, moving repeats to the front
    pub fn push(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() || self.capacity == 0 {
            return;
        }
        self.items.retain(|item| item != query);
        self.items.push_front(query.to_string());
        self.items.truncate(self.capacity);
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Copy for a `SuggestionContext`.
    pub fn snapshot(&self) -> Vec<String> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_recent_first_and_bounded() {
        let mut recent = RecentSearches::new(2);
        recent.push("a:1");
        recent.push("b:2");
        recent.push("  a:1 ");
        recent.push("c:3");
        assert_eq!(recent.snapshot(), vec!["c:3", "a:1"]);
    }

    #[test]
    fn test_ignores_blank() {
        let mut recent = RecentSearches::new(5);
        recent.push("   ");
        assert!(recent.is_empty());
    }
}
