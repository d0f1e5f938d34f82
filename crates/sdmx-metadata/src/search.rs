//! Free-text search over dataflows.
//!
//! Query syntax: `|` separates alternatives, whitespace or `+` joins required
//! terms, and double quotes keep a phrase together. Common stop words are
//! ignored.

const STOP_WORDS: &[&str] = &[
    "of", "the", "a", "an", "is", "are", "in", "on", "for", "with", "and", "or",
];

/// A parsed query: any group matches when all of its terms match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub groups: Vec<Vec<String>>,
}

impl SearchQuery {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Case-insensitive match against a piece of text.
    pub fn matches(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.groups
            .iter()
            .any(|group| group.iter().all(|term| haystack.contains(term.as_str())))
    }
}

/// Parses a search query into OR-groups of AND-terms.
pub fn parse_search_query(query: &str) -> SearchQuery {
    let groups = query
        .split('|')
        .map(parse_group)
        .filter(|group| !group.is_empty())
        .collect();
    SearchQuery { groups }
}

fn parse_group(part: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;

    for ch in part.chars().chain(std::iter::once(' ')) {
        match ch {
            '"' if in_quote => {
                let phrase = current.trim().to_lowercase();
                if !phrase.is_empty() {
                    terms.push(phrase);
                }
                current.clear();
                in_quote = false;
            }
            '"' => {
                push_word(&mut terms, &current);
                current.clear();
                in_quote = true;
            }
            c if !in_quote && (c.is_whitespace() || c == '+') => {
                push_word(&mut terms, &current);
                current.clear();
            }
            c => current.push(c),
        }
    }
    if in_quote {
        push_word(&mut terms, &current);
    }
    terms
}

fn push_word(terms: &mut Vec<String>, raw: &str) {
    let word: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect::<String>()
        .to_lowercase();
    if !word.is_empty() && !STOP_WORDS.contains(&word.as_str()) {
        terms.push(word);
    }
}
