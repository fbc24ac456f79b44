use once_cell::sync::Lazy;
use regex::Regex;

/// Category and free-text restrictions applied to a note listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub category: Option<String>,
    pub query: Option<String>,
}

/// A `WHERE` fragment with positional placeholders and the values bound to
/// them, in placeholder order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub clause: Option<String>,
    pub args: Vec<String>,
}

impl NoteFilter {
    /// Empty strings count as absent.
    pub fn new(category: Option<&str>, query: Option<&str>) -> Self {
        Self {
            category: category
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            query: query.filter(|value| !value.is_empty()).map(str::to_string),
        }
    }

    pub fn selection(&self) -> Selection {
        let mut conditions = Vec::new();
        let mut args = Vec::new();
        if let Some(category) = &self.category {
            args.push(category.clone());
            conditions.push(format!("category = ?{}", args.len()));
        }
        if let Some(query) = &self.query {
            args.push(query.clone());
            let n = args.len();
            // instr() is case-sensitive and needs no wildcard escaping.
            conditions.push(format!("(instr(title, ?{n}) > 0 OR instr(body, ?{n}) > 0)"));
        }
        Selection {
            clause: if conditions.is_empty() {
                None
            } else {
                Some(conditions.join(" AND "))
            },
            args,
        }
    }
}

/// Parses `category:Work budget` style input. `category:"Two words"` quotes a
/// name containing spaces; the last category token wins and the remaining
/// words form the search text.
pub fn parse_filter(input: &str) -> NoteFilter {
    static CATEGORY_TOKEN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"(?:^|\s)category:(?:"([^"]*)"|(\S+))"#).expect("valid category token regex")
    });

    let mut category = None;
    for caps in CATEGORY_TOKEN.captures_iter(input) {
        if let Some(value) = caps.get(1).or_else(|| caps.get(2)) {
            category = Some(value.as_str().to_string());
        }
    }
    let remainder = CATEGORY_TOKEN.replace_all(input, " ");
    let text = remainder.split_whitespace().collect::<Vec<_>>().join(" ");

    NoteFilter::new(category.as_deref(), Some(text.as_str()))
}

/// Transient filter/search state of one list view session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    category: Option<String>,
    query: Option<String>,
}

impl FilterState {
    pub fn apply_category(&mut self, category: &str) {
        self.category = Some(category.to_string()).filter(|value| !value.is_empty());
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = Some(query.to_string()).filter(|value| !value.is_empty());
    }

    pub fn clear(&mut self) {
        self.category = None;
        self.query = None;
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn filter(&self) -> NoteFilter {
        NoteFilter::new(self.category(), self.query())
    }

    pub fn heading(&self) -> String {
        match &self.category {
            Some(category) => format!("Notes - {category}"),
            None => String::from("Notes"),
        }
    }

    /// Text shown when the current listing is empty.
    pub fn empty_message(&self) -> &'static str {
        if self.category.is_some() {
            "No notes in this category"
        } else if self.query.is_some() {
            "No matching notes"
        } else {
            "No notes yet. Create one to get started"
        }
    }
}
