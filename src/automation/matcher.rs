use std::sync::OnceLock;

use regex::Regex;

use crate::store::models::Resource;

/// One `key=value` term of a tag query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Compare { key: String, value: String },
    /// A term without `=`. Always satisfied.
    Malformed(String),
}

fn and_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:^|\s+)AND(?:\s+|$)").expect("static regex"))
}

/// Split a tag query into clauses.
///
/// An empty or blank query yields no clauses. A leading or trailing `AND`
/// yields an empty clause, which parses as `Malformed("")`.
pub fn parse(query: &str) -> Vec<Clause> {
    let query = query.trim();
    if query.is_empty() {
        return vec![];
    }
    and_separator()
        .split(query)
        .map(|term| {
            let term = term.trim();
            match term.split_once('=') {
                Some((key, value)) => Clause::Compare {
                    key: key.trim().to_string(),
                    value: unquote(value.trim()).to_string(),
                },
                None => Clause::Malformed(term.to_string()),
            }
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Whether `resource` satisfies every clause of `query`.
pub fn matches(resource: &Resource, query: &str) -> bool {
    parse(query).iter().all(|clause| clause_matches(resource, clause))
}

fn clause_matches(resource: &Resource, clause: &Clause) -> bool {
    match clause {
        Clause::Malformed(_) => true,
        Clause::Compare { key, value } => lookup(resource, key).to_lowercase() == value.to_lowercase(),
    }
}

fn lookup(resource: &Resource, key: &str) -> String {
    let lowered = key.to_lowercase();
    match lowered.as_str() {
        "type" => resource.resource_type.clone(),
        "provider" => resource.provider.clone(),
        "region" => resource.region.clone(),
        k if k.starts_with("tags.") => key
            .get("tags.".len()..)
            .and_then(|name| resource.tags.get(name))
            .cloned()
            .unwrap_or_default(),
        _ => resource.field(key),
    }
}
