//! Query planning
//!
//! Decomposes an incoming query into sub-tasks by two independent
//! mechanisms that may both apply: explicit multi-intent splitting on
//! enumerations, newlines and "and also" joins, and pattern-based
//! extraction of structured intents (dates, month+year, known places,
//! transcript cues). A query matching nothing becomes a single generic
//! sub-task. Sub-tasks are immutable once planned.

use seekr_common::model::{NewsScope, SubTask, TaskKind};
use uuid::Uuid;

/// Countries recognized for country-scope news tasks
const COUNTRIES: &[&str] = &[
    "india", "united states", "usa", "united kingdom", "uk", "france", "germany", "japan",
    "china", "australia", "canada", "brazil", "russia", "italy", "spain", "mexico",
    "south korea", "indonesia", "pakistan", "nigeria", "egypt",
];

/// Cities recognized for city-scope news tasks
const CITIES: &[&str] = &[
    "new delhi", "delhi", "mumbai", "bangalore", "hyderabad", "chennai", "kolkata",
    "london", "paris", "new york", "tokyo", "berlin", "sydney", "toronto",
    "san francisco", "los angeles", "chicago", "beijing", "shanghai", "singapore", "dubai",
];

const MONTHS: &[&str] = &[
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

/// Plan an incoming query into one or more sub-tasks
pub fn plan(query: &str) -> Vec<SubTask> {
    let fragments = split_intents(query);

    let mut tasks: Vec<SubTask> = fragments.iter().map(|f| classify(f)).collect();

    if tasks.is_empty() {
        tasks.push(SubTask::generic(query.trim()));
    }
    tasks
}

/// Explicit multi-intent splitting: newlines, semicolons, numbered
/// enumerations and "and also" joins
pub fn split_intents(query: &str) -> Vec<String> {
    let mut fragments = Vec::new();

    for piece in query.split(['\n', ';']) {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }

        for enumerated in split_enumeration(piece) {
            for fragment in split_and_also(&enumerated) {
                let fragment = fragment.trim();
                if fragment.chars().count() >= 3 {
                    fragments.push(fragment.to_string());
                }
            }
        }
    }

    fragments
}

/// Split "1. foo 2. bar" style enumerations; anything without at
/// least two numbered markers passes through unchanged
fn split_enumeration(text: &str) -> Vec<String> {
    let marker = regex_lite::Regex::new(r"\s*\d+[.)]\s+").unwrap();

    let markers = marker.find_iter(text).count();
    if markers < 2 {
        return vec![text.to_string()];
    }

    marker
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_and_also(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    if let Some(pos) = lower.find(" and also ") {
        let (head, tail) = text.split_at(pos);
        return vec![head.to_string(), tail[" and also ".len()..].to_string()];
    }
    vec![text.to_string()]
}

/// Pattern-based classification of one fragment
fn classify(fragment: &str) -> SubTask {
    let lower = fragment.to_lowercase();

    let year = extract_year(&lower);
    let month = extract_month(&lower);
    let date = extract_date(&lower);

    if is_transcript(&lower) {
        return SubTask {
            id: Uuid::new_v4(),
            kind: TaskKind::Transcript,
            query: fragment.to_string(),
            place: None,
            scope: None,
            date,
            month,
            year,
            title: Some(transcript_title(fragment)),
        };
    }

    if lower.contains("news") {
        if let Some((place, scope)) = find_place(&lower) {
            return SubTask {
                id: Uuid::new_v4(),
                kind: TaskKind::News,
                query: fragment.to_string(),
                place: Some(place),
                scope: Some(scope),
                date,
                month,
                year,
                title: None,
            };
        }
    }

    SubTask {
        id: Uuid::new_v4(),
        kind: TaskKind::Generic,
        query: fragment.to_string(),
        place: None,
        scope: None,
        date,
        month,
        year,
        title: None,
    }
}

fn is_transcript(lower: &str) -> bool {
    lower.contains("transcript") || lower.contains("full speech") || lower.contains("full text of")
}

/// Strip the transcript cue words so the remainder names the event
fn transcript_title(fragment: &str) -> String {
    let lower = fragment.to_lowercase();
    for prefix in [
        "full transcript of",
        "transcript of",
        "full speech of",
        "full text of",
        "transcript",
    ] {
        if let Some(pos) = lower.find(prefix) {
            let title = fragment[pos + prefix.len()..].trim();
            if !title.is_empty() {
                return title.to_string();
            }
        }
    }
    fragment.trim().to_string()
}

/// Cities are checked before countries: "news in Delhi, India" scopes
/// to the city. Longer names win over their substrings.
fn find_place(lower: &str) -> Option<(String, NewsScope)> {
    let mut cities: Vec<&str> = CITIES.to_vec();
    cities.sort_by_key(|c| std::cmp::Reverse(c.len()));
    for city in cities {
        if contains_word(lower, city) {
            return Some((city.to_string(), NewsScope::City));
        }
    }

    let mut countries: Vec<&str> = COUNTRIES.to_vec();
    countries.sort_by_key(|c| std::cmp::Reverse(c.len()));
    for country in countries {
        if contains_word(lower, country) {
            return Some((country.to_string(), NewsScope::Country));
        }
    }

    None
}

/// Word-boundary containment; avoids "uk" matching inside "ukulele"
fn contains_word(haystack: &str, needle: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !haystack[..abs]
                .chars()
                .next_back()
                .is_some_and(char::is_alphanumeric);
        let after = abs + needle.len();
        let after_ok = after >= haystack.len()
            || !haystack[after..]
                .chars()
                .next()
                .is_some_and(char::is_alphanumeric);
        if before_ok && after_ok {
            return true;
        }
        start = abs + needle.len();
    }
    false
}

fn extract_year(lower: &str) -> Option<i32> {
    let re = regex_lite::Regex::new(r"\b(19|20)\d{2}\b").unwrap();
    re.find(lower).and_then(|m| m.as_str().parse().ok())
}

fn extract_month(lower: &str) -> Option<String> {
    MONTHS
        .iter()
        .find(|m| contains_word(lower, m))
        .map(|m| m.to_string())
}

fn extract_date(lower: &str) -> Option<String> {
    let re = regex_lite::Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b").unwrap();
    re.find(lower).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_generic_task() {
        let tasks = plan("capital of France");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind, TaskKind::Generic);
        assert_eq!(tasks[0].query, "capital of France");
    }

    #[test]
    fn test_multi_intent_news_and_transcript() {
        let tasks =
            plan("latest news in India today\nfull transcript of Steve Jobs 2007 iPhone launch");

        assert!(tasks.len() >= 2);
        assert_eq!(tasks[0].kind, TaskKind::News);
        assert_eq!(tasks[0].scope, Some(NewsScope::Country));
        assert_eq!(tasks[0].place.as_deref(), Some("india"));

        assert_eq!(tasks[1].kind, TaskKind::Transcript);
        assert_eq!(tasks[1].year, Some(2007));
        assert_eq!(
            tasks[1].title.as_deref(),
            Some("Steve Jobs 2007 iPhone launch")
        );
    }

    #[test]
    fn test_city_scope_beats_country() {
        let tasks = plan("latest news in New Delhi, India");
        assert_eq!(tasks[0].kind, TaskKind::News);
        assert_eq!(tasks[0].scope, Some(NewsScope::City));
        assert_eq!(tasks[0].place.as_deref(), Some("new delhi"));
    }

    #[test]
    fn test_enumeration_split() {
        let tasks = plan("1. history of Rome 2. weather in Paris today");
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].query, "history of Rome");
    }

    #[test]
    fn test_and_also_split() {
        let tasks = plan("population of Japan and also GDP of Germany");
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn test_month_year_extraction() {
        let tasks = plan("news in France from March 2024");
        assert_eq!(tasks[0].kind, TaskKind::News);
        assert_eq!(tasks[0].month.as_deref(), Some("march"));
        assert_eq!(tasks[0].year, Some(2024));
    }

    #[test]
    fn test_explicit_date_extraction() {
        let tasks = plan("news in Japan on 12/05/2024");
        assert_eq!(tasks[0].date.as_deref(), Some("12/05/2024"));
    }

    #[test]
    fn test_news_without_place_stays_generic() {
        let tasks = plan("news about the rust programming language");
        assert_eq!(tasks[0].kind, TaskKind::Generic);
    }

    #[test]
    fn test_word_boundary_place_matching() {
        // "ukulele" must not match the country "uk"
        let tasks = plan("latest news about ukulele makers");
        assert_eq!(tasks[0].kind, TaskKind::Generic);
    }

    #[test]
    fn test_empty_query_yields_generic_task() {
        let tasks = plan("   ");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind, TaskKind::Generic);
    }
}
