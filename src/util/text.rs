use std::sync::LazyLock;

use regex::Regex;

static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((.*?)\)").expect("parenthesized-group pattern is valid"));

/// Email header prefixes that mark a pasted message rather than a name. Case-sensitive.
const HEADER_PREFIXES: &[&str] = &["Re:", "Fwd:", "Subject:", "From:"];

/// Greeting openers (Spanish), matched case-insensitively at the start of the line.
const GREETING_PREFIXES: &[&str] = &["hola", "buenos", "buen", "estimado"];

const POLICY_LEN: usize = 12;

/// Return the text inside the first `(...)` group of `name`, or `name` unchanged.
pub fn clean_card_name(name: &str) -> String {
    match PARENTHESIZED.captures(name).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().to_string(),
        None => name.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameExtraction {
    pub person_name: Option<String>,
    pub policy_number: String,
    pub should_process: bool,
}

/// Pull a person's name from the first line of `description` and a policy
/// number from the tail of the card `name`.
pub fn extract_name_and_policy(name: &str, description: &str) -> NameExtraction {
    let policy_number = last_chars(name, POLICY_LEN);

    let first_line = description.split('\n').next().unwrap_or_default().trim();

    if looks_like_person_name(first_line) {
        NameExtraction {
            person_name: Some(first_line.to_string()),
            policy_number,
            should_process: true,
        }
    } else {
        NameExtraction {
            person_name: None,
            policy_number,
            should_process: false,
        }
    }
}

fn looks_like_person_name(line: &str) -> bool {
    if line.is_empty() || line.split_whitespace().count() < 2 {
        return false;
    }
    if HEADER_PREFIXES.iter().any(|p| line.starts_with(p)) {
        return false;
    }
    let lower = line.to_lowercase();
    !GREETING_PREFIXES.iter().any(|g| lower.starts_with(g))
}

fn last_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_extracts_parenthesized_name() {
        assert_eq!(clean_card_name("Renewal (John Smith)"), "John Smith");
    }

    #[test]
    fn clean_leaves_plain_name() {
        assert_eq!(clean_card_name("No Parens Here"), "No Parens Here");
    }

    #[test]
    fn clean_uses_first_group_only() {
        assert_eq!(clean_card_name("A (first) B (second)"), "first");
    }

    #[test]
    fn clean_handles_empty_group() {
        assert_eq!(clean_card_name("Broken ()"), "");
    }

    #[test]
    fn clean_ignores_unclosed_paren() {
        assert_eq!(clean_card_name("Half (open"), "Half (open");
    }

    #[test]
    fn extract_name_and_policy_from_description() {
        let got = extract_name_and_policy("SUBJ-000123456789", "Juan Perez\nmore text");
        assert_eq!(got.person_name.as_deref(), Some("Juan Perez"));
        assert_eq!(got.policy_number, "000123456789");
        assert!(got.should_process);
    }

    #[test]
    fn extract_trims_first_line() {
        let got = extract_name_and_policy("SUBJ-000123456789", "   Maria Lopez Garcia  \r\n");
        assert_eq!(got.person_name.as_deref(), Some("Maria Lopez Garcia"));
        assert!(got.should_process);
    }

    #[test]
    fn extract_skips_greeting() {
        let got = extract_name_and_policy("whatever", "Hola, this is fine");
        assert!(!got.should_process);
        assert_eq!(got.person_name, None);
    }

    #[test]
    fn extract_greeting_is_case_insensitive() {
        for line in ["BUENOS dias equipo", "Buen dia a todos", "estimado cliente"] {
            assert!(!extract_name_and_policy("x", line).should_process, "{line}");
        }
    }

    #[test]
    fn extract_skips_header_prefix() {
        let got = extract_name_and_policy("whatever", "Re: your policy");
        assert!(!got.should_process);
    }

    #[test]
    fn extract_header_prefix_is_case_sensitive() {
        let got = extract_name_and_policy("whatever", "re: your policy");
        assert!(got.should_process);
        assert_eq!(got.person_name.as_deref(), Some("re: your policy"));
    }

    #[test]
    fn extract_skips_single_token() {
        assert!(!extract_name_and_policy("x", "Juan\nPerez").should_process);
    }

    #[test]
    fn extract_skips_empty_description() {
        let got = extract_name_and_policy("SUBJ-000123456789", "");
        assert!(!got.should_process);
        assert_eq!(got.policy_number, "000123456789");
    }

    #[test]
    fn extract_skips_blank_first_line() {
        assert!(!extract_name_and_policy("x", "\nJuan Perez").should_process);
    }

    #[test]
    fn policy_is_whole_name_when_short() {
        let got = extract_name_and_policy("AB", "Juan Perez");
        assert_eq!(got.policy_number, "AB");
        assert!(got.should_process);
    }

    #[test]
    fn policy_counts_chars_not_bytes() {
        let got = extract_name_and_policy("Póliza-ñ12345678901", "Juan Perez");
        assert_eq!(got.policy_number, "ñ12345678901");
    }
}
