//! Small text transforms applied to user input before it reaches a query.

/// Trims and collapses every whitespace run to a single space.
/// Returns `None` when nothing is left.
pub fn normalize_query(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Uppercases the first character and every character that follows a space;
/// everything else is lowercased.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut capitalize = true;
    for ch in input.chars() {
        if capitalize {
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
        capitalize = ch == ' ';
    }
    out
}

/// The price stage only runs when the whole term is an integer.
pub fn parse_price_ceiling(term: &str) -> Option<i64> {
    term.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_and_trims() {
        assert_eq!(normalize_query("  the   cottage ").as_deref(), Some("the cottage"));
        assert_eq!(normalize_query("a\t\n b").as_deref(), Some("a b"));
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert_eq!(normalize_query(""), None);
        assert_eq!(normalize_query("   \t "), None);
    }

    #[test]
    fn title_cases_words() {
        assert_eq!(title_case("the cottage"), "The Cottage");
        assert_eq!(title_case("bEACH HOUSE in goa"), "Beach House In Goa");
        assert_eq!(title_case("o'neil's-place"), "O'neil's-place");
    }

    #[test]
    fn normalized_then_title_cased() {
        let term = normalize_query("  the   cottage ").map(|q| title_case(&q));
        assert_eq!(term.as_deref(), Some("The Cottage"));
    }

    #[test]
    fn digits_survive_title_case() {
        assert_eq!(title_case("500"), "500");
        assert_eq!(parse_price_ceiling(&title_case("500")), Some(500));
    }

    #[test]
    fn non_integers_skip_price_stage() {
        assert_eq!(parse_price_ceiling("500 Rupees"), None);
        assert_eq!(parse_price_ceiling("12.5"), None);
        assert_eq!(parse_price_ceiling("Goa"), None);
    }
}
