//! Text helpers shared by executors and the engine: normalization,
//! templating, quantity parsing and poll option hashing.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::context::Context;

static TEMPLATE_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid regex"));

static LEADING_QUANTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:quiero\s+|dame\s+|necesito\s+)?(\d+(?:[.,]\d+)?)\s*(?:x\s+|unidades?\s+(?:de\s+)?|de\s+)?(.*)$")
        .expect("valid regex")
});

static TRAILING_QUANTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.*?)\s*x?\s*(\d+(?:[.,]\d+)?)$").expect("valid regex"));

static LINE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*(?:[,;\n]|\by\b)\s*").expect("valid regex"));

/// Replace common Latin diacritics with their base letter.
pub fn fold_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
            'Á' | 'À' | 'Ä' | 'Â' | 'Ã' => 'A',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
            'Ó' | 'Ò' | 'Ö' | 'Ô' | 'Õ' => 'O',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ç' => 'c',
            'Ç' => 'C',
            other => other,
        })
        .collect()
}

/// Trim, lower-case, fold diacritics and collapse inner whitespace.
pub fn normalize(s: &str) -> String {
    fold_diacritics(&s.to_lowercase())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Substitute `{{var}}` placeholders from the context. Missing variables
/// render as an empty string.
pub fn render_template(template: &str, ctx: &Context) -> String {
    TEMPLATE_VAR
        .replace_all(template, |caps: &regex::Captures<'_>| {
            ctx.text(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse().ok()
}

/// Split "2 manzanas" / "manzanas x2" / "manzanas" into `(quantity, term)`.
/// The quantity defaults to 1.
pub fn parse_quantity_and_term(text: &str) -> (f64, String) {
    let text = text.trim();

    if let Some(caps) = LEADING_QUANTITY.captures(text) {
        let term = caps[2].trim();
        if let (Some(qty), false) = (parse_number(&caps[1]), term.is_empty()) {
            return (qty, term.to_owned());
        }
    }

    if let Some(caps) = TRAILING_QUANTITY.captures(text) {
        let term = caps[1].trim();
        if let (Some(qty), false) = (parse_number(&caps[2]), term.is_empty()) {
            return (qty, term.to_owned());
        }
    }

    (1.0, text.to_owned())
}

/// A comma between two digits is a decimal separator, not a line break.
fn decimal_commas_to_points(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let between_digits = i > 0
                && chars[i - 1].is_ascii_digit()
                && chars.get(i + 1).is_some_and(char::is_ascii_digit);
            if c == ',' && between_digits {
                '.'
            } else {
                c
            }
        })
        .collect()
}

/// Split a free-text order into `(quantity, term)` lines.
pub fn parse_order_lines(text: &str) -> Vec<(f64, String)> {
    LINE_SEPARATOR
        .split(&decimal_commas_to_points(text))
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(parse_quantity_and_term)
        .filter(|(qty, term)| *qty > 0.0 && !term.is_empty())
        .collect()
}

/// Content hash of a poll option as sent by the messaging network:
/// lower-case hex SHA-256 of the option text.
pub fn poll_option_hash(option: &str) -> String {
    format!("{:x}", Sha256::digest(option.as_bytes()))
}

/// Whether a supplied vote hash designates `option`: case-insensitive
/// equality, or either hash containing the other.
pub fn poll_hash_matches(option: &str, supplied: &str) -> bool {
    let supplied = supplied.trim().to_lowercase();
    if supplied.is_empty() {
        return false;
    }
    let computed = poll_option_hash(option);
    computed == supplied || computed.contains(&supplied) || supplied.contains(&computed)
}

/// Resolve a poll answer: a 1-based index, or a case/diacritic-insensitive
/// exact match on the option text.
pub fn resolve_poll_option(input: &str, options: &[String]) -> Option<String> {
    let trimmed = input.trim();

    if let Ok(index) = trimmed.parse::<usize>() {
        if (1..=options.len()).contains(&index) {
            return Some(options[index - 1].clone());
        }
    }

    let wanted = normalize(trimmed);
    options
        .iter()
        .find(|option| normalize(option) == wanted)
        .cloned()
}

/// `1. a\n2. b`
pub fn numbered_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_money(amount: f64) -> String {
    format!("${amount:.2}")
}

/// Quantities print without a fraction when whole.
pub fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{}", quantity as i64)
    } else {
        format!("{quantity}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_folds_case_accents_and_spaces() {
        assert_eq!(normalize("  Menú   PRINCIPAL "), "menu principal");
        assert_eq!(normalize("SÍ"), "si");
    }

    #[test]
    fn template_substitutes_known_and_blanks_unknown() {
        let mut ctx = Context::new();
        ctx.insert("nombre", "Lucas");
        ctx.insert("total", 12.0);
        assert_eq!(
            render_template("Hola {{nombre}}, total {{ total }}{{missing}}", &ctx),
            "Hola Lucas, total 12"
        );
    }

    #[test]
    fn quantities_are_parsed_in_several_shapes() {
        assert_eq!(parse_quantity_and_term("2 manzanas"), (2.0, "manzanas".into()));
        assert_eq!(parse_quantity_and_term("3x leche"), (3.0, "leche".into()));
        assert_eq!(parse_quantity_and_term("quiero 1,5 kg papas"), (1.5, "kg papas".into()));
        assert_eq!(parse_quantity_and_term("pan x4"), (4.0, "pan".into()));
        assert_eq!(parse_quantity_and_term("yerba"), (1.0, "yerba".into()));
    }

    #[test]
    fn order_text_splits_into_lines() {
        let lines = parse_order_lines("2 manzanas, 1 leche y pan");
        assert_eq!(
            lines,
            vec![
                (2.0, "manzanas".to_string()),
                (1.0, "leche".to_string()),
                (1.0, "pan".to_string()),
            ]
        );
    }

    #[test]
    fn decimal_comma_does_not_split_an_order_line() {
        assert_eq!(
            parse_order_lines("1,5 kg papas, 2 manzanas"),
            vec![(1.5, "kg papas".to_string()), (2.0, "manzanas".to_string())]
        );
        assert_eq!(
            parse_order_lines("2 pan,1 leche"),
            vec![(2.0, "pan".to_string()), (1.0, "leche".to_string())]
        );
    }

    #[test]
    fn poll_answers_resolve_by_index_or_text() {
        let opts = options(&["Sí", "No"]);
        assert_eq!(resolve_poll_option("1", &opts).as_deref(), Some("Sí"));
        assert_eq!(resolve_poll_option("no", &opts).as_deref(), Some("No"));
        assert_eq!(resolve_poll_option("si", &opts).as_deref(), Some("Sí"));
        assert_eq!(resolve_poll_option("3", &opts), None);
        assert_eq!(resolve_poll_option("0", &opts), None);
    }

    #[test]
    fn poll_hash_matching_is_case_insensitive_and_partial() {
        let full = poll_option_hash("No");
        assert!(poll_hash_matches("No", &full.to_uppercase()));
        assert!(poll_hash_matches("No", &full[..16]));
        assert!(poll_hash_matches("No", &format!("0x{full}")));
        assert!(!poll_hash_matches("Sí", &full));
        assert!(!poll_hash_matches("No", ""));
    }
}
