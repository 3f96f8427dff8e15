use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

/// Scalar invoice fields the extractor knows how to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    InvoiceNo,
    Total,
    Date,
    Vendor,
}

/// Ordered pattern alternatives per field. Earlier entries win, so the
/// order encodes which invoice layout takes priority.
const RULES: &[(Field, &[&str])] = &[
    (
        Field::InvoiceNo,
        &[
            r"Invoice\s*No[:\s]*([A-Z0-9-]+)",
            r"Invoice\s*#[:\s]*([A-Z0-9-]+)",
            r"Facture\s*No[:\s]*([A-Z0-9/]+)",
        ],
    ),
    (
        Field::Total,
        &[
            r"Total[:\s]*\$?([\d,]+\.\d{2})",
            r"Amount\s*Due[:\s]*\$?([\d,]+\.\d{2})",
        ],
    ),
    (
        Field::Date,
        &[
            r"Date[:\s]*([0-9]{2}[/-][0-9]{2}[/-][0-9]{4})",
            r"([0-9]{4}[/-][0-9]{2}[/-][0-9]{2})",
        ],
    ),
    (
        Field::Vendor,
        &[
            r"Vendor[:\s]*(.*)",
            r"From[:\s]*(.*)",
            r"Invoice\s*from[:\s]*(.*)",
        ],
    ),
];

static COMPILED: LazyLock<Vec<(Field, Vec<Regex>)>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|(field, patterns)| {
            let compiled = patterns
                .iter()
                .map(|p| {
                    RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .expect("built-in invoice pattern must compile")
                })
                .collect();
            (*field, compiled)
        })
        .collect()
});

/// First-match-wins lookup of `field` in `text`.
pub fn find(field: Field, text: &str) -> Option<String> {
    let (_, patterns) = COMPILED.iter().find(|(f, _)| *f == field)?;
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}
