// src/heuristics/mod.rs

mod rules;

use rules::Field;
use serde::{Deserialize, Serialize};

/// The structured fields we can pull out of OCR text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFields {
    pub invoice_no: Option<String>,
    pub total: Option<String>,
    pub date: Option<String>,
    pub vendor: Option<String>,
}

impl InvoiceFields {
    /// How many fields were successfully extracted, out of how many.
    pub fn coverage(&self) -> (usize, usize) {
        let filled = [&self.invoice_no, &self.total, &self.date, &self.vendor]
            .iter()
            .filter(|v| v.is_some())
            .count();
        (filled, 4)
    }
}

/// Extract invoice fields from raw text. Pure: no I/O, same input same output.
pub fn extract_invoice_fields(text: &str) -> InvoiceFields {
    InvoiceFields {
        invoice_no: rules::find(Field::InvoiceNo, text),
        total: rules::find(Field::Total, text),
        date: rules::find(Field::Date, text),
        vendor: rules::find(Field::Vendor, text),
    }
}
