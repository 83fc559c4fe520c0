//! Invoice documents produced by the document-parsing service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::InvoiceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub invoice_number: String,
    pub invoice_date: String,
    pub due_date: String,
    #[serde(default)]
    pub po_number: Option<String>,
    pub total_amount_due: f64,
    pub bill_to: Party,
    pub ship_to: Party,
    #[serde(default)]
    pub line_items: Vec<Map<String, Value>>,
    #[serde(default)]
    pub payment_methods: PaymentMethods,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethods {
    #[serde(default)]
    pub bank_transfer: Option<BankTransfer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransfer {
    pub bank_name: String,
    pub account_name: String,
    pub swift_code: String,
}

impl Invoice {
    pub fn from_path(path: &Path) -> Result<Self, InvoiceError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Line-item column names: the union of keys in first-seen order.
    pub fn line_item_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for item in &self.line_items {
            for key in item.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }
}

/// Render a line-item cell; strings unquoted, missing values blank.
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "invoiceNumber": "INV-1042",
        "invoiceDate": "2024-03-01",
        "dueDate": "2024-03-31",
        "poNumber": "PO-77",
        "totalAmountDue": 12450.5,
        "billTo": {"name": "Grand Hotel", "address": "1 Harbour Rd"},
        "shipTo": {"name": "Grand Hotel Annex", "address": "3 Harbour Rd"},
        "lineItems": [
            {"description": "Room nights", "quantity": 10, "amount": 9000},
            {"description": "Catering", "amount": 3450.5, "taxCode": "S"}
        ],
        "paymentMethods": {
            "bankTransfer": {"bankName": "First Bank", "accountName": "Grand Hotel LLC", "swiftCode": "FBKAEAD"}
        },
        "notes": "Thank you for your business."
    }"#;

    #[test]
    fn test_parse_invoice() {
        let invoice: Invoice = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(invoice.invoice_number, "INV-1042");
        assert_eq!(invoice.po_number.as_deref(), Some("PO-77"));
        assert_eq!(invoice.bill_to.name, "Grand Hotel");
        assert_eq!(invoice.line_items.len(), 2);
        let bank = invoice.payment_methods.bank_transfer.unwrap();
        assert_eq!(bank.swift_code, "FBKAEAD");
    }

    #[test]
    fn test_line_item_columns_first_seen_order() {
        let invoice: Invoice = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(
            invoice.line_item_columns(),
            vec!["description", "quantity", "amount", "taxCode"]
        );
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(None), "");
        assert_eq!(cell_text(Some(&Value::String("x".into()))), "x");
        assert_eq!(cell_text(Some(&serde_json::json!(3.5))), "3.5");
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        let err = serde_json::from_str::<Invoice>(r#"{"invoiceNumber": "1"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let invoice = Invoice::from_path(&path).unwrap();
        assert_eq!(invoice.due_date, "2024-03-31");

        let missing = Invoice::from_path(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(InvoiceError::IoError(_))));
    }
}
