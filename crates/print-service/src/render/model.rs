//! Canonical document model shared by both render paths
//!
//! Everything a layout needs is precomputed here: formatted amounts, the
//! payment settlement, the item descriptor line and the invoice number.
//! Templates and the thermal layout only place strings.

use chrono::{DateTime, Local, NaiveDate};
use print_common::{format_number, PaymentMethod, PrintRequest, PrintRole};
use serde::Serialize;
use uuid::Uuid;

use crate::config::StoreProfile;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreView {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub footer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerView {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemView {
    /// 1-based position
    pub number: usize,
    pub code: String,
    pub name: String,
    pub quantity: u32,
    pub purity: Option<String>,
    pub weight: Option<String>,
    /// `code|purity|weight`, skipping empty parts
    pub descriptor: String,
    pub price: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentView {
    /// "Lunas" or "DP"
    pub method: String,
    pub channel: Option<String>,
    pub deposit: Option<String>,
    /// Absent once nothing is owed
    pub remainder: Option<String>,
    pub fully_paid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentModel {
    pub role: PrintRole,
    pub title: String,
    pub store: StoreView,
    pub invoice_number: Option<String>,
    pub date: String,
    pub sales_name: Option<String>,
    pub customer: Option<CustomerView>,
    pub items: Vec<ItemView>,
    pub total: String,
    pub payment: PaymentView,
    pub notes: Option<String>,
    pub copies: u32,
}

impl DocumentModel {
    /// Normalize a validated request for rendering.
    ///
    /// Invoices without a number get a generated one dated `now`.
    pub fn build(request: &PrintRequest, store: &StoreProfile, now: DateTime<Local>) -> Self {
        let prefix = store.currency_prefix.as_str();
        let settlement = request.settlement();

        let invoice_number = request.invoice_number.clone().or_else(|| {
            (request.role == PrintRole::Invoice).then(|| generate_invoice_number(now.date_naive()))
        });

        let customer = request
            .customer
            .as_ref()
            .filter(|c| c.name.is_some() || c.phone.is_some() || c.address.is_some())
            .map(|c| CustomerView {
                name: c.name.clone(),
                phone: c.phone.clone(),
                address: c.address.clone(),
            });

        let items = request
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let weight = item.weight.map(format_weight);
                let descriptor = [Some(item.code.trim()), item.purity.as_deref(), weight.as_deref()]
                    .into_iter()
                    .flatten()
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join("|");

                ItemView {
                    number: index + 1,
                    code: item.code.trim().to_string(),
                    name: item.name.trim().to_string(),
                    quantity: item.quantity,
                    purity: item.purity.clone(),
                    weight,
                    descriptor,
                    price: format_currency(item.price, prefix),
                    description: item.description.clone(),
                }
            })
            .collect();

        let method = match request.payment.payment_method {
            PaymentMethod::Full => "Lunas",
            PaymentMethod::Deposit => "DP",
        };

        Self {
            role: request.role,
            title: title_for(request.role).to_string(),
            store: StoreView {
                name: store.name.clone(),
                address: store.address.clone(),
                phone: store.phone.clone(),
                footer: store.footer.clone(),
            },
            invoice_number,
            date: request
                .date
                .clone()
                .unwrap_or_else(|| now.format("%d/%m/%Y %H:%M").to_string()),
            sales_name: request.sales_name.clone(),
            customer,
            items,
            total: format_currency(request.total(), prefix),
            payment: PaymentView {
                method: method.to_string(),
                channel: request.payment.channel.clone(),
                deposit: settlement.deposit.map(|d| format_currency(d, prefix)),
                remainder: (!settlement.fully_paid)
                    .then(|| format_currency(settlement.remainder, prefix)),
                fully_paid: settlement.fully_paid,
            },
            notes: request.notes.clone(),
            copies: request.copies(),
        }
    }
}

fn title_for(role: PrintRole) -> &'static str {
    match role {
        PrintRole::Receipt => "NOTA PENJUALAN",
        PrintRole::Invoice => "INVOICE",
        PrintRole::ServiceNote => "NOTA SERVIS",
        PrintRole::CustomNote => "NOTA PESANAN",
    }
}

/// `INV-YYYYMMDD-XXXXXX` with six random upper-case hex characters
pub fn generate_invoice_number(date: NaiveDate) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect();
    format!("INV-{}-{}", date.format("%Y%m%d"), suffix.to_uppercase())
}

pub fn format_currency(amount: i64, prefix: &str) -> String {
    format!("{}{}", prefix, format_number(amount))
}

/// Grams with trailing zeros trimmed: `3.25g`, `5g`
pub fn format_weight(grams: f64) -> String {
    let fixed = format!("{:.3}", grams);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{}g", trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use print_common::{Customer, LineItem, Payment};

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 12, 10, 30, 0).unwrap()
    }

    fn request(role: PrintRole) -> PrintRequest {
        PrintRequest {
            role,
            items: vec![LineItem {
                code: "CK01".into(),
                name: "Cincin Kawin".into(),
                quantity: 1,
                purity: Some("24K".into()),
                weight: Some(3.25),
                price: 100_000,
                description: None,
            }],
            payment: Payment {
                payment_method: PaymentMethod::Deposit,
                deposit: Some(40_000),
                channel: Some("Transfer".into()),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_currency(60_000, "Rp "), "Rp 60.000");
        assert_eq!(format_weight(3.25), "3.25g");
        assert_eq!(format_weight(5.0), "5g");
    }

    #[test]
    fn test_invoice_number_shape() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 12).unwrap();
        let number = generate_invoice_number(date);
        assert!(number.starts_with("INV-20240312-"));
        let suffix = &number["INV-20240312-".len()..];
        assert_eq!(suffix.len(), 6);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_build_receipt_model() {
        let model = DocumentModel::build(&request(PrintRole::Receipt), &StoreProfile::default(), now());

        assert_eq!(model.title, "NOTA PENJUALAN");
        assert_eq!(model.invoice_number, None);
        assert_eq!(model.date, "12/03/2024 10:30");
        assert_eq!(model.items[0].descriptor, "CK01|24K|3.25g");
        assert_eq!(model.items[0].price, "Rp 100.000");
        assert_eq!(model.total, "Rp 100.000");
        assert_eq!(model.payment.deposit.as_deref(), Some("Rp 40.000"));
        assert_eq!(model.payment.remainder.as_deref(), Some("Rp 60.000"));
        assert!(!model.payment.fully_paid);
        assert!(model.customer.is_none());
    }

    #[test]
    fn test_build_invoice_generates_number_and_keeps_given_one() {
        let mut invoice = request(PrintRole::Invoice);
        invoice.customer = Some(Customer {
            name: Some("Budi".into()),
            ..Default::default()
        });

        let model = DocumentModel::build(&invoice, &StoreProfile::default(), now());
        assert!(model.invoice_number.unwrap().starts_with("INV-20240312-"));
        assert_eq!(model.customer.unwrap().name.as_deref(), Some("Budi"));

        invoice.invoice_number = Some("INV-MANUAL-1".into());
        let model = DocumentModel::build(&invoice, &StoreProfile::default(), now());
        assert_eq!(model.invoice_number.as_deref(), Some("INV-MANUAL-1"));
    }

    #[test]
    fn test_full_payment_has_no_remainder() {
        let mut paid = request(PrintRole::Receipt);
        paid.payment = Payment::default();
        paid.date = Some("01/01/2024".into());

        let model = DocumentModel::build(&paid, &StoreProfile::default(), now());
        assert_eq!(model.payment.method, "Lunas");
        assert!(model.payment.fully_paid);
        assert!(model.payment.remainder.is_none());
        assert_eq!(model.date, "01/01/2024");
    }
}
