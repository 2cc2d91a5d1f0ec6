//! Print request model
//!
//! The browser app has shipped several payload shapes over time, so most
//! fields accept their older names as aliases. Everything downstream works
//! on these canonical types only.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::de;
use crate::error::{Error, Result};

/// Maximum copies accepted for a single page-printer request
pub const MAX_COPIES: u32 = 10;

/// Logical print purpose, mapped to a physical printer by the role config
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum PrintRole {
    /// Thermal receipt printed at the counter
    #[default]
    Receipt,
    /// A4 invoice on the page printer
    Invoice,
    /// Service ticket ("nota servis")
    ServiceNote,
    /// Custom order note ("nota custom")
    CustomNote,
}

impl PrintRole {
    pub const ALL: [PrintRole; 4] = [
        PrintRole::Receipt,
        PrintRole::Invoice,
        PrintRole::ServiceNote,
        PrintRole::CustomNote,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrintRole::Receipt => "receipt",
            PrintRole::Invoice => "invoice",
            PrintRole::ServiceNote => "service-note",
            PrintRole::CustomNote => "custom-note",
        }
    }
}

impl fmt::Display for PrintRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrintRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "receipt" | "thermal" | "struk" => Ok(PrintRole::Receipt),
            "invoice" | "a4" => Ok(PrintRole::Invoice),
            "service-note" | "nota-servis" | "service" => Ok(PrintRole::ServiceNote),
            "custom-note" | "nota-custom" | "custom" => Ok(PrintRole::CustomNote),
            other => Err(Error::UnknownRole(other.to_string())),
        }
    }
}

/// Requested output representation for a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Thermal byte protocol
    #[default]
    Raw,
    /// Rendered PDF
    Pdf,
}

/// One line of a sale
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Product code
    #[serde(default, alias = "kode", alias = "kodeBarang", alias = "sku")]
    pub code: String,

    /// Display name
    #[serde(default, alias = "nama", alias = "namaBarang", alias = "productName")]
    pub name: String,

    /// Quantity sold
    #[serde(
        default = "default_quantity",
        alias = "qty",
        alias = "jumlah",
        deserialize_with = "de::quantity"
    )]
    pub quantity: u32,

    /// Gold purity (e.g. "24K", "75%")
    #[serde(default, alias = "kadar", deserialize_with = "de::opt_text")]
    pub purity: Option<String>,

    /// Weight in grams
    #[serde(default, alias = "berat", deserialize_with = "de::opt_decimal")]
    pub weight: Option<f64>,

    /// Computed line price
    #[serde(
        default,
        alias = "harga",
        alias = "subtotal",
        alias = "totalHarga",
        deserialize_with = "de::amount"
    )]
    pub price: i64,

    /// Free text attached to the line
    #[serde(default, alias = "keterangan", deserialize_with = "de::opt_text")]
    pub description: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

/// How the customer paid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    #[default]
    #[serde(alias = "lunas", alias = "full-payment", alias = "cash")]
    Full,
    #[serde(alias = "dp", alias = "partial", alias = "down-payment")]
    Deposit,
}

/// Payment fields carried at the top level of a request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Full payment or partial deposit
    #[serde(default, alias = "paymentType", alias = "jenisPembayaran")]
    pub payment_method: PaymentMethod,

    /// Deposit amount for partial payments
    #[serde(
        default,
        alias = "dp",
        alias = "uangMuka",
        deserialize_with = "de::opt_amount"
    )]
    pub deposit: Option<i64>,

    /// Payment channel shown on the document (cash, transfer, QRIS, ...)
    #[serde(
        default,
        alias = "metodeBayar",
        alias = "paymentChannel",
        deserialize_with = "de::opt_text"
    )]
    pub channel: Option<String>,
}

/// Outcome of applying a payment to a total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    /// Deposit paid, when the sale was not paid in full up front
    pub deposit: Option<i64>,
    /// Amount still owed, never negative
    pub remainder: i64,
    /// Whether nothing is owed
    pub fully_paid: bool,
}

impl Payment {
    /// Apply this payment to `total`.
    ///
    /// The remainder is clamped at zero; a deposit that covers the total
    /// counts as fully paid.
    pub fn settle(&self, total: i64) -> Settlement {
        match self.payment_method {
            PaymentMethod::Full => Settlement {
                deposit: None,
                remainder: 0,
                fully_paid: true,
            },
            PaymentMethod::Deposit => {
                let deposit = self.deposit.unwrap_or(0).max(0);
                Settlement {
                    deposit: Some(deposit),
                    remainder: total.saturating_sub(deposit).max(0),
                    fully_paid: deposit >= total,
                }
            }
        }
    }
}

/// Customer block for invoices and notes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default, alias = "nama", alias = "namaPelanggan", deserialize_with = "de::opt_text")]
    pub name: Option<String>,

    #[serde(
        default,
        alias = "telp",
        alias = "noHp",
        alias = "telepon",
        deserialize_with = "de::opt_text"
    )]
    pub phone: Option<String>,

    #[serde(default, alias = "alamat", deserialize_with = "de::opt_text")]
    pub address: Option<String>,
}

/// A print request as submitted by the web app
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintRequest {
    /// Logical role; set from the endpoint, never trusted from the body
    #[serde(skip)]
    pub role: PrintRole,

    /// Ordered line items
    #[serde(default, alias = "barang", alias = "cart")]
    pub items: Vec<LineItem>,

    /// Grand total; the sum of line prices when absent
    #[serde(
        default,
        alias = "grandTotal",
        alias = "totalHarga",
        deserialize_with = "de::opt_amount"
    )]
    pub total: Option<i64>,

    /// Payment fields
    #[serde(flatten)]
    pub payment: Payment,

    /// Sales person name
    #[serde(
        default,
        alias = "sales",
        alias = "namaSales",
        alias = "kasir",
        deserialize_with = "de::opt_text"
    )]
    pub sales_name: Option<String>,

    /// Sale date as displayed by the app
    #[serde(default, alias = "tanggal", deserialize_with = "de::opt_text")]
    pub date: Option<String>,

    /// Customer details
    #[serde(default, alias = "pelanggan")]
    pub customer: Option<Customer>,

    /// Free-text notes
    #[serde(default, alias = "catatan", deserialize_with = "de::opt_text")]
    pub notes: Option<String>,

    /// Invoice number; generated by the service when absent
    #[serde(
        default,
        alias = "noInvoice",
        alias = "nomorNota",
        deserialize_with = "de::opt_text"
    )]
    pub invoice_number: Option<String>,

    /// Copies for page printers
    #[serde(default)]
    pub copies: Option<u32>,

    /// Output representation (receipts only)
    #[serde(default)]
    pub format: OutputFormat,
}

impl PrintRequest {
    /// Grand total, falling back to the sum of line prices.
    ///
    /// `None` when the sum does not fit in an `i64`.
    pub fn checked_total(&self) -> Option<i64> {
        match self.total {
            Some(total) => Some(total),
            None => self
                .items
                .iter()
                .try_fold(0i64, |sum, item| sum.checked_add(item.price)),
        }
    }

    /// Grand total; an out-of-range sum saturates (and fails [`validate`])
    ///
    /// [`validate`]: PrintRequest::validate
    pub fn total(&self) -> i64 {
        self.checked_total().unwrap_or(i64::MAX)
    }

    /// Requested copies, defaulting to one
    pub fn copies(&self) -> u32 {
        self.copies.unwrap_or(1)
    }

    /// Payment applied to the grand total
    pub fn settlement(&self) -> Settlement {
        self.payment.settle(self.total())
    }

    /// Reject requests that cannot be printed
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::Validation(
                "at least one line item is required".to_string(),
            ));
        }

        for (index, item) in self.items.iter().enumerate() {
            if item.name.trim().is_empty() {
                return Err(Error::Validation(format!(
                    "item {} is missing a name",
                    index + 1
                )));
            }
            if item.quantity == 0 {
                return Err(Error::Validation(format!(
                    "item {} has zero quantity",
                    index + 1
                )));
            }
            if item.price < 0 {
                return Err(Error::Validation(format!(
                    "item {} has a negative price",
                    index + 1
                )));
            }
        }

        let Some(total) = self.checked_total() else {
            return Err(Error::Validation("total out of range".to_string()));
        };
        if total < 0 {
            return Err(Error::Validation("total must not be negative".to_string()));
        }

        if let Some(copies) = self.copies {
            if copies == 0 || copies > MAX_COPIES {
                return Err(Error::Validation(format!(
                    "copies must be between 1 and {}",
                    MAX_COPIES
                )));
            }
        }

        if self.payment.payment_method == PaymentMethod::Deposit {
            match self.payment.deposit {
                None => {
                    return Err(Error::Validation(
                        "deposit payments require a deposit amount".to_string(),
                    ))
                }
                Some(deposit) if deposit < 0 => {
                    return Err(Error::Validation(
                        "deposit must not be negative".to_string(),
                    ))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}
