//! Per-invoice content: who is billed, for what, and in which variant.
//!
//! An [`InvoiceData`] is built once by the caller (from order records) and
//! only ever read afterwards; renderers borrow it alongside the settings.

use serde::{Deserialize, Serialize};

use super::validate::ValidationError;

/// Recipient identity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillTo {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// One billed line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub description: String,
    pub quantity: u32,
    /// Customer price.
    pub amount: f64,
    /// Dealer cost, shown by the settlement variant.
    #[serde(default)]
    pub cost: Option<f64>,
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: u32, amount: f64) -> Self {
        Self {
            description: description.into(),
            quantity,
            amount,
            cost: None,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    /// `amount - cost` when a cost is known.
    pub fn margin(&self) -> Option<f64> {
        self.cost.map(|cost| self.amount - cost)
    }
}

/// Covered vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub make: String,
    pub model: String,
    pub year: u16,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub registration: Option<String>,
}

impl Vehicle {
    /// "2021 Ford Focus"
    pub fn title(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}

/// Which audience the invoice is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceVariant {
    /// Customer-facing: amount columns.
    #[default]
    Customer,
    /// Dealer-facing: cost columns with a margin annotation per line.
    Settlement,
}

/// Everything printed on one invoice besides the tenant template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceData {
    pub invoice_number: String,
    pub issue_date: String,
    #[serde(default)]
    pub due_date: Option<String>,
    pub bill_to: BillTo,
    #[serde(default)]
    pub items: Vec<LineItem>,
    /// Supplied by the caller, or computed from the items when absent.
    #[serde(default)]
    pub subtotal: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub vehicle: Option<Vehicle>,
    #[serde(default)]
    pub coverage_duration: Option<String>,
    #[serde(default)]
    pub variant: InvoiceVariant,
}

impl InvoiceData {
    pub fn new(
        invoice_number: impl Into<String>,
        issue_date: impl Into<String>,
        bill_to: BillTo,
    ) -> Self {
        Self {
            invoice_number: invoice_number.into(),
            issue_date: issue_date.into(),
            due_date: None,
            bill_to,
            items: Vec::new(),
            subtotal: None,
            total: None,
            vehicle: None,
            coverage_duration: None,
            variant: InvoiceVariant::Customer,
        }
    }

    pub fn item(mut self, item: LineItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn due(mut self, date: impl Into<String>) -> Self {
        self.due_date = Some(date.into());
        self
    }

    pub fn vehicle(mut self, vehicle: Vehicle) -> Self {
        self.vehicle = Some(vehicle);
        self
    }

    pub fn coverage(mut self, label: impl Into<String>) -> Self {
        self.coverage_duration = Some(label.into());
        self
    }

    pub fn variant(mut self, variant: InvoiceVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Sum of item amounts, unless the caller supplied one.
    pub fn subtotal(&self) -> f64 {
        self.subtotal
            .unwrap_or_else(|| self.items.iter().map(|i| i.amount).sum())
    }

    /// Equal to the subtotal: no tax is applied.
    pub fn total(&self) -> f64 {
        self.total.unwrap_or_else(|| self.subtotal())
    }

    /// Structural checks on caller-supplied data.
    pub fn check(&self) -> Result<(), ValidationError> {
        if self.invoice_number.trim().is_empty() {
            return Err(ValidationError::new(
                "invoiceNumber",
                "Invoice number cannot be empty",
            ));
        }
        for (i, item) in self.items.iter().enumerate() {
            if item.quantity == 0 {
                return Err(ValidationError::new(
                    &format!("items[{}].quantity", i),
                    format!("Quantity for \"{}\" must be at least 1", item.description),
                ));
            }
            if !(item.amount >= 0.0) || !item.amount.is_finite() {
                return Err(ValidationError::new(
                    &format!("items[{}].amount", i),
                    format!("Amount for \"{}\" cannot be negative", item.description),
                ));
            }
        }
        Ok(())
    }
}
