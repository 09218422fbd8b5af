//! Invoice totals calculator.
//!
//! Pure and deterministic: (line items, tax/discount/shipping config, prior
//! payments) -> monetary totals. Accumulation happens in full precision;
//! each output field is rounded to the cent independently at the end, so two
//! runs over identical input yield identical output.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::models::{InvoiceItem, LineItemInput, TaxMode, TaxScope};

/// The chargeable part of one invoice line.
#[derive(Debug, Clone, Copy)]
pub struct LineCharge {
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_percent: Decimal,
    pub discount_percent: Decimal,
}

impl From<&InvoiceItem> for LineCharge {
    fn from(item: &InvoiceItem) -> Self {
        LineCharge {
            quantity: item.quantity,
            unit_price: item.unit_price,
            tax_percent: item.tax_percent,
            discount_percent: item.discount_percent,
        }
    }
}

impl From<&LineItemInput> for LineCharge {
    fn from(item: &LineItemInput) -> Self {
        LineCharge {
            quantity: item.quantity,
            unit_price: item.unit_price,
            tax_percent: item.tax_percent.unwrap_or(Decimal::ZERO),
            discount_percent: item.discount_percent.unwrap_or(Decimal::ZERO),
        }
    }
}

/// Tax, discount and shipping configuration for one invoice.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotalsConfig {
    pub tax_mode: TaxMode,
    pub tax_scope: TaxScope,
    pub invoice_tax_percent: Decimal,
    pub shipping_amount: Decimal,
}

/// Computed monetary totals, each rounded to 2 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub tax_total: Decimal,
    pub shipping_total: Decimal,
    pub total: Decimal,
    pub paid_amount: Decimal,
    pub due_amount: Decimal,
}

/// Round to the cent boundary, midpoint away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Compute invoice totals from line items, configuration and the payments
/// already recorded.
///
/// Per-line tax applies only when the mode is not `None` and the scope is
/// `LineItem`. With `Invoice` scope, tax is the invoice-level percent over
/// the taxable base (sum of per-item amounts after discount); any per-line
/// tax percents are dead input in that mode and are deliberately ignored
/// rather than summed in.
///
/// Range enforcement (non-negative quantities, percents within 0..=100) is a
/// caller validation responsibility, not checked here.
pub fn compute_totals(items: &[LineCharge], config: &TotalsConfig, payments: &[Decimal]) -> Totals {
    let mut subtotal = Decimal::ZERO;
    let mut discount_total = Decimal::ZERO;
    let mut taxable_base = Decimal::ZERO;
    let mut line_tax_total = Decimal::ZERO;

    for item in items {
        let item_subtotal = item.quantity * item.unit_price;
        let item_discount = item_subtotal * item.discount_percent / HUNDRED;
        let item_after_discount = item_subtotal - item_discount;
        let item_tax = if config.tax_mode != TaxMode::None && config.tax_scope == TaxScope::LineItem
        {
            item_after_discount * item.tax_percent / HUNDRED
        } else {
            Decimal::ZERO
        };

        subtotal += item_subtotal;
        discount_total += item_discount;
        taxable_base += item_after_discount;
        line_tax_total += item_tax;
    }

    let tax_total = match (config.tax_mode, config.tax_scope) {
        (TaxMode::None, _) => Decimal::ZERO,
        (_, TaxScope::Invoice) => taxable_base * config.invoice_tax_percent / HUNDRED,
        (_, TaxScope::LineItem) => line_tax_total,
    };

    let total = subtotal - discount_total + tax_total + config.shipping_amount;
    let paid_amount: Decimal = payments.iter().copied().sum();
    let due_amount = (total - paid_amount).max(Decimal::ZERO);

    Totals {
        subtotal: round2(subtotal),
        discount_total: round2(discount_total),
        tax_total: round2(tax_total),
        shipping_total: round2(config.shipping_amount),
        total: round2(total),
        paid_amount: round2(paid_amount),
        due_amount: round2(due_amount),
    }
}
