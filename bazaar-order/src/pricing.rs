use bazaar_core::{LineItem, PaymentMethod};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Share of the tax-inclusive total that is tax (0.18 = 18%).
    pub tax_rate: Decimal,

    /// Share of the tax-inclusive total knocked off for hosted online payment.
    pub online_discount_rate: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(18, 2),
            online_discount_rate: Decimal::new(5, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub base: Decimal,
    pub tax_component: Decimal,
    pub discount: Decimal,
    pub final_total: Decimal,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("Cart total cannot be negative: {0}")]
    NegativeTotal(Decimal),
}

/// Checkout price breakdown. Prices on the storefront already include tax, so
/// tax is backed out of the total rather than added on top.
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Every step rounds to 2 dp on its own; nothing accumulates unrounded.
    ///
    /// `base` is the inclusive total minus the backed-out tax (1065.18 for
    /// 1299 at 18%), not `total / (1 + rate)`. This keeps
    /// `base + tax_component == final_total + discount` exact up to rounding.
    pub fn quote(
        &self,
        cart_total: Decimal,
        method: PaymentMethod,
    ) -> Result<PriceBreakdown, PricingError> {
        if cart_total.is_sign_negative() && !cart_total.is_zero() {
            return Err(PricingError::NegativeTotal(cart_total));
        }

        let total = round_money(cart_total);
        let tax_component = round_money(total * self.config.tax_rate);
        let base = round_money(total - tax_component);

        let discount = if method == PaymentMethod::Online {
            round_money(total * self.config.online_discount_rate)
        } else {
            Decimal::ZERO
        };
        let final_total = round_money(total - discount);

        Ok(PriceBreakdown {
            base,
            tax_component,
            discount,
            final_total,
        })
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}

/// Sum of `price * quantity` over the cart.
pub fn cart_total(items: &[LineItem]) -> Decimal {
    items.iter().map(LineItem::line_total).sum()
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
