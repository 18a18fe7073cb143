//! Order totals and delivery commissions.

use marketplace_config::PricingConfig;
use marketplace_types::{OrderLine, OrderTotals};
use rust_decimal::{Decimal, RoundingStrategy};

/// Money amounts are kept to cents.
const MONEY_SCALE: u32 = 2;

fn round_money(amount: Decimal) -> Decimal {
	amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Pricing rules applied by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
	pub tax_rate: Decimal,
	pub delivery_fee: Decimal,
	pub commission_rate: Decimal,
}

impl From<&PricingConfig> for Pricing {
	fn from(config: &PricingConfig) -> Self {
		Self {
			tax_rate: config.tax_rate,
			delivery_fee: config.delivery_fee,
			commission_rate: config.commission_rate,
		}
	}
}

impl Pricing {
	/// Computes the totals of an order from its line snapshots.
	///
	/// `total == subtotal + tax + delivery_fee` always holds.
	pub fn totals(&self, lines: &[OrderLine]) -> OrderTotals {
		let subtotal: Decimal = lines.iter().map(OrderLine::line_total).sum();
		let tax = round_money(subtotal * self.tax_rate);
		OrderTotals::new(subtotal, tax, self.delivery_fee)
	}

	/// Commission earned by the delivery person for an order of this total.
	pub fn commission(&self, order_total: Decimal) -> Decimal {
		round_money(order_total * self.commission_rate)
	}
}
