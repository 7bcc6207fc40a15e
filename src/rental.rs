use crate::customer::{Customer, TierDefaults};
use crate::error::{RentalError, Result};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

/// Points per block that can be redeemed; each block is worth one currency
/// unit off the running total.
const REDEMPTION_BLOCK: i64 = 20;

/// Serializes a monetary amount with two decimal places, matching the
/// receipt and persisted-record shapes.
pub fn serialize_money<S>(amount: &Decimal, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{amount:.2}"))
}

/// One priced (item, days) pair of a rental. The price was computed through
/// the catalog by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RentalLine {
    pub item_id: String,
    pub item_name: String,
    pub days: i64,
    #[serde(serialize_with = "serialize_money")]
    pub price: Decimal,
}

/// The receipt of one rental transaction. All cost fields are computed once,
/// in [`Rental::checkout`], and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rental {
    pub customer_id: String,
    pub customer_name: String,
    pub lines: Vec<RentalLine>,
    pub timestamp: NaiveDateTime,
    #[serde(serialize_with = "serialize_money")]
    pub original_cost: Decimal,
    #[serde(serialize_with = "serialize_money")]
    pub discount: Decimal,
    #[serde(serialize_with = "serialize_money")]
    pub total_cost: Decimal,
    /// Points earned on this transaction; `None` for non-gold customers.
    pub reward_earned: Option<i64>,
}

impl Rental {
    /// Computes a rental for `customer` over the already-priced `lines`.
    ///
    /// For gold customers this has an observable side effect on `customer`:
    /// whole 20-point blocks of the existing balance are redeemed against the
    /// running total (1 currency unit per block), and the newly earned reward
    /// is credited. The reward is computed on the running total before
    /// redemption. Once this returns `Ok`, the loyalty mutation is final.
    pub fn checkout(
        customer: &mut Customer,
        defaults: &TierDefaults,
        lines: Vec<RentalLine>,
        timestamp: NaiveDateTime,
    ) -> Result<Rental> {
        if lines.is_empty() {
            return Err(RentalError::Validation(
                "a rental must cover at least one item".to_string(),
            ));
        }

        let original_cost: Decimal = lines.iter().map(|line| line.price).sum();
        let discount = customer.discount(original_cost, defaults);
        let mut running = original_cost - discount;

        let mut reward_earned = None;
        if customer.is_gold() {
            let reward = customer.compute_reward(running)?;

            let points = customer.reward_points().unwrap_or(0);
            let usable = (points / REDEMPTION_BLOCK) * REDEMPTION_BLOCK;
            if usable > 0 {
                running -= Decimal::from(usable / REDEMPTION_BLOCK);
                customer.apply_reward_delta(-usable)?;
            }

            customer.apply_reward_delta(reward)?;
            reward_earned = Some(reward);
        }

        Ok(Rental {
            customer_id: customer.id.clone(),
            customer_name: customer.name.clone(),
            lines,
            timestamp,
            original_cost,
            discount,
            total_cost: running,
            reward_earned,
        })
    }
}
