use crate::error::{RentalError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Current default discount rates per tier.
///
/// Adjusting a default applies to every customer of that tier that does not
/// carry a per-instance override. The Member and Gold slots are independent:
/// changing one never touches the other.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierDefaults {
    member: Decimal,
    gold: Decimal,
}

impl Default for TierDefaults {
    fn default() -> Self {
        Self {
            member: dec!(0.10),
            gold: dec!(0.12),
        }
    }
}

impl TierDefaults {
    pub fn member_rate(&self) -> Decimal {
        self.member
    }

    pub fn gold_rate(&self) -> Decimal {
        self.gold
    }

    pub fn set_member_rate(&mut self, rate: Decimal) -> Result<()> {
        validate_discount_rate(rate)?;
        self.member = rate;
        Ok(())
    }

    pub fn set_gold_rate(&mut self, rate: Decimal) -> Result<()> {
        validate_discount_rate(rate)?;
        self.gold = rate;
        Ok(())
    }
}

fn validate_discount_rate(rate: Decimal) -> Result<()> {
    if rate <= Decimal::ZERO || rate >= Decimal::ONE {
        return Err(RentalError::Validation(format!(
            "discount rate must be between 0 and 1, got {rate}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Tier {
    Standard,
    Member {
        /// Set when the customer was created with an explicit rate; such a
        /// customer keeps it regardless of later tier-wide changes.
        discount_override: Option<Decimal>,
    },
    Gold {
        discount_override: Option<Decimal>,
        reward_rate: Decimal,
        reward_points: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub tier: Tier,
}

impl Customer {
    pub fn standard(id: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        Self::new(id, name, Tier::Standard)
    }

    pub fn member(
        id: impl Into<String>,
        name: impl Into<String>,
        discount_override: Option<Decimal>,
    ) -> Result<Self> {
        Self::new(id, name, Tier::Member { discount_override })
    }

    pub fn gold(
        id: impl Into<String>,
        name: impl Into<String>,
        discount_override: Option<Decimal>,
        reward_rate: Decimal,
        reward_points: i64,
    ) -> Result<Self> {
        if reward_rate <= Decimal::ZERO {
            return Err(RentalError::Validation(format!(
                "reward rate must be positive, got {reward_rate}"
            )));
        }
        if reward_points < 0 {
            return Err(RentalError::Validation(format!(
                "reward points cannot be negative, got {reward_points}"
            )));
        }
        Self::new(
            id,
            name,
            Tier::Gold {
                discount_override,
                reward_rate,
                reward_points,
            },
        )
    }

    fn new(id: impl Into<String>, name: impl Into<String>, tier: Tier) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        if let Tier::Member {
            discount_override: Some(rate),
        }
        | Tier::Gold {
            discount_override: Some(rate),
            ..
        } = tier
        {
            validate_discount_rate(rate)?;
        }
        Ok(Self {
            id: id.into(),
            name,
            tier,
        })
    }

    /// Discount for a rental of the given original cost. Standard customers
    /// get none; Member and Gold use their override if present, else the
    /// current default for their tier.
    pub fn discount(&self, amount: Decimal, defaults: &TierDefaults) -> Decimal {
        match &self.tier {
            Tier::Standard => Decimal::ZERO,
            Tier::Member { discount_override } => {
                amount * discount_override.unwrap_or_else(|| defaults.member_rate())
            }
            Tier::Gold {
                discount_override, ..
            } => amount * discount_override.unwrap_or_else(|| defaults.gold_rate()),
        }
    }

    pub fn is_gold(&self) -> bool {
        matches!(self.tier, Tier::Gold { .. })
    }

    pub fn reward_points(&self) -> Option<i64> {
        match self.tier {
            Tier::Gold { reward_points, .. } => Some(reward_points),
            _ => None,
        }
    }

    /// Reward points earned on an amount, rounded to the nearest integer.
    /// Gold customers only.
    pub fn compute_reward(&self, amount: Decimal) -> Result<i64> {
        match self.tier {
            Tier::Gold { reward_rate, .. } => (amount * reward_rate)
                .round()
                .to_i64()
                .ok_or_else(|| RentalError::Validation("reward amount out of range".to_string())),
            _ => Err(RentalError::Validation(format!(
                "customer {} is not a gold member",
                self.id
            ))),
        }
    }

    /// Adds to the reward point balance. Fails if the result would be
    /// negative; once it succeeds the change is final.
    pub fn apply_reward_delta(&mut self, delta: i64) -> Result<()> {
        match &mut self.tier {
            Tier::Gold { reward_points, .. } => {
                let balance = *reward_points + delta;
                if balance < 0 {
                    return Err(RentalError::Validation(
                        "reward points balance cannot go negative".to_string(),
                    ));
                }
                *reward_points = balance;
                Ok(())
            }
            _ => Err(RentalError::Validation(format!(
                "customer {} is not a gold member",
                self.id
            ))),
        }
    }

    pub fn set_reward_rate(&mut self, rate: Decimal) -> Result<()> {
        match &mut self.tier {
            Tier::Gold { reward_rate, .. } => {
                if rate <= Decimal::ZERO {
                    return Err(RentalError::Validation(format!(
                        "reward rate must be positive, got {rate}"
                    )));
                }
                *reward_rate = rate;
                Ok(())
            }
            _ => Err(RentalError::Validation(format!(
                "customer {} is not a gold member",
                self.id
            ))),
        }
    }

    /// Single-letter tier code used by the persisted customer records.
    pub fn tier_code(&self) -> char {
        match self.tier {
            Tier::Standard => 'C',
            Tier::Member { .. } => 'M',
            Tier::Gold { .. } => 'G',
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    let stripped: String = name.chars().filter(|c| *c != ' ').collect();
    if stripped.is_empty() || !stripped.chars().all(|c| c.is_alphabetic()) {
        return Err(RentalError::InvalidName(name.to_string()));
    }
    Ok(())
}
