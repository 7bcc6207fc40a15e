use crate::error::{RentalError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Day count after which a category's second-tier price applies.
pub const TIER_THRESHOLD_DAYS: i64 = 7;

/// Longest loan allowed for items in a reference category.
pub const REFERENCE_LIMIT_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CategoryKind {
    Rental,
    Reference,
}

impl CategoryKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Rental" => Some(Self::Rental),
            "Reference" => Some(Self::Reference),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rental => "Rental",
            Self::Reference => "Reference",
        }
    }
}

/// A priced category. Membership is tracked as item ids; the owning
/// [`Catalog`] keeps this list and each item's back-reference in step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub kind: CategoryKind,
    pub tier1_price: Decimal,
    pub tier2_price: Decimal,
    pub items: Vec<String>,
}

impl Category {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: CategoryKind,
        tier1_price: Decimal,
        tier2_price: Decimal,
    ) -> Result<Self> {
        if tier1_price <= Decimal::ZERO || tier2_price <= Decimal::ZERO {
            return Err(RentalError::Validation(format!(
                "category prices must be positive, got {tier1_price} and {tier2_price}"
            )));
        }
        Ok(Self {
            id: id.into(),
            name: name.into(),
            kind,
            tier1_price,
            tier2_price,
            items: Vec::new(),
        })
    }

    /// Tiered cost of borrowing for `days`: the first-tier rate for up to
    /// [`TIER_THRESHOLD_DAYS`] days, the second-tier rate for each day beyond.
    pub fn price_for(&self, days: i64) -> Result<Decimal> {
        if days <= 0 {
            return Err(RentalError::InvalidDays(days));
        }
        if days <= TIER_THRESHOLD_DAYS {
            Ok(Decimal::from(days) * self.tier1_price)
        } else {
            Ok(Decimal::from(TIER_THRESHOLD_DAYS) * self.tier1_price
                + Decimal::from(days - TIER_THRESHOLD_DAYS) * self.tier2_price)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ItemKind {
    Single,
    /// A bundle priced at half the sum of its components. Holds component
    /// item ids; all components share one category.
    Series(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub kind: ItemKind,
}

/// Arena owning every item and category. Cross-references between the two are
/// ids, and [`Catalog::assign_category`] is the only operation that touches
/// both sides of the membership relation.
#[derive(Debug, Default)]
pub struct Catalog {
    items: Vec<Item>,
    categories: Vec<Category>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn add_item(&mut self, id: impl Into<String>, name: impl Into<String>) -> Result<()> {
        let id = id.into();
        if self.item_by_id(&id).is_some() {
            return Err(RentalError::Validation(format!("duplicate item id {id}")));
        }
        self.items.push(Item {
            id,
            name: name.into(),
            category: None,
            kind: ItemKind::Single,
        });
        Ok(())
    }

    /// Adds a series over already-registered items. Components are resolved
    /// by id or name, must be non-empty, and must all share one category; the
    /// series takes that category as its own.
    pub fn add_series(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        components: &[String],
    ) -> Result<()> {
        let id = id.into();
        if self.item_by_id(&id).is_some() {
            return Err(RentalError::Validation(format!("duplicate item id {id}")));
        }
        if components.is_empty() {
            return Err(RentalError::Validation(format!(
                "series {id} must contain at least one item"
            )));
        }
        let mut component_ids = Vec::with_capacity(components.len());
        let mut shared_category: Option<&Option<String>> = None;
        for query in components {
            let item = self.find_item(query).ok_or_else(|| {
                RentalError::Validation(format!("series component '{query}' not found"))
            })?;
            match shared_category {
                None => shared_category = Some(&item.category),
                Some(category) if *category != item.category => {
                    return Err(RentalError::Validation(format!(
                        "all items in series {id} must belong to the same category"
                    )));
                }
                Some(_) => {}
            }
            component_ids.push(item.id.clone());
        }
        let category = shared_category.and_then(|c| c.clone());
        self.items.push(Item {
            id,
            name: name.into(),
            category,
            kind: ItemKind::Series(component_ids),
        });
        Ok(())
    }

    pub fn add_category(&mut self, category: Category) -> Result<()> {
        let clash = self.categories.iter().any(|c| {
            c.id.eq_ignore_ascii_case(&category.id) || c.name.eq_ignore_ascii_case(&category.name)
        });
        if clash {
            return Err(RentalError::Validation(format!(
                "duplicate category id or name: {} / {}",
                category.id, category.name
            )));
        }
        self.categories.push(category);
        Ok(())
    }

    /// Moves an item into a category, updating both the item's back-reference
    /// and the membership lists of the old and new category in one step.
    pub fn assign_category(&mut self, item_query: &str, category_query: &str) -> Result<()> {
        let item_idx = self.item_index(item_query).ok_or_else(|| {
            RentalError::Validation(format!("item '{item_query}' not found"))
        })?;
        let category_id = self
            .find_category(category_query)
            .map(|c| c.id.clone())
            .ok_or_else(|| {
                RentalError::Validation(format!("category '{category_query}' not found"))
            })?;

        let item_id = self.items[item_idx].id.clone();
        if let Some(old) = self.items[item_idx].category.take()
            && let Some(old_cat) = self.categories.iter_mut().find(|c| c.id == old)
        {
            old_cat.items.retain(|id| *id != item_id);
        }
        if let Some(cat) = self.categories.iter_mut().find(|c| c.id == category_id)
            && !cat.items.contains(&item_id)
        {
            cat.items.push(item_id);
        }
        self.items[item_idx].category = Some(category_id);
        Ok(())
    }

    /// Removes an item from its category, clearing both sides.
    pub fn unassign_category(&mut self, item_query: &str) -> Result<()> {
        let item_idx = self.item_index(item_query).ok_or_else(|| {
            RentalError::Validation(format!("item '{item_query}' not found"))
        })?;
        let item_id = self.items[item_idx].id.clone();
        if let Some(old) = self.items[item_idx].category.take()
            && let Some(old_cat) = self.categories.iter_mut().find(|c| c.id == old)
        {
            old_cat.items.retain(|id| *id != item_id);
        }
        Ok(())
    }

    pub fn find_item(&self, query: &str) -> Option<&Item> {
        self.items
            .iter()
            .find(|i| i.id.eq_ignore_ascii_case(query) || i.name.eq_ignore_ascii_case(query))
    }

    pub fn find_category(&self, query: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.id.eq_ignore_ascii_case(query) || c.name.eq_ignore_ascii_case(query))
    }

    pub fn category_of(&self, item: &Item) -> Option<&Category> {
        let id = item.category.as_ref()?;
        self.categories.iter().find(|c| c.id == *id)
    }

    /// Cost of borrowing `item` for `days`. An uncategorised item prices at
    /// zero; a series prices at half the sum of its components.
    pub fn price(&self, item: &Item, days: i64) -> Result<Decimal> {
        match &item.kind {
            ItemKind::Single => match self.category_of(item) {
                Some(category) => category.price_for(days),
                None => Ok(Decimal::ZERO),
            },
            ItemKind::Series(components) => {
                let mut total = Decimal::ZERO;
                for id in components {
                    let component = self.item_by_id(id).ok_or_else(|| {
                        RentalError::Validation(format!("series component '{id}' not found"))
                    })?;
                    total += self.price(component, days)?;
                }
                Ok(total * dec!(0.5))
            }
        }
    }

    /// Entry-point guard run before a rental is constructed: the duration
    /// must be positive, and reference-category items cap at
    /// [`REFERENCE_LIMIT_DAYS`].
    pub fn check_loan(&self, item: &Item, days: i64) -> Result<()> {
        if days <= 0 {
            return Err(RentalError::InvalidDays(days));
        }
        if let Some(category) = self.category_of(item)
            && category.kind == CategoryKind::Reference
            && days > REFERENCE_LIMIT_DAYS
        {
            return Err(RentalError::ReferenceBookLimit {
                item: item.name.clone(),
                days,
            });
        }
        Ok(())
    }

    pub fn item_by_id(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    fn item_index(&self, query: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|i| i.id.eq_ignore_ascii_case(query) || i.name.eq_ignore_ascii_case(query))
    }
}
