use crate::catalog::{Catalog, Category};
use crate::customer::{Customer, TierDefaults};
use crate::error::{RentalError, Result};
use crate::reader::{CategoryRecord, CustomerRecord, ItemRecord, RecordReader, RentalRecord};
use crate::rental::{Rental, RentalLine};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::io::Read;
use tracing::warn;

/// The central repository: owns every entity collection, resolves queries to
/// entities, and answers the aggregate questions. Collections keep insertion
/// order; lookups return the first match.
#[derive(Debug, Default)]
pub struct Records {
    customers: Vec<Customer>,
    catalog: Catalog,
    rentals: Vec<Rental>,
    rentals_by_customer: HashMap<String, Vec<usize>>,
    tier_defaults: TierDefaults,
}

impl Records {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn rentals(&self) -> &[Rental] {
        &self.rentals
    }

    pub fn tier_defaults(&self) -> &TierDefaults {
        &self.tier_defaults
    }

    pub fn add_customer(&mut self, customer: Customer) -> Result<()> {
        if self.customers.iter().any(|c| c.id == customer.id) {
            return Err(RentalError::Validation(format!(
                "duplicate customer id {}",
                customer.id
            )));
        }
        self.customers.push(customer);
        Ok(())
    }

    /// Finds a customer by exact id or case-insensitive name; first match in
    /// insertion order. Absence is not an error.
    pub fn find_customer(&self, query: &str) -> Option<&Customer> {
        self.customers
            .iter()
            .find(|c| c.id == query || c.name.eq_ignore_ascii_case(query))
    }

    /// Tier-wide discount adjustment for members without a per-instance
    /// override.
    pub fn set_member_discount_rate(&mut self, rate: Decimal) -> Result<()> {
        self.tier_defaults.set_member_rate(rate)
    }

    pub fn set_gold_discount_rate(&mut self, rate: Decimal) -> Result<()> {
        self.tier_defaults.set_gold_rate(rate)
    }

    pub fn set_gold_reward_rate(&mut self, query: &str, rate: Decimal) -> Result<()> {
        let idx = self
            .customer_index(query)
            .ok_or_else(|| RentalError::Validation(format!("customer '{query}' not found")))?;
        self.customers[idx].set_reward_rate(rate)
    }

    /// The single transaction entry point: resolves the customer and every
    /// requested item, guards each loan (positive days, reference limit),
    /// prices each line through the catalog, runs the checkout, and records
    /// the result. Gold loyalty points mutate as a side effect; once this
    /// returns `Ok` the mutation and the receipt are final.
    pub fn rent(
        &mut self,
        customer_query: &str,
        requests: &[(String, i64)],
        timestamp: NaiveDateTime,
    ) -> Result<&Rental> {
        let customer_idx = self.customer_index(customer_query).ok_or_else(|| {
            RentalError::Validation(format!("customer '{customer_query}' not found"))
        })?;

        let mut lines = Vec::with_capacity(requests.len());
        for (item_query, days) in requests {
            let item = self.catalog.find_item(item_query).ok_or_else(|| {
                RentalError::Validation(format!("item '{item_query}' not found"))
            })?;
            self.catalog.check_loan(item, *days)?;
            let price = self.catalog.price(item, *days)?;
            lines.push(RentalLine {
                item_id: item.id.clone(),
                item_name: item.name.clone(),
                days: *days,
                price,
            });
        }

        let rental = Rental::checkout(
            &mut self.customers[customer_idx],
            &self.tier_defaults,
            lines,
            timestamp,
        )?;
        let idx = self.add_rental(rental);
        Ok(&self.rentals[idx])
    }

    /// Appends a rental to the log and to the per-customer index together;
    /// this is the only path that touches either.
    pub fn add_rental(&mut self, rental: Rental) -> usize {
        let idx = self.rentals.len();
        self.rentals_by_customer
            .entry(rental.customer_id.clone())
            .or_default()
            .push(idx);
        self.rentals.push(rental);
        idx
    }

    /// The customer whose rentals sum to the strictly largest total cost.
    /// Ties resolve to the customer first encountered in the rental log;
    /// `None` when there are no rentals.
    pub fn most_valuable_customer(&self) -> Option<&Customer> {
        let mut totals: Vec<(&str, Decimal)> = Vec::new();
        for rental in &self.rentals {
            match totals.iter_mut().find(|(id, _)| *id == rental.customer_id) {
                Some((_, total)) => *total += rental.total_cost,
                None => totals.push((&rental.customer_id, rental.total_cost)),
            }
        }
        let mut best: Option<(&str, Decimal)> = None;
        for (id, total) in totals {
            match best {
                Some((_, best_total)) if total <= best_total => {}
                _ => best = Some((id, total)),
            }
        }
        best.and_then(|(id, _)| self.customers.iter().find(|c| c.id == id))
    }

    /// Total spent by one customer across all their rentals.
    pub fn total_spent(&self, customer_id: &str) -> Decimal {
        self.rentals_by_customer
            .get(customer_id)
            .map(|indices| indices.iter().map(|i| self.rentals[*i].total_cost).sum())
            .unwrap_or(Decimal::ZERO)
    }

    /// A customer's rentals in the order they were added, or `None` if the
    /// customer has none (distinct from an empty list).
    pub fn customer_rental_history(&self, query: &str) -> Option<Vec<&Rental>> {
        let customer = self.find_customer(query)?;
        let indices = self.rentals_by_customer.get(&customer.id)?;
        if indices.is_empty() {
            return None;
        }
        Some(indices.iter().map(|i| &self.rentals[*i]).collect())
    }

    /// Loads customer records, skipping and logging malformed lines. Returns
    /// the number of customers loaded.
    pub fn load_customers<R: Read>(&mut self, source: R) -> usize {
        let mut loaded = 0;
        for result in RecordReader::new(source).records() {
            match result.and_then(|record| self.add_customer_record(record)) {
                Ok(()) => loaded += 1,
                Err(err) => warn!(%err, "skipping customer record"),
            }
        }
        loaded
    }

    fn add_customer_record(&mut self, record: CustomerRecord) -> Result<()> {
        let customer = match record.tier_code {
            'M' => Customer::member(record.id, record.name, record.discount_rate)?,
            'G' => Customer::gold(
                record.id,
                record.name,
                record.discount_rate,
                record.reward_rate.unwrap_or(Decimal::ONE),
                record.reward_points.unwrap_or(0),
            )?,
            _ => Customer::standard(record.id, record.name)?,
        };
        self.add_customer(customer)
    }

    /// Loads item records. Series lines reference items that appeared earlier
    /// in the file; an unresolvable or mixed-category series is skipped.
    pub fn load_items<R: Read>(&mut self, source: R) -> usize {
        let mut loaded = 0;
        for result in RecordReader::new(source).records() {
            let outcome = result.and_then(|record: ItemRecord| {
                if record.components.is_empty() {
                    self.catalog.add_item(record.id, record.name)
                } else {
                    self.catalog
                        .add_series(record.id, record.name, &record.components)
                }
            });
            match outcome {
                Ok(()) => loaded += 1,
                Err(err) => warn!(%err, "skipping item record"),
            }
        }
        loaded
    }

    /// Loads category records and assigns their member items. A member name
    /// that does not resolve is logged and skipped without dropping the
    /// category.
    pub fn load_categories<R: Read>(&mut self, source: R) -> usize {
        let mut loaded = 0;
        for result in RecordReader::new(source).records() {
            let outcome = result.and_then(|record: CategoryRecord| {
                let category = Category::new(
                    record.id.clone(),
                    record.name,
                    record.kind,
                    record.tier1_price,
                    record.tier2_price,
                )?;
                self.catalog.add_category(category)?;
                for name in &record.item_names {
                    if let Err(err) = self.catalog.assign_category(name, &record.id) {
                        warn!(%err, "skipping category member");
                    }
                }
                Ok(())
            });
            match outcome {
                Ok(()) => loaded += 1,
                Err(err) => warn!(%err, "skipping category record"),
            }
        }
        loaded
    }

    /// Replays rental records through [`Records::rent`]. Costs in the file
    /// are ignored and recomputed; gold loyalty effects apply exactly as they
    /// would for a live transaction.
    pub fn load_rentals<R: Read>(&mut self, source: R) -> usize {
        let mut loaded = 0;
        for result in RecordReader::new(source).records() {
            let outcome = result.and_then(|record: RentalRecord| {
                self.rent(&record.customer, &record.lines, record.timestamp)
                    .map(|_| ())
            });
            match outcome {
                Ok(()) => loaded += 1,
                Err(err) => warn!(%err, "skipping rental record"),
            }
        }
        loaded
    }

    fn customer_index(&self, query: &str) -> Option<usize> {
        self.customers
            .iter()
            .position(|c| c.id == query || c.name.eq_ignore_ascii_case(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CategoryKind;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn seeded() -> Records {
        let mut records = Records::new();
        records
            .add_customer(Customer::member("M1", "Grace Hopper", None).unwrap())
            .unwrap();
        records
            .add_customer(Customer::gold("G1", "Katherine Johnson", None, dec!(1.0), 0).unwrap())
            .unwrap();
        records
            .catalog_mut()
            .add_category(
                Category::new("F1", "Fiction", CategoryKind::Rental, dec!(3.0), dec!(1.0)).unwrap(),
            )
            .unwrap();
        records.catalog_mut().add_item("B1", "Dune").unwrap();
        records.catalog_mut().assign_category("B1", "F1").unwrap();
        records
    }

    fn request(item: &str, days: i64) -> Vec<(String, i64)> {
        vec![(item.to_string(), days)]
    }

    #[test]
    fn test_duplicate_customer_id_rejected() {
        let mut records = seeded();
        let result = records.add_customer(Customer::standard("M1", "Imposter").unwrap());
        assert!(matches!(result, Err(RentalError::Validation(_))));
    }

    #[test]
    fn test_find_customer_by_id_or_name() {
        let records = seeded();
        assert_eq!(records.find_customer("M1").unwrap().name, "Grace Hopper");
        assert_eq!(records.find_customer("grace hopper").unwrap().id, "M1");
        assert!(records.find_customer("nobody").is_none());
    }

    #[test]
    fn test_rent_member_scenario() {
        let mut records = seeded();
        let rental = records.rent("M1", &request("B1", 10), ts(1)).unwrap();
        assert_eq!(rental.original_cost, dec!(24.0));
        assert_eq!(rental.discount, dec!(2.40));
        assert_eq!(rental.total_cost, dec!(21.60));
    }

    #[test]
    fn test_rent_unknown_customer_or_item() {
        let mut records = seeded();
        assert!(records.rent("nobody", &request("B1", 10), ts(1)).is_err());
        assert!(records.rent("M1", &request("missing", 10), ts(1)).is_err());
        assert!(records.rentals().is_empty());
    }

    #[test]
    fn test_rental_log_and_index_stay_in_step() {
        let mut records = seeded();
        records.rent("M1", &request("B1", 10), ts(1)).unwrap();
        records.rent("G1", &request("B1", 3), ts(2)).unwrap();
        records.rent("M1", &request("B1", 2), ts(3)).unwrap();

        assert_eq!(records.rentals().len(), 3);
        let history = records.customer_rental_history("M1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].timestamp, ts(1));
        assert_eq!(history[1].timestamp, ts(3));
    }

    #[test]
    fn test_history_none_for_customer_without_rentals() {
        let records = seeded();
        assert!(records.customer_rental_history("M1").is_none());
        assert!(records.customer_rental_history("nobody").is_none());
    }

    #[test]
    fn test_most_valuable_customer() {
        let mut records = seeded();
        assert!(records.most_valuable_customer().is_none());

        records.rent("M1", &request("B1", 10), ts(1)).unwrap(); // 21.60
        records.rent("G1", &request("B1", 3), ts(2)).unwrap(); // 9.0 less 12% = 7.92
        assert_eq!(records.most_valuable_customer().unwrap().id, "M1");
    }

    #[test]
    fn test_most_valuable_customer_tie_breaks_to_first_seen() {
        let mut records = Records::new();
        records
            .add_customer(Customer::standard("C1", "Ada").unwrap())
            .unwrap();
        records
            .add_customer(Customer::standard("C2", "Mary").unwrap())
            .unwrap();
        records
            .catalog_mut()
            .add_category(
                Category::new("F1", "Fiction", CategoryKind::Rental, dec!(3.0), dec!(1.0)).unwrap(),
            )
            .unwrap();
        records.catalog_mut().add_item("B1", "Dune").unwrap();
        records.catalog_mut().assign_category("B1", "F1").unwrap();

        // Same spend either side; C2's first rental is recorded first.
        records.rent("C2", &request("B1", 5), ts(1)).unwrap();
        records.rent("C1", &request("B1", 5), ts(2)).unwrap();
        assert_eq!(records.most_valuable_customer().unwrap().id, "C2");
    }

    #[test]
    fn test_load_customers_skips_bad_lines() {
        let mut records = Records::new();
        let data = "C, C1, Ada Lovelace, na, na, na\n\
                    C, C2, N0t A Name, na, na, na\n\
                    M, M1, Grace Hopper, 0.15, na, na\n";
        let loaded = records.load_customers(data.as_bytes());
        assert_eq!(loaded, 2);
        assert!(records.find_customer("C2").is_none());
    }

    #[test]
    fn test_load_rentals_recomputes_costs() {
        let mut records = seeded();
        // Stored costs are nonsense on purpose; they must be recomputed.
        let data = "M1, B1, 10, 99.00, 0.00, 99.00, na, 01/03/2024 12:00:00\n";
        let loaded = records.load_rentals(data.as_bytes());
        assert_eq!(loaded, 1);
        assert_eq!(records.rentals()[0].total_cost, dec!(21.60));
    }

    #[test]
    fn test_load_rentals_rejects_reference_over_limit() {
        let mut records = seeded();
        records
            .catalog_mut()
            .add_category(
                Category::new("R1", "Atlases", CategoryKind::Reference, dec!(2.0), dec!(1.0))
                    .unwrap(),
            )
            .unwrap();
        records.catalog_mut().add_item("B2", "World Atlas").unwrap();
        records.catalog_mut().assign_category("B2", "R1").unwrap();

        let data = "M1, B2, 20, 0.00, 0.00, 0.00, na, 01/03/2024 12:00:00\n";
        let loaded = records.load_rentals(data.as_bytes());
        assert_eq!(loaded, 0);
        assert!(records.rentals().is_empty());
    }

    #[test]
    fn test_gold_rate_adjustments() {
        let mut records = seeded();
        records.set_member_discount_rate(dec!(0.20)).unwrap();
        assert_eq!(records.tier_defaults().gold_rate(), dec!(0.12));

        records.set_gold_reward_rate("G1", dec!(2.0)).unwrap();
        assert!(records.set_gold_reward_rate("M1", dec!(2.0)).is_err());
        assert!(records.set_gold_reward_rate("nobody", dec!(2.0)).is_err());
    }
}
