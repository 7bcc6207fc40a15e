use crate::catalog::{Catalog, ItemKind};
use crate::customer::{Customer, Tier, TierDefaults};
use crate::error::Result;
use crate::reader::TIMESTAMP_FORMAT;
use crate::rental::Rental;
use rust_decimal::Decimal;
use std::io::Write;

/// Writes entity snapshots in the flat-file record shapes the readers accept.
/// Everything is emitted from live entity state: effective rates, recomputed
/// costs, never values cached from input.
pub struct SnapshotWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> SnapshotWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().flexible(true).from_writer(sink),
        }
    }

    pub fn write_customers(
        &mut self,
        customers: &[Customer],
        defaults: &TierDefaults,
    ) -> Result<()> {
        for customer in customers {
            // The discount on a unit amount is the effective rate.
            let rate = customer.discount(Decimal::ONE, defaults).to_string();
            let record: [String; 6] = match &customer.tier {
                Tier::Standard => [
                    "C".to_string(),
                    customer.id.clone(),
                    customer.name.clone(),
                    "na".to_string(),
                    "na".to_string(),
                    "na".to_string(),
                ],
                Tier::Member { .. } => [
                    "M".to_string(),
                    customer.id.clone(),
                    customer.name.clone(),
                    rate,
                    "na".to_string(),
                    "na".to_string(),
                ],
                Tier::Gold {
                    reward_rate,
                    reward_points,
                    ..
                } => [
                    "G".to_string(),
                    customer.id.clone(),
                    customer.name.clone(),
                    rate,
                    reward_rate.to_string(),
                    reward_points.to_string(),
                ],
            };
            self.writer.write_record(&record)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_items(&mut self, catalog: &Catalog) -> Result<()> {
        for item in catalog.items() {
            let mut record = vec![item.id.clone(), item.name.clone()];
            if let ItemKind::Series(components) = &item.kind {
                for id in components {
                    if let Some(component) = catalog.item_by_id(id) {
                        record.push(component.name.clone());
                    }
                }
            }
            self.writer.write_record(&record)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_categories(&mut self, catalog: &Catalog) -> Result<()> {
        for category in catalog.categories() {
            let mut record = vec![
                category.id.clone(),
                category.name.clone(),
                category.kind.as_str().to_string(),
                category.tier1_price.to_string(),
                category.tier2_price.to_string(),
            ];
            for id in &category.items {
                if let Some(item) = catalog.item_by_id(id) {
                    record.push(item.name.clone());
                }
            }
            self.writer.write_record(&record)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_rentals(&mut self, rentals: &[Rental]) -> Result<()> {
        for rental in rentals {
            let mut record = vec![rental.customer_id.clone()];
            for line in &rental.lines {
                record.push(line.item_id.clone());
                record.push(line.days.to_string());
            }
            record.push(format!("{:.2}", rental.original_cost));
            record.push(format!("{:.2}", rental.discount));
            record.push(format!("{:.2}", rental.total_cost));
            record.push(match rental.reward_earned {
                Some(reward) => reward.to_string(),
                None => "na".to_string(),
            });
            record.push(rental.timestamp.format(TIMESTAMP_FORMAT).to_string());
            self.writer.write_record(&record)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, CategoryKind};
    use crate::records::Records;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn seeded() -> Records {
        let mut records = Records::new();
        records
            .add_customer(Customer::member("M1", "Grace Hopper", Some(dec!(0.15))).unwrap())
            .unwrap();
        records
            .add_customer(Customer::gold("G1", "Katherine Johnson", None, dec!(1.0), 40).unwrap())
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

    #[test]
    fn test_write_customers_effective_rates() {
        let records = seeded();
        let mut out = Vec::new();
        SnapshotWriter::new(&mut out)
            .write_customers(records.customers(), records.tier_defaults())
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("M,M1,Grace Hopper,0.15,na,na"));
        assert!(text.contains("G,G1,Katherine Johnson,0.12,1.0,40"));
    }

    #[test]
    fn test_write_rentals_recomputed_fields() {
        let mut records = seeded();
        let timestamp = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        records
            .rent("M1", &[("B1".to_string(), 10)], timestamp)
            .unwrap();

        let mut out = Vec::new();
        SnapshotWriter::new(&mut out)
            .write_rentals(records.rentals())
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("M1,B1,10,24.00,3.60,20.40,na,01/03/2024 12:00:00"));
    }

    #[test]
    fn test_round_trip_preserves_entities() {
        let records = seeded();
        let mut customers = Vec::new();
        let mut items = Vec::new();
        let mut categories = Vec::new();
        SnapshotWriter::new(&mut customers)
            .write_customers(records.customers(), records.tier_defaults())
            .unwrap();
        SnapshotWriter::new(&mut items)
            .write_items(records.catalog())
            .unwrap();
        SnapshotWriter::new(&mut categories)
            .write_categories(records.catalog())
            .unwrap();

        let mut reloaded = Records::new();
        assert_eq!(reloaded.load_customers(customers.as_slice()), 2);
        assert_eq!(reloaded.load_items(items.as_slice()), 1);
        assert_eq!(reloaded.load_categories(categories.as_slice()), 1);

        assert_eq!(reloaded.customers()[1].reward_points(), Some(40));
        let item = reloaded.catalog().find_item("Dune").unwrap();
        assert_eq!(item.category.as_deref(), Some("F1"));
        assert_eq!(
            reloaded
                .catalog()
                .find_category("Fiction")
                .unwrap()
                .tier1_price,
            dec!(3.0)
        );
    }
}
