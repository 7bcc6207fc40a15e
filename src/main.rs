use clap::Parser;
use librent::customer::Customer;
use librent::reader::{RecordReader, RentalRecord, TIMESTAMP_FORMAT};
use librent::records::Records;
use librent::rental::Rental;
use librent::writer::SnapshotWriter;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Customer records file
    #[arg(long, default_value = "customers.txt")]
    customers: PathBuf,

    /// Item records file
    #[arg(long, default_value = "books.txt")]
    books: PathBuf,

    /// Category records file
    #[arg(long, default_value = "book_categories.txt")]
    categories: PathBuf,

    /// Rental log file; replayed at startup when present
    #[arg(long, default_value = "rentals.txt")]
    rentals: PathBuf,

    /// Batch rental file to process, printing one receipt per transaction
    #[arg(long)]
    rent_file: Option<PathBuf>,

    /// Print all rentals and the most valuable customer
    #[arg(long)]
    report: bool,

    /// Print one customer's rental history (id or name)
    #[arg(long)]
    history: Option<String>,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,

    /// Write the entity files back before exiting
    #[arg(long)]
    save: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    rentals: &'a [Rental],
    most_valuable_customer: Option<MostValuable<'a>>,
}

#[derive(Serialize)]
struct MostValuable<'a> {
    customer: &'a Customer,
    #[serde(serialize_with = "librent::rental::serialize_money")]
    total_spent: Decimal,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut records = Records::new();
    records.load_customers(File::open(&cli.customers).into_diagnostic()?);
    records.load_items(File::open(&cli.books).into_diagnostic()?);
    records.load_categories(File::open(&cli.categories).into_diagnostic()?);
    if cli.rentals.exists() {
        records.load_rentals(File::open(&cli.rentals).into_diagnostic()?);
    }

    if let Some(rent_file) = &cli.rent_file {
        let file = File::open(rent_file).into_diagnostic()?;
        let reader: RecordReader<_, RentalRecord> = RecordReader::new(file);
        for result in reader.records() {
            let outcome = result.and_then(|record| {
                records
                    .rent(&record.customer, &record.lines, record.timestamp)
                    .map(Rental::clone)
            });
            match outcome {
                Ok(rental) => print_receipt(&rental),
                Err(err) => eprintln!("Error processing rental: {err}"),
            }
        }
    }

    if cli.report {
        if cli.json {
            let report = Report {
                rentals: records.rentals(),
                most_valuable_customer: records.most_valuable_customer().map(|customer| {
                    MostValuable {
                        customer,
                        total_spent: records.total_spent(&customer.id),
                    }
                }),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&report).into_diagnostic()?
            );
        } else {
            print_report(&records);
        }
    }

    if let Some(query) = &cli.history {
        print_history(&records, query);
    }

    if cli.save {
        SnapshotWriter::new(File::create(&cli.customers).into_diagnostic()?)
            .write_customers(records.customers(), records.tier_defaults())?;
        SnapshotWriter::new(File::create(&cli.books).into_diagnostic()?)
            .write_items(records.catalog())?;
        SnapshotWriter::new(File::create(&cli.categories).into_diagnostic()?)
            .write_categories(records.catalog())?;
        SnapshotWriter::new(File::create(&cli.rentals).into_diagnostic()?)
            .write_rentals(records.rentals())?;
    }

    Ok(())
}

fn print_receipt(rental: &Rental) {
    println!("---");
    println!("Receipt for {}", rental.customer_name);
    println!("Date: {}", rental.timestamp.format(TIMESTAMP_FORMAT));
    for line in &rental.lines {
        println!("- {} for {} days", line.item_name, line.days);
    }
    println!("Original cost: {:.2}", rental.original_cost);
    println!("Discount: {:.2}", rental.discount);
    println!("Total cost: {:.2}", rental.total_cost);
    if let Some(reward) = rental.reward_earned {
        println!("Reward earned: {reward}");
    }
}

fn print_report(records: &Records) {
    for rental in records.rentals() {
        print_receipt(rental);
    }
    match records.most_valuable_customer() {
        Some(customer) => println!(
            "Most valuable customer: {} ({}), total spent {:.2}",
            customer.name,
            customer.id,
            records.total_spent(&customer.id)
        ),
        None => println!("No rentals recorded"),
    }
}

fn print_history(records: &Records, query: &str) {
    match records.customer_rental_history(query) {
        Some(history) => {
            for (i, rental) in history.iter().enumerate() {
                let lines: Vec<String> = rental
                    .lines
                    .iter()
                    .map(|line| format!("{}: {} days", line.item_name, line.days))
                    .collect();
                println!(
                    "{} | {} | {:.2} | {:.2} | {:.2} | {}",
                    i + 1,
                    lines.join(", "),
                    rental.original_cost,
                    rental.discount,
                    rental.total_cost,
                    rental
                        .reward_earned
                        .map_or("na".to_string(), |r| r.to_string()),
                );
            }
        }
        None => println!("No rental history for {query}"),
    }
}
