pub mod catalog;
pub mod customer;
pub mod error;
pub mod reader;
pub mod records;
pub mod rental;
pub mod writer;
