//! invoice-capture - invoice field extraction with Document AI.
//!
//! Uploaded invoices are parsed by a Document AI form processor. Their form
//! fields are mapped onto a fixed BigQuery table, addresses are sent on to a
//! geocoding topic, and the upload is archived.

pub mod cli;
pub mod config;
pub mod extract;
pub mod gcp;
pub mod models;
pub mod server;
pub mod services;
pub mod utils;
