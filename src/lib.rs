pub mod cli;
pub mod db;
pub mod duplicates;
pub mod error;
pub mod fmt;
pub mod importer;
pub mod levenshtein;
pub mod matrix;
pub mod models;
pub mod recurring;
pub mod reports;
pub mod scheduler;
pub mod settings;
pub mod similarity;
