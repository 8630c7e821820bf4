//! Report generation
//!
//! Renderers receive the finished snapshot grouped by brand, then by a
//! category derived from the product name.

mod document;
mod spreadsheet;

pub use document::HtmlReport;
pub use spreadsheet::CsvReport;

use crate::error::Result;
use crate::model::{CatalogSnapshot, ProductRecord};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Product category derived from name keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    ProteinBar,
    Protein,
    Creatine,
    Amino,
    PreWorkout,
    EnergyGel,
    Other,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::ProteinBar => "Protein bar",
            Category::Protein => "Protein",
            Category::Creatine => "Creatine",
            Category::Amino => "Amino acids / BCAA",
            Category::PreWorkout => "Pre-workout",
            Category::EnergyGel => "Energy gel",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Checked in order; the first category with a matching keyword wins.
const KEYWORDS: &[(Category, &[&str])] = &[
    (Category::ProteinBar, &["protein bar", "barra"]),
    (Category::Protein, &["whey", "proteína", "proteina"]),
    (Category::Creatine, &["creatina"]),
    (Category::Amino, &["bcaa", "amino"]),
    (Category::PreWorkout, &["pre ", "pre-work"]),
    (Category::EnergyGel, &["gel"]),
];

/// Category of a product by its name
pub fn categorize(name: &str) -> Category {
    let name = name.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| name.contains(w)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}

/// Brand → category → records (brands sorted, records in discovery order)
pub type GroupedCatalog<'a> = BTreeMap<&'a str, BTreeMap<Category, Vec<&'a ProductRecord>>>;

pub fn group_by_brand(snapshot: &CatalogSnapshot) -> GroupedCatalog<'_> {
    let mut grouped = GroupedCatalog::new();
    for record in snapshot.iter() {
        grouped
            .entry(record.brand.as_str())
            .or_default()
            .entry(categorize(&record.name))
            .or_default()
            .push(record);
    }
    grouped
}

/// Produces a report artifact from a finished run
pub trait ReportRenderer: Send + Sync {
    fn name(&self) -> &str;

    /// Render and return the path of the written artifact
    fn render(&self, grouped: &GroupedCatalog<'_>, snapshot: &CatalogSnapshot) -> Result<PathBuf>;
}
