//! CSV price sheet

use super::{GroupedCatalog, ReportRenderer};
use crate::error::Result;
use crate::model::CatalogSnapshot;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const FILE_NAME: &str = "latest.csv";

#[derive(Debug, Serialize)]
struct SheetRow<'a> {
    #[serde(rename = "Brand")]
    brand: &'a str,
    #[serde(rename = "Product")]
    product: &'a str,
    #[serde(rename = "Public price")]
    public_price: f64,
    #[serde(rename = "Reseller price")]
    reseller_price: f64,
    #[serde(rename = "Presentation")]
    presentation: &'a str,
    #[serde(rename = "Flavor")]
    flavor: &'a str,
    #[serde(rename = "Stock")]
    stock: &'a str,
    #[serde(rename = "Error")]
    error: &'a str,
}

/// Writes every product as one CSV row with numeric prices
#[derive(Debug, Clone)]
pub struct CsvReport {
    dir: PathBuf,
}

impl CsvReport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir.join(FILE_NAME)
    }

    /// Write the sheet for `snapshot` to `path`
    pub fn write_to(path: &Path, snapshot: &CatalogSnapshot) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in snapshot.iter() {
            writer.serialize(SheetRow {
                brand: &record.brand,
                product: &record.name,
                public_price: record.public_value().as_f64(),
                reseller_price: record.reseller_value().as_f64(),
                presentation: record.presentation.as_deref().unwrap_or("-"),
                flavor: record.flavor.as_deref().unwrap_or("-"),
                stock: record.in_stock.label(),
                error: record.error.as_deref().unwrap_or(""),
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ReportRenderer for CsvReport {
    fn name(&self) -> &str {
        "csv"
    }

    fn render(&self, _grouped: &GroupedCatalog<'_>, snapshot: &CatalogSnapshot) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.output_path();
        Self::write_to(&path, snapshot)?;
        log::info!("Wrote price sheet: {}", path.display());
        Ok(path)
    }
}
