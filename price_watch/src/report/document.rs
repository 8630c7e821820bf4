//! Printable HTML price list, one section per brand and one table per category

use super::{GroupedCatalog, ReportRenderer};
use crate::error::Result;
use crate::model::{CatalogSnapshot, ProductRecord};
use chrono::Local;
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

const FILE_NAME: &str = "latest.html";

fn row(record: &ProductRecord) -> String {
    format!(
        "<tr><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        encode_double_quoted_attribute(&record.identity),
        encode_text(&record.name),
        encode_text(record.presentation.as_deref().unwrap_or("-")),
        encode_text(record.flavor.as_deref().unwrap_or("-")),
        encode_text(record.public_price.as_deref().unwrap_or("-")),
        encode_text(record.reseller_price.as_deref().unwrap_or("-")),
        record.in_stock.label(),
    )
}

/// Renders the grouped catalog as a standalone HTML page
pub fn render_html(grouped: &GroupedCatalog<'_>, generated_at: &str) -> String {
    let mut html = String::new();
    html.push_str("<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>Price list</title>\n");
    html.push_str(
        "<style>body{font-family:sans-serif}table{border-collapse:collapse;width:100%;margin-bottom:1em}\
         td,th{border:1px solid #ccc;padding:4px}h2{page-break-before:auto}</style>\n",
    );
    html.push_str("</head><body>\n");
    let _ = writeln!(html, "<h1>Price list</h1>\n<p>Generated {}</p>", encode_text(generated_at));

    for (brand, categories) in grouped {
        let _ = writeln!(html, "<section>\n<h2>{}</h2>", encode_text(brand));
        for (category, records) in categories {
            let _ = writeln!(html, "<h3>{}</h3>", category);
            html.push_str(
                "<table><thead><tr><th>Product</th><th>Presentation</th><th>Flavor</th>\
                 <th>Public</th><th>Reseller</th><th>Stock</th></tr></thead><tbody>\n",
            );
            for record in records {
                html.push_str(&row(record));
            }
            html.push_str("</tbody></table>\n");
        }
        html.push_str("</section>\n");
    }

    html.push_str("</body></html>\n");
    html
}

/// Writes the grouped HTML price list to the report directory
#[derive(Debug, Clone)]
pub struct HtmlReport {
    dir: PathBuf,
}

impl HtmlReport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ReportRenderer for HtmlReport {
    fn name(&self) -> &str {
        "html"
    }

    fn render(&self, grouped: &GroupedCatalog<'_>, _snapshot: &CatalogSnapshot) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let generated_at = Local::now().format("%Y-%m-%d %H:%M").to_string();
        let path = self.dir.join(FILE_NAME);
        fs::write(&path, render_html(grouped, &generated_at))?;
        log::info!("Wrote price list: {}", path.display());
        Ok(path)
    }
}
