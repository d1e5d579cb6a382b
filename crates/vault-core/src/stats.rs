//! Admin Statistics
//!
//! Aggregations over download history and settled sales.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::document::{Document, DocumentId};
use crate::download::Download;

/// A settled purchase, as recorded by the payment ledger
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub document_id: DocumentId,
    pub amount: Decimal,
    pub settled_at: DateTime<Utc>,
}

/// Downloads per document
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDownloadStat {
    pub id: DocumentId,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub total_downloads: u64,
    pub last_downloaded: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonthlyCount {
    pub year: i32,
    pub month: u32,
    pub period: String,
    pub count: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,
    pub period: String,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, Serialize)]
pub struct DocumentRevenue {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    /// None once the document has been removed from the catalog
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub purchases: u64,
    pub revenue: Decimal,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    pub total_revenue: Decimal,
    pub revenue_by_pdf: Vec<DocumentRevenue>,
    pub monthly_revenue: Vec<MonthlyRevenue>,
}

/// "YYYY-MM"
pub fn period(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}")
}

fn index(catalog: &[Document]) -> HashMap<&DocumentId, &Document> {
    catalog.iter().map(|d| (&d.id, d)).collect()
}

/// Per-document download totals, most downloaded first.
/// Downloads of documents no longer in the catalog are dropped.
pub fn download_stats(downloads: &[Download], catalog: &[Document]) -> Vec<DocumentDownloadStat> {
    let documents = index(catalog);
    let mut grouped: HashMap<&DocumentId, (u64, DateTime<Utc>)> = HashMap::new();

    for download in downloads {
        let entry = grouped
            .entry(&download.document)
            .or_insert((0, download.downloaded_at));
        entry.0 += 1;
        entry.1 = entry.1.max(download.downloaded_at);
    }

    let mut stats: Vec<_> = grouped
        .into_iter()
        .filter_map(|(id, (total, last))| {
            documents.get(id).map(|doc| DocumentDownloadStat {
                id: id.clone(),
                title: doc.title.clone(),
                description: doc.description.clone(),
                price: doc.price(),
                total_downloads: total,
                last_downloaded: last,
            })
        })
        .collect();

    stats.sort_by(|a, b| b.total_downloads.cmp(&a.total_downloads).then_with(|| a.id.cmp(&b.id)));
    stats
}

/// Download counts per calendar month, oldest first
pub fn monthly_downloads(downloads: &[Download]) -> Vec<MonthlyCount> {
    let mut months: BTreeMap<(i32, u32), u64> = BTreeMap::new();
    for download in downloads {
        let at = download.downloaded_at;
        *months.entry((at.year(), at.month())).or_default() += 1;
    }

    months
        .into_iter()
        .map(|((year, month), count)| MonthlyCount {
            year,
            month,
            period: period(year, month),
            count,
        })
        .collect()
}

/// Total, per-document and monthly revenue from settled sales
pub fn revenue_summary(sales: &[Sale], catalog: &[Document]) -> RevenueSummary {
    let documents = index(catalog);
    let mut by_document: HashMap<&DocumentId, (u64, Decimal)> = HashMap::new();
    let mut months: BTreeMap<(i32, u32), Decimal> = BTreeMap::new();
    let mut total = Decimal::ZERO;

    for sale in sales {
        total += sale.amount;

        let entry = by_document.entry(&sale.document_id).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += sale.amount;

        let at = sale.settled_at;
        *months.entry((at.year(), at.month())).or_default() += sale.amount;
    }

    let mut revenue_by_pdf: Vec<_> = by_document
        .into_iter()
        .map(|(id, (purchases, revenue))| {
            let doc = documents.get(id);
            DocumentRevenue {
                id: id.clone(),
                title: doc.map(|d| d.title.clone()),
                price: doc.map(|d| d.price()),
                purchases,
                revenue,
            }
        })
        .collect();
    revenue_by_pdf.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.id.cmp(&b.id)));

    let monthly_revenue = months
        .into_iter()
        .map(|((year, month), revenue)| MonthlyRevenue {
            year,
            month,
            period: period(year, month),
            revenue,
        })
        .collect();

    RevenueSummary {
        total_revenue: total,
        revenue_by_pdf,
        monthly_revenue,
    }
}
