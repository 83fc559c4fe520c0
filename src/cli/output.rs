use serde::Serialize;
use std::fmt::Write as FmtWrite;

use crate::models::{Invoice, OutputFormat, PredictionOutcome, PredictionRow, cell_text};
use crate::services::IngestReport;
use crate::utils::{format_currency, preview};

pub trait Formatter {
    fn format_ingest_report(&self, report: &IngestReport) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_extraction(&self, info: &ExtractionInfo) -> String;
    fn format_invoice(&self, invoice: &Invoice) -> String;
    fn format_predictions(&self, rows: &[PredictionRow]) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub database: String,
    pub database_connected: bool,
    pub client_name: String,
    pub client_id: Option<i32>,
    /// Stored chunk counts per review year, ascending.
    pub years: Vec<YearCount>,
    pub source: Option<String>,
    pub embedding_model: String,
    pub embedding_configured: bool,
}

impl StatusInfo {
    pub fn total_chunks(&self) -> u64 {
        self.years.iter().map(|y| y.chunks).sum()
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct YearCount {
    pub year: i32,
    pub chunks: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionInfo {
    pub file: String,
    pub review_year: Option<i32>,
    pub pages: usize,
    pub characters: usize,
    pub chunk_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<String>>,
}

const CHUNK_PREVIEW_CHARS: usize = 160;

fn outcome_cells(outcome: &PredictionOutcome) -> (String, String) {
    match outcome {
        PredictionOutcome::Classified { label, .. } => (
            label.clone(),
            format!("{:.2}%", outcome.confidence_percent().unwrap_or(0.0)),
        ),
        PredictionOutcome::Mismatched => ("Error: Mismatched".into(), "N/A".into()),
        PredictionOutcome::Unrecognized => ("Error: Format".into(), "N/A".into()),
    }
}

fn party_line(name: &str, address: &str) -> String {
    if address.is_empty() {
        name.to_string()
    } else {
        format!("{}, {}", name, address)
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_ingest_report(&self, report: &IngestReport) -> String {
        let mut output = String::new();
        let title = if report.dry_run {
            "Ingestion dry run"
        } else {
            "Ingestion complete"
        };
        writeln!(output, "{}", title).unwrap();
        writeln!(output, "{}", "-".repeat(title.len())).unwrap();
        writeln!(output, "Source:          {}", report.source).unwrap();
        if let Some(ref client) = report.client {
            writeln!(output, "Client:          {} (id {})", client.name, client.id).unwrap();
        }
        writeln!(output, "Files listed:    {}", report.files_listed).unwrap();
        writeln!(output, "Files processed: {}", report.files_processed).unwrap();
        writeln!(output, "Files skipped:   {}", report.skipped.len()).unwrap();
        writeln!(output, "Chunks grouped:  {}", report.chunks_grouped()).unwrap();
        if !report.dry_run {
            writeln!(output, "Rows inserted:   {}", report.rows_inserted()).unwrap();
        }
        writeln!(output, "Duration:        {}ms", report.duration_ms).unwrap();

        if !report.years.is_empty() {
            writeln!(output).unwrap();
            for year in &report.years {
                write!(
                    output,
                    "  {}  files {:>3}  chunks {:>5}",
                    year.year, year.files, year.chunks
                )
                .unwrap();
                match year.error {
                    Some(ref e) => writeln!(output, "  [FAILED] {}", e).unwrap(),
                    None if report.dry_run => writeln!(output).unwrap(),
                    None => writeln!(output, "  inserted {:>5}", year.inserted).unwrap(),
                }
            }
        }

        if !report.skipped.is_empty() {
            writeln!(output, "\nSkipped:").unwrap();
            for skipped in &report.skipped {
                writeln!(output, "  {}: {}", skipped.file, skipped.reason).unwrap();
            }
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let db_status = if status.database_connected {
            "[CONNECTED]"
        } else {
            "[UNAVAILABLE]"
        };
        writeln!(output, "PostgreSQL:    {} {}", db_status, status.database).unwrap();
        writeln!(output, "Source:        {}", status.source.as_deref().unwrap_or("(none)")).unwrap();
        let key_status = if status.embedding_configured {
            "[CONFIGURED]"
        } else {
            "[NO API KEY]"
        };
        writeln!(output, "Embedding:     {} {}", key_status, status.embedding_model).unwrap();
        writeln!(output).unwrap();

        match status.client_id {
            Some(id) => {
                writeln!(output, "Client:        {} (id {})", status.client_name, id).unwrap();
                writeln!(output, "Chunks:        {}", status.total_chunks()).unwrap();
                for year in &status.years {
                    writeln!(output, "  {}:        {}", year.year, year.chunks).unwrap();
                }
            }
            None => {
                writeln!(output, "Client:        {} (not ingested)", status.client_name).unwrap();
            }
        }

        output
    }

    fn format_extraction(&self, info: &ExtractionInfo) -> String {
        let mut output = String::new();
        writeln!(output, "File:        {}", info.file).unwrap();
        match info.review_year {
            Some(year) => writeln!(output, "Review year: {}", year).unwrap(),
            None => writeln!(output, "Review year: (none, would be skipped)").unwrap(),
        }
        writeln!(output, "Pages:       {}", info.pages).unwrap();
        writeln!(output, "Characters:  {}", info.characters).unwrap();
        writeln!(output, "Chunks:      {}", info.chunk_count).unwrap();

        if let Some(ref chunks) = info.chunks {
            for (i, chunk) in chunks.iter().enumerate() {
                writeln!(output, "\n[{}] {} chars", i + 1, chunk.chars().count()).unwrap();
                for line in preview(chunk, CHUNK_PREVIEW_CHARS).lines() {
                    writeln!(output, "   {}", line).unwrap();
                }
            }
        }

        output
    }

    fn format_invoice(&self, invoice: &Invoice) -> String {
        let mut output = String::new();
        writeln!(output, "Invoice {}", invoice.invoice_number).unwrap();
        writeln!(output, "Invoice date: {}", invoice.invoice_date).unwrap();
        writeln!(output, "Due date:     {}", invoice.due_date).unwrap();
        writeln!(output, "PO number:    {}", invoice.po_number.as_deref().unwrap_or("N/A")).unwrap();
        writeln!(output, "Total due:    {}", format_currency(invoice.total_amount_due)).unwrap();
        writeln!(output).unwrap();
        writeln!(
            output,
            "Bill to: {}",
            party_line(&invoice.bill_to.name, &invoice.bill_to.address)
        )
        .unwrap();
        writeln!(
            output,
            "Ship to: {}",
            party_line(&invoice.ship_to.name, &invoice.ship_to.address)
        )
        .unwrap();

        let columns = invoice.line_item_columns();
        if !columns.is_empty() {
            let rows: Vec<Vec<String>> = invoice
                .line_items
                .iter()
                .map(|item| columns.iter().map(|c| cell_text(item.get(c))).collect())
                .collect();
            let widths: Vec<usize> = columns
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    rows.iter()
                        .map(|r| r[i].chars().count())
                        .chain(std::iter::once(c.chars().count()))
                        .max()
                        .unwrap_or(0)
                })
                .collect();

            let render = |cells: &[String]| -> String {
                cells
                    .iter()
                    .zip(&widths)
                    .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
                    .collect::<Vec<_>>()
                    .join("  ")
                    .trim_end()
                    .to_string()
            };

            writeln!(output, "\nLine items").unwrap();
            writeln!(output, "{}", render(&columns)).unwrap();
            writeln!(
                output,
                "{}",
                widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  ")
            )
            .unwrap();
            for row in &rows {
                writeln!(output, "{}", render(row)).unwrap();
            }
        }

        if let Some(ref bank) = invoice.payment_methods.bank_transfer {
            writeln!(output, "\nBank transfer").unwrap();
            writeln!(output, "  Bank:    {}", bank.bank_name).unwrap();
            writeln!(output, "  Account: {}", bank.account_name).unwrap();
            writeln!(output, "  SWIFT:   {}", bank.swift_code).unwrap();
        }

        if let Some(ref notes) = invoice.notes {
            writeln!(output, "\nNotes: {}", notes).unwrap();
        }

        output
    }

    fn format_predictions(&self, rows: &[PredictionRow]) -> String {
        if rows.is_empty() {
            return "No predictions returned.\n".to_string();
        }

        let width = rows
            .iter()
            .map(|r| r.customer_id.chars().count())
            .max()
            .unwrap_or(0)
            .max("Customer ID".len());

        let mut output = String::new();
        writeln!(output, "{:<width$}  {:<20}  Confidence", "Customer ID", "Risk Level").unwrap();
        for row in rows {
            let (label, confidence) = outcome_cells(&row.outcome);
            writeln!(output, "{:<width$}  {:<20}  {}", row.customer_id, label, confidence).unwrap();
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_ingest_report(&self, report: &IngestReport) -> String {
        let mut value = serde_json::to_value(report).unwrap_or_default();
        if let Some(fields) = value.as_object_mut() {
            fields.insert("chunks_grouped".into(), report.chunks_grouped().into());
            fields.insert("rows_inserted".into(), report.rows_inserted().into());
        }
        self.render(&value)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_extraction(&self, info: &ExtractionInfo) -> String {
        self.render(info)
    }

    fn format_invoice(&self, invoice: &Invoice) -> String {
        self.render(invoice)
    }

    fn format_predictions(&self, rows: &[PredictionRow]) -> String {
        let rows: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                let mut value = serde_json::to_value(row).unwrap_or_default();
                if let (Some(fields), Some(percent)) =
                    (value.as_object_mut(), row.outcome.confidence_percent())
                {
                    fields.insert("confidence_percent".into(), percent.into());
                }
                value
            })
            .collect();
        self.render(&serde_json::json!({"predictions": rows}))
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_ingest_report(&self, report: &IngestReport) -> String {
        let mut output = String::new();
        if report.dry_run {
            writeln!(output, "## Ingestion dry run\n").unwrap();
        } else {
            writeln!(output, "## Ingestion complete\n").unwrap();
        }
        writeln!(output, "- **Source:** `{}`", report.source).unwrap();
        if let Some(ref client) = report.client {
            writeln!(output, "- **Client:** {} (id {})", client.name, client.id).unwrap();
        }
        writeln!(output, "- **Files:** {} listed, {} processed, {} skipped",
            report.files_listed,
            report.files_processed,
            report.skipped.len()
        )
        .unwrap();
        writeln!(output, "- **Chunks grouped:** {}", report.chunks_grouped()).unwrap();
        if !report.dry_run {
            writeln!(output, "- **Rows inserted:** {}", report.rows_inserted()).unwrap();
        }
        writeln!(output, "- **Duration:** {}ms", report.duration_ms).unwrap();

        if !report.years.is_empty() {
            writeln!(output, "\n| Year | Files | Chunks | Inserted | Status |").unwrap();
            writeln!(output, "|------|-------|--------|----------|--------|").unwrap();
            for year in &report.years {
                let status = match year.error {
                    Some(ref e) => format!("⚠️ {}", e),
                    None => "✅".to_string(),
                };
                writeln!(
                    output,
                    "| {} | {} | {} | {} | {} |",
                    year.year, year.files, year.chunks, year.inserted, status
                )
                .unwrap();
            }
        }

        if !report.skipped.is_empty() {
            writeln!(output, "\n### Skipped\n").unwrap();
            for skipped in &report.skipped {
                writeln!(output, "- `{}`: {}", skipped.file, skipped.reason).unwrap();
            }
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();
        writeln!(output, "| Component | Status | Details |").unwrap();
        writeln!(output, "|-----------|--------|---------|").unwrap();
        let db = if status.database_connected { "✅" } else { "❌" };
        writeln!(output, "| PostgreSQL | {} | `{}` |", db, status.database).unwrap();
        let emb = if status.embedding_configured { "✅" } else { "❌" };
        writeln!(output, "| Embedding | {} | {} |", emb, status.embedding_model).unwrap();
        writeln!(
            output,
            "| Source | {} | {} |",
            if status.source.is_some() { "✅" } else { "➖" },
            status.source.as_deref().unwrap_or("-")
        )
        .unwrap();

        writeln!(output, "\n### {}\n", status.client_name).unwrap();
        if status.client_id.is_none() {
            writeln!(output, "_Not ingested yet._").unwrap();
            return output;
        }
        writeln!(output, "| Year | Chunks |").unwrap();
        writeln!(output, "|------|--------|").unwrap();
        for year in &status.years {
            writeln!(output, "| {} | {} |", year.year, year.chunks).unwrap();
        }
        writeln!(output, "| **Total** | **{}** |", status.total_chunks()).unwrap();
        output
    }

    fn format_extraction(&self, info: &ExtractionInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## `{}`\n", info.file).unwrap();
        match info.review_year {
            Some(year) => writeln!(output, "- **Review year:** {}", year).unwrap(),
            None => writeln!(output, "- **Review year:** none (would be skipped)").unwrap(),
        }
        writeln!(output, "- **Pages:** {}", info.pages).unwrap();
        writeln!(output, "- **Characters:** {}", info.characters).unwrap();
        writeln!(output, "- **Chunks:** {}", info.chunk_count).unwrap();

        if let Some(ref chunks) = info.chunks {
            for (i, chunk) in chunks.iter().enumerate() {
                writeln!(output, "\n### Chunk {}\n", i + 1).unwrap();
                writeln!(output, "```").unwrap();
                writeln!(output, "{}", preview(chunk, CHUNK_PREVIEW_CHARS)).unwrap();
                writeln!(output, "```").unwrap();
            }
        }
        output
    }

    fn format_invoice(&self, invoice: &Invoice) -> String {
        let mut output = String::new();
        writeln!(output, "## Invoice {}\n", invoice.invoice_number).unwrap();
        writeln!(output, "| Invoice date | Due date | PO number | Total due |").unwrap();
        writeln!(output, "|--------------|----------|-----------|-----------|").unwrap();
        writeln!(
            output,
            "| {} | {} | {} | **{}** |",
            invoice.invoice_date,
            invoice.due_date,
            invoice.po_number.as_deref().unwrap_or("N/A"),
            format_currency(invoice.total_amount_due)
        )
        .unwrap();

        writeln!(output, "\n**Bill to:** {}  ", party_line(&invoice.bill_to.name, &invoice.bill_to.address)).unwrap();
        writeln!(output, "**Ship to:** {}", party_line(&invoice.ship_to.name, &invoice.ship_to.address)).unwrap();

        let columns = invoice.line_item_columns();
        if !columns.is_empty() {
            writeln!(output, "\n### Line items\n").unwrap();
            writeln!(output, "| {} |", columns.join(" | ")).unwrap();
            writeln!(
                output,
                "|{}|",
                columns.iter().map(|_| "---").collect::<Vec<_>>().join("|")
            )
            .unwrap();
            for item in &invoice.line_items {
                let cells: Vec<String> = columns.iter().map(|c| cell_text(item.get(c))).collect();
                writeln!(output, "| {} |", cells.join(" | ")).unwrap();
            }
        }

        if let Some(ref bank) = invoice.payment_methods.bank_transfer {
            writeln!(output, "\n### Bank transfer\n").unwrap();
            writeln!(output, "- **Bank:** {}", bank.bank_name).unwrap();
            writeln!(output, "- **Account:** {}", bank.account_name).unwrap();
            writeln!(output, "- **SWIFT:** {}", bank.swift_code).unwrap();
        }

        if let Some(ref notes) = invoice.notes {
            writeln!(output, "\n> {}", notes).unwrap();
        }

        output
    }

    fn format_predictions(&self, rows: &[PredictionRow]) -> String {
        if rows.is_empty() {
            return "_No predictions returned._\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "| Customer ID | Risk Level | Confidence |").unwrap();
        writeln!(output, "|-------------|------------|------------|").unwrap();
        for row in rows {
            let (label, confidence) = outcome_cells(&row.outcome);
            writeln!(output, "| {} | {} | {} |", row.customer_id, label, confidence).unwrap();
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
