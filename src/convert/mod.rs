//! Conversion of work items into PDF attachments.

pub mod pdf;

use std::future::Future;

use tracing::warn;

use crate::state_machine::{UpdateAttachment, WorkItem};

/// A rendered PDF tagged with the work item it was produced from.
#[derive(Debug, Clone)]
pub struct PdfAttachment {
    pub item: WorkItem,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Result of converting a batch: every input item lands in exactly one list.
#[derive(Debug, Default)]
pub struct Conversion {
    pub attachments: Vec<PdfAttachment>,
    pub failed: Vec<WorkItem>,
}

pub trait Converter: Send + Sync {
    fn convert(&self, items: Vec<WorkItem>) -> impl Future<Output = Conversion> + Send;
}

/// Renders each attachment as a plain-text PDF report.
#[derive(Debug, Default, Clone)]
pub struct PdfRenderer;

impl PdfRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render a single item. `None` when the item cannot be converted.
    pub fn render(&self, item: &WorkItem) -> Option<PdfAttachment> {
        let attachment = item.attachment.as_ref()?;
        if attachment.well_no.trim().is_empty() {
            return None;
        }
        Some(PdfAttachment {
            item: item.clone(),
            file_name: pdf_file_name(&attachment.name),
            bytes: pdf::render_text(&report_lines(attachment)),
        })
    }
}

impl Converter for PdfRenderer {
    async fn convert(&self, items: Vec<WorkItem>) -> Conversion {
        let mut conversion = Conversion::default();
        for item in items {
            match self.render(&item) {
                Some(pdf) => conversion.attachments.push(pdf),
                None => {
                    warn!(item_id = %item.id, source = %item.source, "cannot convert work item to PDF");
                    conversion.failed.push(item);
                }
            }
        }
        conversion
    }
}

/// `daily-03-01-2024.xlsx` → `daily-03-01-2024.pdf`
fn pdf_file_name(name: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    if stem.is_empty() {
        "update.pdf".to_string()
    } else {
        format!("{stem}.pdf")
    }
}

fn report_lines(a: &UpdateAttachment) -> Vec<String> {
    let mut lines = vec![format!("Daily Drilling Update - Well {}", a.well_no), String::new()];
    let date = a.date.map(|d| d.format("%m-%d-%Y").to_string()).unwrap_or_default();
    let fields = [
        ("Date", date.as_str()),
        ("TG Target", a.tg_target.as_str()),
        ("Profile", a.profile.as_str()),
        ("DS Company", a.ds_company.as_str()),
        ("Area", a.area.as_str()),
        ("Team", a.team.as_str()),
        ("KOC Team Leader", a.koc_team_leader.as_str()),
        ("Rig", a.rig.as_str()),
        ("Drilling BHA", a.drilling_bha.as_str()),
        ("Present Activity", a.present_activity.as_str()),
        ("Formation", a.formation.as_str()),
    ];
    push_fields(&mut lines, &fields);

    if let Some(bit) = &a.bit_hydraulics {
        lines.push(String::new());
        lines.push("Bit Hydraulics".to_string());
        push_fields(
            &mut lines,
            &[
                ("Bit Size", bit.bit_size.as_str()),
                ("Bit Type", bit.bit_type.as_str()),
                ("Nozzles", bit.nozzles.as_str()),
                ("Flow Rate", bit.flow_rate.as_str()),
                ("Pump Pressure", bit.pump_pressure.as_str()),
                ("HSI", bit.hsi.as_str()),
            ],
        );
    }
    if let Some(npt) = &a.non_productive_time {
        lines.push(String::new());
        lines.push("Non-Productive Time".to_string());
        push_fields(
            &mut lines,
            &[
                ("Hours", npt.hours.as_str()),
                ("Category", npt.category.as_str()),
            ],
        );
        // Free-text descriptions get wrapped so they stay on the page.
        for chunk in wrap(&npt.description, 80) {
            lines.push(format!("  {chunk}"));
        }
    }
    lines
}

fn push_fields(lines: &mut Vec<String>, fields: &[(&str, &str)]) {
    for (label, value) in fields {
        if !value.trim().is_empty() {
            lines.push(format!("{label}: {}", value.trim()));
        }
    }
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.len() + 1 + word.len() > width {
            out.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        out.push(line);
    }
    out
}
