//! Saída de terminal do reportrelay: relatórios de execução e status.
//!
//! Usa a crate `console` para estilização com cores: verde para envios,
//! vermelho para falhas e amarelo para itens aguardando reenvio.

use console::Style;

use crate::state_machine::{RunReport, WorkItem};

/// Contagem de itens por situação no record store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusSummary {
    /// Elegíveis para a entrega primária.
    pub pending: usize,
    /// Marcados com erro de envio (elegíveis para reenvio).
    pub awaiting_retry: usize,
    /// Entregues ao menos uma vez e resolvidos.
    pub sent: usize,
    /// Resolvidos sem entrega (reenvio abandonado).
    pub abandoned: usize,
    /// Sem anexo; nunca processados.
    pub without_attachment: usize,
}

impl StatusSummary {
    pub fn from_items(items: &[WorkItem]) -> Self {
        let mut s = Self::default();
        for item in items {
            if item.is_eligible_for_retry() {
                s.awaiting_retry += 1;
            } else if item.is_eligible_for_primary() {
                s.pending += 1;
            } else if item.attachment.is_none() && !item.handled {
                s.without_attachment += 1;
            } else if item.sending_time.is_some() {
                s.sent += 1;
            } else {
                s.abandoned += 1;
            }
        }
        s
    }

    pub fn total(&self) -> usize {
        self.pending + self.awaiting_retry + self.sent + self.abandoned + self.without_attachment
    }
}

/// Impressão estilizada para o terminal.
pub struct Console {
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl Default for Console {
    fn default() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }
}

impl Console {
    /// Imprime o resultado de uma execução de workflow.
    pub fn print_report(&self, report: &RunReport) {
        let failed = report.conversion_failed + report.delivery_failed;
        let (mark, style) = if failed > 0 {
            ("✗", &self.red)
        } else if report.sent > 0 {
            ("✓", &self.green)
        } else {
            ("·", &self.dim)
        };
        println!(
            "  {} {} delivery: {} selected, {} skipped by date, {} sent, {} conversion failed, {} delivery failed ({} ms)",
            style.apply_to(mark),
            report.workflow,
            report.selected,
            report.filtered_out,
            report.sent,
            report.conversion_failed,
            report.delivery_failed,
            report.duration_ms
        );
    }

    /// Imprime o resumo do record store.
    pub fn print_status(&self, summary: &StatusSummary) {
        println!("{}", self.dim.apply_to("─── Work items ───"));
        println!("  pending           {}", summary.pending);
        println!("  awaiting retry    {}", self.yellow.apply_to(summary.awaiting_retry));
        println!("  sent              {}", self.green.apply_to(summary.sent));
        println!("  abandoned         {}", self.red.apply_to(summary.abandoned));
        println!("  no attachment     {}", summary.without_attachment);
        println!("  total             {}", summary.total());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::UpdateAttachment;
    use chrono::Utc;

    fn item() -> WorkItem {
        WorkItem::new(
            "a.json".into(),
            Some(UpdateAttachment {
                name: "a".into(),
                ..Default::default()
            }),
        )
    }

    #[test]
    fn summary_buckets_each_item_once() {
        let pending = item();
        let mut retry = item();
        retry.handled = true;
        retry.has_sending_error = true;
        let mut sent = item();
        sent.handled = true;
        sent.sending_time = Some(Utc::now());
        let mut abandoned = item();
        abandoned.handled = true;
        let raw = WorkItem::new("raw.json".into(), None);

        let summary = StatusSummary::from_items(&[pending, retry, sent, abandoned, raw]);
        assert_eq!(
            summary,
            StatusSummary {
                pending: 1,
                awaiting_retry: 1,
                sent: 1,
                abandoned: 1,
                without_attachment: 1,
            }
        );
        assert_eq!(summary.total(), 5);
    }
}
