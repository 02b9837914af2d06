use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::convert::Converter;
use crate::error::RelayError;
use crate::ingest::Ingestor;
use crate::relay::Deliverer;
use crate::state_machine::{ItemState, RunReport, StateMachine, WorkItem, Workflow};
use crate::store::RecordStore;

/// Format of the date token embedded in attachment names.
pub const DATE_TOKEN_FORMAT: &str = "%m-%d-%Y";

/// Source of "now" for date filtering and `sending_time`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Drives work items from the record store through conversion and delivery
/// and commits the resulting state, one item at a time.
///
/// Holds no state of its own between runs; everything is re-read from the
/// store, so an interrupted commit is picked up again on the next tick.
pub struct JobOrchestrator<S, C, D, I> {
    store: Arc<S>,
    converter: C,
    deliverer: D,
    ingestor: I,
    clock: Arc<dyn Clock>,
}

impl<S, C, D, I> JobOrchestrator<S, C, D, I>
where
    S: RecordStore,
    C: Converter,
    D: Deliverer,
    I: Ingestor,
{
    pub fn new(store: Arc<S>, converter: C, deliverer: D, ingestor: I) -> Self {
        Self {
            store,
            converter,
            deliverer,
            ingestor,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Today's date as it appears in attachment names, e.g. `03-01-2024`.
    pub fn date_token(&self) -> String {
        self.clock.now().format(DATE_TOKEN_FORMAT).to_string()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }

    /// Convert and send today's unhandled work items.
    ///
    /// Items whose attachment name does not carry today's date token are left
    /// untouched and stay eligible for later runs.
    pub async fn run_primary_delivery(&self) -> Result<RunReport, RelayError> {
        let mut report = RunReport::start(Workflow::Primary, self.now_utc());
        info!(workflow = %Workflow::Primary, "Start to create PDFs.");

        let items = self.store.find_eligible_for_primary()?;
        report.selected = items.len();
        if items.is_empty() {
            info!(workflow = %Workflow::Primary, "No eligible work items.");
            return Ok(report.finish(self.now_utc()));
        }

        let today = self.date_token();
        let (batch, excluded): (Vec<WorkItem>, Vec<WorkItem>) = items
            .into_iter()
            .partition(|i| i.attachment.as_ref().is_some_and(|a| a.matches_date(&today)));
        report.filtered_out = excluded.len();
        for item in &excluded {
            debug!(item_id = %item.id, attachment = item.attachment_name(), today = %today, "not dated today, skipping");
        }
        if batch.is_empty() {
            info!(workflow = %Workflow::Primary, today = %today, skipped = excluded.len(), "No work items dated today.");
            return Ok(report.finish(self.now_utc()));
        }

        self.convert_deliver_commit(Workflow::Primary, batch, &today, &mut report).await?;
        Ok(report.finish(self.now_utc()))
    }

    /// Convert and resend every item flagged with a sending error, regardless of date.
    ///
    /// Not scheduled unless enabled in config; also runnable on demand.
    pub async fn run_retry_delivery(&self) -> Result<RunReport, RelayError> {
        let mut report = RunReport::start(Workflow::Retry, self.now_utc());
        info!(workflow = %Workflow::Retry, "Start to resend emails.");

        let batch = self.store.find_eligible_for_retry()?;
        report.selected = batch.len();
        if batch.is_empty() {
            info!(workflow = %Workflow::Retry, "No eligible work items.");
            return Ok(report.finish(self.now_utc()));
        }

        let today = self.date_token();
        self.convert_deliver_commit(Workflow::Retry, batch, &today, &mut report).await?;
        Ok(report.finish(self.now_utc()))
    }

    /// Pull new items from the inbound source. Failures are logged, never returned.
    pub async fn run_ingestion(&self) {
        match self.ingestor.ingest().await {
            Ok(created) => debug!(created, "ingestion finished"),
            Err(e) => error!(error = %e, "ingestion failed"),
        }
    }

    async fn convert_deliver_commit(
        &self,
        workflow: Workflow,
        batch: Vec<WorkItem>,
        today: &str,
        report: &mut RunReport,
    ) -> Result<(), RelayError> {
        let mut pending: HashSet<Uuid> = batch.iter().map(|i| i.id).collect();
        let conversion = self.converter.convert(batch).await;

        // One combined message for the whole batch: its outcome applies to
        // every converted item alike.
        let converted_state = if conversion.attachments.is_empty() {
            ItemState::Pending
        } else {
            info!(%workflow, attachments = conversion.attachments.len(), "Start to send email.");
            match self.deliverer.send(&conversion.attachments, today).await {
                Ok(()) => ItemState::Sent,
                Err(e) => {
                    warn!(%workflow, error = %e, items = conversion.attachments.len(), "delivery failed, flagging batch for retry");
                    ItemState::DeliveryFailed
                }
            }
        };

        let now = self.now_utc();
        let outcomes = conversion
            .attachments
            .into_iter()
            .map(|pdf| (pdf.item, converted_state))
            .chain(conversion.failed.into_iter().map(|i| (i, ItemState::ConversionFailed)));

        for (mut item, outcome) in outcomes {
            if !pending.remove(&item.id) {
                warn!(item_id = %item.id, "converter returned an item outside the batch, ignoring");
                continue;
            }
            if StateMachine::commit(&mut item, workflow, outcome, now) {
                self.store.save(&item)?;
                report.record(outcome);
                debug!(item_id = %item.id, %workflow, state = %outcome, "committed");
            }
        }

        if !pending.is_empty() {
            warn!(%workflow, missing = pending.len(), "converter dropped items, leaving them pending");
        }
        info!(
            %workflow,
            sent = report.sent,
            conversion_failed = report.conversion_failed,
            delivery_failed = report.delivery_failed,
            "run committed"
        );
        Ok(())
    }
}
