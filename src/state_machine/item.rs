use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bit hydraulics section of a drilling update. Owned by its attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitHydraulics {
    pub bit_size: String,
    pub bit_type: String,
    pub nozzles: String,
    pub flow_rate: String,
    pub pump_pressure: String,
    pub hsi: String,
}

/// Non-productive time section of a drilling update. Owned by its attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonProductiveTime {
    pub hours: String,
    pub category: String,
    pub description: String,
}

/// The source material a work item is converted from.
///
/// `name` carries the report date as an `MM-DD-YYYY` token, e.g.
/// `"daily-update-03-01-2024.xlsx"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateAttachment {
    pub name: String,
    pub well_no: String,
    pub tg_target: String,
    pub profile: String,
    pub ds_company: String,
    pub area: String,
    pub team: String,
    pub koc_team_leader: String,
    pub rig: String,
    pub drilling_bha: String,
    pub present_activity: String,
    pub formation: String,
    pub date: Option<NaiveDate>,
    pub bit_hydraulics: Option<BitHydraulics>,
    pub non_productive_time: Option<NonProductiveTime>,
}

impl UpdateAttachment {
    /// Whether the attachment name carries the given date token.
    pub fn matches_date(&self, token: &str) -> bool {
        self.name.contains(token)
    }
}

/// A single persisted conversion-and-delivery task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    /// Inbound file the item was ingested from.
    pub source: String,
    pub received_at: DateTime<Utc>,
    pub attachment: Option<UpdateAttachment>,
    pub handled: bool,
    pub has_sending_error: bool,
    pub sending_time: Option<DateTime<Utc>>,
}

impl WorkItem {
    pub fn new(source: String, attachment: Option<UpdateAttachment>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            received_at: Utc::now(),
            attachment,
            handled: false,
            has_sending_error: false,
            sending_time: None,
        }
    }

    pub fn is_eligible_for_primary(&self) -> bool {
        !self.handled && self.attachment.is_some()
    }

    pub fn is_eligible_for_retry(&self) -> bool {
        self.has_sending_error
    }

    /// Attachment name, or an empty string when there is none.
    pub fn attachment_name(&self) -> &str {
        self.attachment.as_ref().map_or("", |a| a.name.as_str())
    }
}
