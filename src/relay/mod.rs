pub mod client;
pub mod error;
pub mod types;

use std::future::Future;

pub use client::MailRelayClient;
pub use error::DeliveryError;

use crate::convert::PdfAttachment;

/// Delivers a batch of attachments as a single combined message.
///
/// `date_token` is the run's date, as used by the date filter.
pub trait Deliverer: Send + Sync {
    fn send(
        &self,
        attachments: &[PdfAttachment],
        date_token: &str,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}
