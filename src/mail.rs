//! Outbound mail interface. Delivery itself is a deployment concern; the
//! service only needs a seam it can call and a disabled implementation for
//! test mode.

use anyhow::Result;
use tracing::info;

/// What happened to a message handed to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailOutcome {
    Sent,
    Skipped,
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body_html: &str) -> Result<MailOutcome>;
}

/// Sender used when mail is disabled: every message is skipped.
pub struct DisabledMailer;

#[async_trait::async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, to: &str, _subject: &str, _body_html: &str) -> Result<MailOutcome> {
        info!(to = to, "mail_skipped");
        Ok(MailOutcome::Skipped)
    }
}

/// Sender that records the dispatch for the relay to pick up out-of-band.
///
/// Bodies are never logged; verification links would leak the token into the
/// log stream.
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body_html: &str) -> Result<MailOutcome> {
        info!(to = to, subject = subject, "mail_dispatched");
        Ok(MailOutcome::Sent)
    }
}
