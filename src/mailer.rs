//! Report dispatch over SMTP or into a local outbox
//!
//! One message goes to every recipient at once. If the relay rejects any
//! recipient the whole send fails before DATA, so either everyone gets the
//! report or nobody does.

use crate::config::{Settings, SmtpSecurity, SmtpSettings};
use crate::error::AppError;
use crate::period::ReportingPeriod;
use crate::report::format::{format_count, format_delta, format_percent};
use crate::report::ReportArtifact;
use crate::summary::{Metric, UsageSummary};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

const TOP_SUBACCOUNTS: usize = 5;
const SMTP_TIMEOUT: Duration = Duration::from_secs(60);

enum MailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

pub struct Mailer {
    transport: MailTransport,
    sender: Mailbox,
    subject_template: String,
}

impl Mailer {
    /// Outbox directory when configured, SMTP relay otherwise
    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        match &settings.outbox_dir {
            Some(dir) => Self::outbox(dir, &settings.sender_email, &settings.subject_template),
            None => Self::smtp(&settings.smtp, &settings.sender_email, &settings.subject_template),
        }
    }

    pub fn smtp(
        smtp: &SmtpSettings,
        sender_email: &str,
        subject_template: &str,
    ) -> Result<Self, AppError> {
        let builder = match smtp.security {
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.server)?,
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.server)?,
            SmtpSecurity::None => {
                tracing::warn!(
                    server = %smtp.server,
                    "SMTP transport security is disabled; use only with a local relay"
                );
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.server)
            }
        };

        let transport = builder
            .port(smtp.port)
            .timeout(Some(SMTP_TIMEOUT))
            .credentials(Credentials::new(smtp.username.clone(), smtp.password.clone()))
            .build();

        Ok(Self {
            transport: MailTransport::Smtp(transport),
            sender: parse_mailbox(sender_email, "sender")?,
            subject_template: subject_template.to_string(),
        })
    }

    /// Write messages as `.eml` files into `dir` instead of sending them
    pub fn outbox(dir: &Path, sender_email: &str, subject_template: &str) -> Result<Self, AppError> {
        std::fs::create_dir_all(dir)?;
        tracing::info!(dir = %dir.display(), "Using file outbox for report email");

        Ok(Self {
            transport: MailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(dir)),
            sender: parse_mailbox(sender_email, "sender")?,
            subject_template: subject_template.to_string(),
        })
    }

    /// Send the report to every recipient in a single message
    pub async fn send(
        &self,
        artifact: &ReportArtifact,
        recipients: &[String],
        summary: &UsageSummary,
    ) -> Result<(), AppError> {
        let message = self.build_message(artifact, recipients, summary)?;

        match &self.transport {
            MailTransport::Smtp(smtp) => {
                smtp.send(message).await?;
            }
            MailTransport::File(file) => {
                let id = file
                    .send(message)
                    .await
                    .map_err(|e| AppError::Delivery(format!("outbox write failed: {}", e)))?;
                tracing::debug!(message_id = %id, "Report email written to outbox");
            }
        }

        tracing::info!(
            recipients = recipients.len(),
            attachment = %artifact.filename,
            "Report email sent"
        );
        Ok(())
    }

    pub fn build_message(
        &self,
        artifact: &ReportArtifact,
        recipients: &[String],
        summary: &UsageSummary,
    ) -> Result<Message, AppError> {
        if recipients.is_empty() {
            return Err(AppError::Delivery("no recipients".to_string()));
        }

        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(render_subject(&self.subject_template, &artifact.period));
        for recipient in recipients {
            builder = builder.to(parse_mailbox(recipient, "recipient")?);
        }

        let pdf = ContentType::parse("application/pdf")
            .map_err(|e| AppError::Delivery(format!("invalid attachment type: {}", e)))?;
        let attachment = Attachment::new(artifact.filename.clone()).body(artifact.bytes.clone(), pdf);

        let message = builder.multipart(
            MultiPart::mixed()
                .multipart(MultiPart::alternative_plain_html(
                    text_body(summary),
                    html_body(summary),
                ))
                .singlepart(attachment),
        )?;
        Ok(message)
    }
}

fn parse_mailbox(address: &str, role: &str) -> Result<Mailbox, AppError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| AppError::Delivery(format!("invalid {} address '{}': {}", role, address, e)))
}

/// Substitute `{period}` in the subject template
pub fn render_subject(template: &str, period: &ReportingPeriod) -> String {
    template.replace("{period}", &period.label())
}

pub fn text_body(summary: &UsageSummary) -> String {
    let totals = summary.totals();
    let mut body = String::new();

    let _ = writeln!(body, "SMTP2GO usage report for {}", summary.period().label());
    let _ = writeln!(body);
    let _ = writeln!(body, "Total emails sent:      {}", format_count(totals.sent));
    let _ = writeln!(body, "Total emails delivered: {}", format_count(totals.delivered));
    let _ = writeln!(body, "Delivery rate:          {}", format_percent(totals.delivery_rate()));
    let _ = writeln!(body, "Bounce rate:            {}", format_percent(totals.bounce_rate()));
    let _ = writeln!(body, "Active sub-accounts:    {}", summary.records().len());

    if let Some(delta) = summary.comparison().delta(Metric::Sent) {
        let _ = writeln!(body, "Sent vs previous period: {}", format_delta(delta));
    }

    let top: Vec<_> = summary.records().iter().take(TOP_SUBACCOUNTS).collect();
    if !top.is_empty() {
        let _ = writeln!(body);
        let _ = writeln!(body, "Top {} sub-accounts by volume:", top.len());
        for (i, record) in top.iter().enumerate() {
            let _ = writeln!(
                body,
                "  {}. {}: {} sent, {} delivered ({})",
                i + 1,
                record.label(),
                format_count(record.counts().sent),
                format_count(record.counts().delivered),
                format_percent(record.delivery_rate())
            );
        }
    }

    let _ = writeln!(body);
    let _ = writeln!(body, "The full report is attached as a PDF.");
    body
}

pub fn html_body(summary: &UsageSummary) -> String {
    let totals = summary.totals();
    let period = escape_html(&summary.period().label());

    let mut rows = String::new();
    for record in summary.records().iter().take(TOP_SUBACCOUNTS) {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>",
            escape_html(record.label()),
            format_count(record.counts().sent),
            format_count(record.counts().delivered),
            format_percent(record.delivery_rate())
        );
    }
    let top_table = if rows.is_empty() {
        "<p>No sub-account activity in this period.</p>".to_string()
    } else {
        format!(
            r#"<h3>Top sub-accounts by volume</h3>
        <table>
            <tr><th>Sub-account</th><th>Sent</th><th>Delivered</th><th>Delivery rate</th></tr>
            {rows}
        </table>"#
        )
    };

    let comparison = match summary.comparison().delta(Metric::Sent) {
        Some(delta) => format!("<li>Sent vs previous period: {}</li>", format_delta(delta)),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>SMTP2GO Usage Report - {period}</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ border: 1px solid #ddd; padding: 6px 8px; text-align: left; }}
        th {{ background: #f2f2f2; }}
        td.num {{ text-align: right; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>SMTP2GO Usage Report - {period}</h2>
        <ul>
            <li>Total emails sent: {sent}</li>
            <li>Total emails delivered: {delivered}</li>
            <li>Delivery rate: {delivery_rate}</li>
            <li>Bounce rate: {bounce_rate}</li>
            <li>Active sub-accounts: {subaccounts}</li>
            {comparison}
        </ul>
        {top_table}
        <div class="footer">
            <p>The full report is attached as a PDF.</p>
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#,
        sent = format_count(totals.sent),
        delivered = format_count(totals.delivered),
        delivery_rate = format_percent(totals.delivery_rate()),
        bounce_rate = format_percent(totals.bounce_rate()),
        subaccounts = summary.records().len(),
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{SubaccountUsageRecord, UsageCounts};
    use chrono::{TimeZone, Utc};

    fn summary(previous: Option<UsageCounts>) -> UsageSummary {
        let counts = |sent, delivered| UsageCounts {
            sent,
            delivered,
            ..UsageCounts::default()
        };
        let records = (1..=7)
            .map(|i| SubaccountUsageRecord::new(format!("sub{}", i), None, counts(i * 10, i * 10)))
            .chain(std::iter::once(SubaccountUsageRecord::new(
                "shop",
                Some("R&D <eu>".to_string()),
                counts(1000, 990),
            )))
            .collect();
        UsageSummary::new(
            ReportingPeriod::month(2024, 3).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 1, 6, 0, 0).unwrap(),
            records,
            previous,
        )
    }

    #[test]
    fn test_render_subject() {
        let period = ReportingPeriod::month(2024, 3).unwrap();
        assert_eq!(
            render_subject(crate::config::DEFAULT_SUBJECT_TEMPLATE, &period),
            "SMTP2GO Usage Report - March 2024"
        );
        assert_eq!(render_subject("Monthly usage", &period), "Monthly usage");
    }

    #[test]
    fn test_text_body_lists_top_five() {
        let body = text_body(&summary(None));
        assert!(body.contains("Total emails sent:      1,280"));
        assert!(body.contains("Active sub-accounts:    8"));
        assert!(body.contains("Top 5 sub-accounts by volume:"));
        assert!(body.contains("1. R&D <eu>: 1,000 sent"));
        assert!(body.contains("5. sub4:"));
        assert!(!body.contains("sub3"));
        assert!(!body.contains("previous period"));
    }

    #[test]
    fn test_html_body_escapes_labels() {
        let html = html_body(&summary(Some(UsageCounts {
            sent: 640,
            ..UsageCounts::default()
        })));
        assert!(html.contains("R&amp;D &lt;eu&gt;"));
        assert!(!html.contains("R&D <eu>"));
        assert!(html.contains("Sent vs previous period: +100.0%"));
        assert_eq!(html.matches("<tr><td>").count(), 5);
    }

    #[test]
    fn test_html_body_without_records() {
        let empty = UsageSummary::new(
            ReportingPeriod::month(2024, 3).unwrap(),
            Utc.with_ymd_and_hms(2024, 4, 1, 6, 0, 0).unwrap(),
            vec![],
            None,
        );
        assert!(html_body(&empty).contains("No sub-account activity"));
    }
}
