//! The `dues notify` command: fetch the roster, classify everyone, derive payment records for the
//! unpaid, and send (or dry-run) one notification email per unpaid member.

use crate::api::{Gmail, GoogleSheet, Mailer, OutgoingEmail, Sheet, TokenProvider};
use crate::commands::Out;
use crate::model::{
    classify, EmailAddress, PaymentRecord, PaymentTerms, Roster, SchemaConfig, TroopTable,
};
use crate::{spd, Config, MailConfig, Result};
use serde::Serialize;
use tracing::{error, info, warn};

/// Counts reported at the end of a notification run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct NotifySummary {
    /// Number of people in the roster.
    total: usize,

    /// People with no usable email address. Reported, never emailed.
    missing_contact: usize,

    /// People whose dues are settled.
    paid: usize,

    /// People owing money, before any per-row rejections.
    unpaid: usize,

    /// Syntactically invalid addresses that were skipped across the whole roster.
    invalid_emails: usize,

    /// Unpaid people whose payment record could not be derived.
    rejected: usize,

    /// Notifications sent (or rendered, in a dry run).
    sent: usize,

    /// Notifications that the mail backend refused. The rest of the batch still runs.
    send_failures: usize,
}

impl NotifySummary {
    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

/// Handles the `dues notify` command.
///
/// With `send == false` (the default) this is a dry run: the full pipeline executes, every email
/// is rendered and logged, and nothing leaves the machine. `--send` makes it real.
pub async fn notify(config: Config, send: bool) -> Result<Out<NotifySummary>> {
    let troops = config.troop_table()?;
    // Computed once so that every notification in the batch carries the same due date.
    let terms = PaymentTerms::new(config.payment(), chrono::Local::now().date_naive())?;

    let token_provider =
        TokenProvider::load(&config.client_secret_path(), &config.token_path()).await?;
    let mut sheet = GoogleSheet::new(config.spreadsheet_id(), token_provider);
    let grid = sheet.get(config.sheet_name()).await?;

    let include_due_date = config.payment().include_due_date();
    let summary = if send {
        // The same provider serves both APIs, so a refresh done for the sheet fetch carries over.
        let mut mailer = Gmail::new(
            sheet.into_token_provider(),
            config.mail().sender_name(),
            config.mail().sender_email(),
        );
        run(
            config.schema(),
            &troops,
            &terms,
            config.mail(),
            include_due_date,
            grid,
            Some(&mut mailer),
        )
        .await?
    } else {
        run(
            config.schema(),
            &troops,
            &terms,
            config.mail(),
            include_due_date,
            grid,
            None,
        )
        .await?
    };

    let mut message = format!(
        "Notified {} of {} unpaid members{}. Rejected: {}, without a usable address: {}",
        summary.sent,
        summary.unpaid,
        if send { "" } else { " (dry run)" },
        summary.rejected,
        summary.missing_contact,
    );
    if summary.send_failures > 0 {
        message.push_str(&format!(", failed to send: {}", summary.send_failures));
    }
    Ok(Out::new(message, summary))
}

/// The notification pipeline, from a raw sheet grid to sent mail. `mailer` is `None` for a dry
/// run.
async fn run(
    schema: &SchemaConfig,
    troops: &TroopTable,
    terms: &PaymentTerms,
    mail: &MailConfig,
    include_due_date: bool,
    grid: Vec<Vec<String>>,
    mut mailer: Option<&mut (dyn Mailer + Send)>,
) -> Result<NotifySummary> {
    let roster = Roster::parse(grid, schema)?;
    let classification = classify(roster, schema);

    let mut summary = NotifySummary {
        total: classification.total(),
        missing_contact: classification.missing_contact().len(),
        paid: classification.paid().len(),
        unpaid: classification.unpaid().len(),
        invalid_emails: classification.invalid_email_count(),
        ..NotifySummary::default()
    };

    for person in classification.missing_contact() {
        warn!(
            "No usable email address for {}; they will not be notified",
            person.row().describe(schema)
        );
        for (label, raw) in person.emails().invalid() {
            warn!("  the '{label}' cell holds an invalid address: '{raw}'");
        }
    }

    for person in classification.unpaid() {
        // A bad row is logged and skipped; it must not stop the rest of the batch.
        let record = match PaymentRecord::build(person.row(), schema, troops, terms) {
            Ok(record) => record,
            Err(e) => {
                error!("{e:#}");
                summary.rejected += 1;
                continue;
            }
        };
        for (label, raw) in person.emails().invalid() {
            warn!(
                "Skipping invalid address for {}: '{label}': '{raw}'",
                record.name()
            );
        }

        // The troop leader is copied on every notification for their troop.
        let mut recipients = person.emails().valid().to_vec();
        let leader = record.troop().leader_email();
        if !recipients.iter().any(|a| a.address() == leader) {
            recipients.push(EmailAddress::new(record.troop().leader_name(), leader));
        }

        let payment_code = spd::encode(&record, include_due_date);
        let email = OutgoingEmail::render(mail, &record, &recipients, &payment_code);
        match &mut mailer {
            Some(m) => {
                // One refused message must not stop the rest of the batch.
                if let Err(e) = m.send(&email).await {
                    error!("Failed to notify {}: {e:#}", record.name());
                    summary.send_failures += 1;
                    continue;
                }
                info!("Notified {} at {} address(es)", record.name(), email.to().len());
            }
            None => {
                info!(
                    "[dry run] would notify {} at {} address(es), payment code {payment_code}",
                    record.name(),
                    email.to().len()
                );
            }
        }
        summary.sent += 1;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LedgerColumns;
    use crate::PaymentConfig;
    use chrono::NaiveDate;

    const IBAN: &str = "CZ6508000000192000145399";

    struct FakeMailer {
        sent: Vec<OutgoingEmail>,
    }

    #[async_trait::async_trait]
    impl Mailer for FakeMailer {
        async fn send(&mut self, email: &OutgoingEmail) -> Result<()> {
            self.sent.push(email.clone());
            Ok(())
        }
    }

    fn schema() -> SchemaConfig {
        SchemaConfig::new(
            "Name",
            "Troop",
            "Reg",
            vec!["Email 1".to_string(), "Email 2".to_string()],
            LedgerColumns::DuePaid {
                amount_due: "Due".to_string(),
                amount_paid: "Paid".to_string(),
                amount_due_sts: None,
                amount_paid_sts: None,
            },
        )
    }

    fn troops() -> TroopTable {
        TroopTable::parse(&["Sokol, SK, 07, Vedoucí, vedouci@example.com".to_string()]).unwrap()
    }

    fn terms() -> PaymentTerms {
        let payment = PaymentConfig::new(
            IBAN,
            "99",
            None,
            "CZK",
            "Prispevky {troop_code} {name}",
            10,
            true,
        );
        PaymentTerms::new(&payment, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()).unwrap()
    }

    fn mail_config() -> MailConfig {
        MailConfig::new(
            "Oddíl",
            "oddil@example.com",
            "Ucet: {name}",
            "{amount} {currency} na {account}, VS {vs}, SS {ss}\n{payment_code}",
        )
    }

    fn grid() -> Vec<Vec<String>> {
        let rows: Vec<Vec<&str>> = vec![
            vec!["Name", "Troop", "Reg", "Email 1", "Email 2", "Due", "Paid"],
            // Unpaid with a valid address: gets a notification.
            vec!["Jana Nováková", "Sokol", "042", "jana@example.com", "", "500", "0"],
            // Fully paid: left alone.
            vec![
                "Petr Svoboda ml.",
                "Sokol",
                "043",
                "petr@example.com",
                "",
                "500",
                "500",
            ],
            // No address anywhere: reported as missing contact.
            vec!["Marie Dlouhá", "Sokol", "044", "", "", "500", "0"],
            // Unknown troop: the payment record cannot be derived, so the row is rejected.
            vec![
                "Karel Novotný",
                "Orel",
                "045",
                "karel@example.com",
                "",
                "500",
                "0",
            ],
        ];
        rows.into_iter()
            .map(|r| r.into_iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_run_sends_to_unpaid_only() {
        let mut mailer = FakeMailer { sent: Vec::new() };
        let summary = run(
            &schema(),
            &troops(),
            &terms(),
            &mail_config(),
            true,
            grid(),
            Some(&mut mailer),
        )
        .await
        .unwrap();

        assert_eq!(4, summary.total);
        assert_eq!(1, summary.paid);
        assert_eq!(1, summary.missing_contact);
        assert_eq!(2, summary.unpaid);
        assert_eq!(1, summary.rejected);
        assert_eq!(1, summary.sent);

        assert_eq!(1, mailer.sent.len());
        let email = &mailer.sent[0];
        assert_eq!("Ucet: Jana Novakova", email.subject());
        // Jana herself plus the troop leader.
        assert_eq!(2, email.to().len());
        assert_eq!("jana@example.com", email.to()[0].address());
        assert_eq!("vedouci@example.com", email.to()[1].address());
        assert_eq!(
            "500 CZK na 000019-2000145399/0800, VS 042, SS 9907\n\
            SPD*1.0*ACC:CZ6508000000192000145399*AM:500.00*CC:CZK\
            *MSG:Prispevky SK Jana Novakova*X-VS:042*X-SS:9907*DT:20260115",
            email.body()
        );
    }

    /// Refuses the first message and accepts the rest.
    struct FlakyMailer {
        calls: usize,
        sent: Vec<OutgoingEmail>,
    }

    #[async_trait::async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&mut self, email: &OutgoingEmail) -> Result<()> {
            self.calls += 1;
            if self.calls == 1 {
                return Err(anyhow::anyhow!("backend returned 500"));
            }
            self.sent.push(email.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_continues_past_send_failure() {
        let mut grid = grid();
        grid.push(
            vec!["Eva Malá", "Sokol", "046", "eva@example.com", "", "500", "0"]
                .into_iter()
                .map(|s| s.to_string())
                .collect(),
        );

        let mut mailer = FlakyMailer { calls: 0, sent: Vec::new() };
        let summary = run(
            &schema(),
            &troops(),
            &terms(),
            &mail_config(),
            true,
            grid,
            Some(&mut mailer),
        )
        .await
        .unwrap();

        // Jana's message bounced; Eva's must still go out.
        assert_eq!(2, mailer.calls);
        assert_eq!(1, mailer.sent.len());
        assert_eq!(1, summary.send_failures);
        assert_eq!(1, summary.sent);
        assert_eq!(1, summary.rejected);
    }

    #[tokio::test]
    async fn test_run_dry_run_still_counts() {
        let summary = run(
            &schema(),
            &troops(),
            &terms(),
            &mail_config(),
            true,
            grid(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(1, summary.sent);
        assert_eq!(1, summary.rejected);
    }

    #[tokio::test]
    async fn test_run_missing_column_fails() {
        let grid = vec![vec!["Name".to_string(), "Troop".to_string()]];
        let result = run(
            &schema(),
            &troops(),
            &terms(),
            &mail_config(),
            true,
            grid,
            None,
        )
        .await;
        assert!(result.is_err());
    }
}
