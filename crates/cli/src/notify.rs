//! Email delivery for run reports.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{info, warn};

use crate::config::Config;

/// SMTP notifier configured from the environment.
///
/// Supports plaintext, STARTTLS, and implicit TLS, with optional
/// authentication. When both SSL and TLS are requested, TLS wins.
pub struct EmailNotifier {
    server: Option<String>,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    use_tls: bool,
    use_ssl: bool,
    from: String,
    reply_to: String,
    pub recipients: Vec<String>,
    send_on_no_changes: bool,
    send_on_errors_only: bool,
}

impl EmailNotifier {
    pub fn new(config: &Config) -> Self {
        let mut use_ssl = config.smtp_use_ssl;
        if config.smtp_use_tls && use_ssl {
            warn!("both SMTP_USE_SSL and SMTP_USE_TLS are enabled, using TLS only");
            use_ssl = false;
        }

        if config.smtp_server.is_none() {
            warn!("SMTP server not configured, email notifications disabled");
        } else if config.notification_recipients.is_empty() {
            warn!("no notification recipients configured, email notifications disabled");
        }

        EmailNotifier {
            server: config.smtp_server.clone(),
            port: config.smtp_port,
            username: config.smtp_username.clone(),
            password: config.smtp_password.clone(),
            use_tls: config.smtp_use_tls,
            use_ssl,
            from: config.notification_from.clone(),
            reply_to: config.notification_reply_to.clone(),
            recipients: config.notification_recipients.clone(),
            send_on_no_changes: config.notify_on_no_changes,
            send_on_errors_only: config.notify_on_errors_only,
        }
    }

    /// Whether the configuration is complete enough to send anything.
    pub fn can_send(&self) -> bool {
        self.server.is_some() && !self.recipients.is_empty()
    }

    /// Whether a report should go out for this run.
    pub fn should_send(&self, has_changes: bool, has_errors: bool) -> bool {
        if has_errors && self.send_on_errors_only {
            return true;
        }
        if has_changes {
            return true;
        }
        self.send_on_no_changes
    }

    /// Send one plaintext message to every recipient.
    pub fn send(&self, subject: &str, body: &str) -> Result<(), String> {
        let server = self
            .server
            .as_deref()
            .ok_or_else(|| "SMTP server not configured".to_string())?;
        if self.recipients.is_empty() {
            return Err("no notification recipients configured".to_string());
        }

        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| format!("invalid from address '{}': {}", self.from, e))?;
        let reply_to: Mailbox = self
            .reply_to
            .parse()
            .map_err(|e| format!("invalid reply-to address '{}': {}", self.reply_to, e))?;

        let mut builder = Message::builder()
            .from(from)
            .reply_to(reply_to)
            .subject(subject);
        for recipient in &self.recipients {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e| format!("invalid recipient '{}': {}", recipient, e))?;
            builder = builder.to(to);
        }

        let email = builder
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| format!("could not build message: {}", e))?;

        let mut transport = if self.use_ssl {
            SmtpTransport::relay(server)
                .map_err(|e| format!("smtp relay setup failed: {}", e))?
                .port(self.port)
        } else if self.use_tls {
            SmtpTransport::starttls_relay(server)
                .map_err(|e| format!("smtp starttls setup failed: {}", e))?
                .port(self.port)
        } else {
            SmtpTransport::builder_dangerous(server).port(self.port)
        };

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            transport = transport.credentials(Credentials::new(username.clone(), password.clone()));
        }

        transport
            .build()
            .send(&email)
            .map_err(|e| format!("email send failed: {}", e))?;

        info!(subject, recipients = self.recipients.len(), "notification email sent");
        Ok(())
    }

    /// A configuration-echo message for `--send-test-email`.
    pub fn test_message(&self, version: &str) -> String {
        format!(
            "# Kometa-AI Test Email\n\n\
             This is a test email from Kometa-AI v{version} to verify your email configuration.\n\n\
             ## Configuration\n\
             - SMTP Server: {server}\n\
             - SMTP Port: {port}\n\
             - From Address: {from}\n\
             - To: {to}\n\
             - SSL: {ssl}\n\
             - TLS: {tls}\n\
             - Authentication: {auth}\n\n\
             If you're seeing this email, your email configuration is working correctly!",
            version = version,
            server = self.server.as_deref().unwrap_or("(unset)"),
            port = self.port,
            from = self.from,
            to = self.recipients.join(", "),
            ssl = if self.use_ssl { "Enabled" } else { "Disabled" },
            tls = if self.use_tls { "Enabled" } else { "Disabled" },
            auth = if self.username.is_some() {
                "Enabled"
            } else {
                "Disabled"
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier(server: Option<&str>, recipients: Vec<&str>) -> EmailNotifier {
        EmailNotifier {
            server: server.map(String::from),
            port: 25,
            username: None,
            password: None,
            use_tls: false,
            use_ssl: false,
            from: "kometa-ai@localhost".to_string(),
            reply_to: "kometa-ai@localhost".to_string(),
            recipients: recipients.into_iter().map(String::from).collect(),
            send_on_no_changes: false,
            send_on_errors_only: true,
        }
    }

    #[test]
    fn test_can_send_requires_server_and_recipients() {
        assert!(notifier(Some("mail.example.com"), vec!["a@example.com"]).can_send());
        assert!(!notifier(None, vec!["a@example.com"]).can_send());
        assert!(!notifier(Some("mail.example.com"), vec![]).can_send());
    }

    #[test]
    fn test_should_send_gating() {
        let n = notifier(Some("mail.example.com"), vec!["a@example.com"]);
        assert!(n.should_send(true, false));
        assert!(n.should_send(false, true));
        assert!(!n.should_send(false, false));

        let mut on_no_changes = notifier(Some("mail.example.com"), vec!["a@example.com"]);
        on_no_changes.send_on_no_changes = true;
        assert!(on_no_changes.should_send(false, false));
    }

    #[test]
    fn test_test_message_echoes_configuration() {
        let n = notifier(Some("mail.example.com"), vec!["a@example.com"]);
        let message = n.test_message("0.4.0");
        assert!(message.contains("mail.example.com"));
        assert!(message.contains("a@example.com"));
        assert!(message.contains("v0.4.0"));
    }
}
