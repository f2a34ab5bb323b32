//! Connection presets for the common mail providers.

use db::models::email_account::EmailProvider;
use serde::Serialize;
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
pub struct ProviderPreset {
    pub provider: EmailProvider,
    pub label: String,
    pub imap_host: String,
    pub imap_port: i32,
    pub smtp_host: String,
    pub smtp_port: i32,
    pub use_ssl: bool,
}

const PRESETS: &[(EmailProvider, &str, &str, i32, &str, i32)] = &[
    (EmailProvider::Gmail, "Gmail", "imap.gmail.com", 993, "smtp.gmail.com", 587),
    (
        EmailProvider::Outlook,
        "Outlook",
        "outlook.office365.com",
        993,
        "smtp.office365.com",
        587,
    ),
    (
        EmailProvider::Yahoo,
        "Yahoo Mail",
        "imap.mail.yahoo.com",
        993,
        "smtp.mail.yahoo.com",
        465,
    ),
    (EmailProvider::Icloud, "iCloud Mail", "imap.mail.me.com", 993, "smtp.mail.me.com", 587),
];

/// `None` for [`EmailProvider::Custom`], which needs explicit hosts.
pub fn preset(provider: EmailProvider) -> Option<ProviderPreset> {
    PRESETS
        .iter()
        .find(|(p, ..)| *p == provider)
        .map(|(provider, label, imap_host, imap_port, smtp_host, smtp_port)| ProviderPreset {
            provider: *provider,
            label: label.to_string(),
            imap_host: imap_host.to_string(),
            imap_port: *imap_port,
            smtp_host: smtp_host.to_string(),
            smtp_port: *smtp_port,
            use_ssl: true,
        })
}

pub fn all_presets() -> Vec<ProviderPreset> {
    PRESETS.iter().filter_map(|(p, ..)| preset(*p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_providers() {
        let gmail = preset(EmailProvider::Gmail).unwrap();
        assert_eq!(gmail.imap_host, "imap.gmail.com");
        assert_eq!(gmail.smtp_port, 587);

        let yahoo = preset(EmailProvider::Yahoo).unwrap();
        assert_eq!(yahoo.smtp_port, 465);

        assert!(preset(EmailProvider::Custom).is_none());
        assert_eq!(all_presets().len(), 4);
    }
}
