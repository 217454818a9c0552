use anyhow::Context;
use async_trait::async_trait;

use super::MailProvider;

pub struct MailgunProvider {
    domain: String,
    api_key: String,
    from_email: String,
    client: reqwest::Client,
}

impl MailgunProvider {
    pub fn new(domain: String, api_key: String, from_email: String) -> Self {
        Self {
            domain,
            api_key,
            from_email,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl MailProvider for MailgunProvider {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let url = format!("https://api.mailgun.net/v3/{}/messages", self.domain);

        self.client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .form(&[
                ("from", self.from_email.as_str()),
                ("to", to),
                ("subject", subject),
                ("text", body),
            ])
            .send()
            .await
            .context("failed to send Mailgun email")?
            .error_for_status()
            .context("Mailgun API returned error")?;

        Ok(())
    }
}
