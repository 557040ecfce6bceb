use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

/// Signed-in user as the identity provider reports it. Only the fields the
/// dashboard needs: a unique id (sent as `userId` on session start) and a
/// display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInChallenge {
    verification_url: String,
    request_code: String,
    #[serde(default = "default_poll_interval")]
    poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    2
}

const MAX_POLLS: u32 = 60;

/// Client for the external OAuth identity broker.
///
/// Sign-in is a browser popup flow: the broker hands back a verification URL
/// and a request code, we open the URL in the system browser, then poll the
/// broker until the user finishes the popup and a user object is available.
/// Identity is optional everywhere; a missing or failing provider never
/// blocks session-lifecycle operations.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    base_url: Option<String>,
    client: Client,
}

impl IdentityClient {
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(IdentityClient { base_url, client })
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    fn base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .ok_or_else(|| anyhow!("No identity provider configured"))
    }

    /// Run the popup sign-in flow to completion.
    pub async fn sign_in(&self) -> Result<AuthUser> {
        let base = self.base_url()?;

        let response = self
            .client
            .post(format!("{}/auth/signin", base))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Identity provider rejected sign-in: {}",
                response.status()
            ));
        }
        let challenge: SignInChallenge = response.json().await?;

        tracing::info!(
            "Opening sign-in page: {} (code {})",
            challenge.verification_url,
            challenge.request_code
        );
        if let Err(e) = open::that(&challenge.verification_url) {
            // The flow still works if the user opens the URL by hand; it is
            // in the log strip.
            tracing::warn!("Could not open browser for sign-in: {}", e);
        }

        self.poll_for_user(base, &challenge).await
    }

    async fn poll_for_user(&self, base: &str, challenge: &SignInChallenge) -> Result<AuthUser> {
        let poll_url = format!("{}/auth/signin/{}", base, challenge.request_code);
        let interval = Duration::from_secs(challenge.poll_interval_secs.max(1));

        for _ in 0..MAX_POLLS {
            sleep(interval).await;

            let response = self.client.get(&poll_url).send().await?;
            match response.status() {
                status if status.is_success() => {
                    if status == reqwest::StatusCode::ACCEPTED {
                        // Popup not finished yet.
                        continue;
                    }
                    let user: AuthUser = response.json().await?;
                    tracing::info!("Signed in as {} ({})", user.display_name, user.uid);
                    return Ok(user);
                }
                reqwest::StatusCode::NOT_FOUND | reqwest::StatusCode::GONE => {
                    return Err(anyhow!("Sign-in was denied or expired"));
                }
                status => {
                    return Err(anyhow!("Identity provider error: {}", status));
                }
            }
        }

        Err(anyhow!("Sign-in timed out"))
    }

    /// Invalidate the broker-side session. The local user reference is
    /// dropped by the caller regardless of the outcome here.
    pub async fn sign_out(&self) -> Result<()> {
        let base = self.base_url()?;
        let response = self
            .client
            .post(format!("{}/auth/signout", base))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("Sign-out failed: {}", response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_defaults_poll_interval() {
        let raw = r#"{"verificationUrl": "https://id.example/verify", "requestCode": "r-1"}"#;
        let challenge: SignInChallenge = serde_json::from_str(raw).unwrap();
        assert_eq!(challenge.poll_interval_secs, 2);
    }

    #[test]
    fn unconfigured_client_reports_it() {
        let client = IdentityClient::new(None).unwrap();
        assert!(!client.is_configured());
        assert!(client.base_url().is_err());
    }
}
