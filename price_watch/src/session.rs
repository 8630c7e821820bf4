//! Catalog browsing session
//!
//! One cookie-keeping HTTP client per run. Logging in turns a
//! [`CatalogSession`] into an [`AuthenticatedSession`]; the client is released
//! when the session value is dropped, whichever way the run ends.

use crate::config::{CrawlConfig, Credentials};
use crate::error::{Result, WatchError};
use crate::extract::{has_login_form, login_form};
use reqwest::{Client, Url};
use std::ops::Deref;
use std::time::Duration;

const USERNAME_FIELD: &str = "_username";
const PASSWORD_FIELD: &str = "_password";

/// Cookie-keeping client used for every navigation of a run
pub struct CatalogSession {
    client: Client,
    page_timeout: Duration,
}

impl CatalogSession {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.as_str())
            .build()?;
        log::debug!("Opened catalog session");
        Ok(Self {
            client,
            page_timeout: config.page_timeout,
        })
    }

    /// Load a page and return its body; non-2xx statuses are errors
    pub async fn fetch_page(&self, url: &Url) -> Result<String> {
        self.fetch_with_timeout(url, self.page_timeout).await
    }

    async fn fetch_with_timeout(&self, url: &Url, timeout: Duration) -> Result<String> {
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WatchError::HttpStatus(response.status()));
        }

        Ok(response.text().await?)
    }

    /// Logs into the reseller area.
    ///
    /// Loads the login page, fills the username and password fields of its
    /// form and submits it. Succeeds only if the page reached after submission
    /// no longer asks for a password. Every failure maps to
    /// [`WatchError::Authentication`].
    pub async fn authenticate(
        self,
        login_url: &Url,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<AuthenticatedSession> {
        log::info!("Logging in at {}", login_url);

        let page = self
            .fetch_with_timeout(login_url, timeout)
            .await
            .map_err(|e| WatchError::Authentication(format!("login page: {}", e)))?;

        let mut form = login_form(&page, login_url).ok_or_else(|| {
            WatchError::Authentication(format!("no login form at {}", login_url))
        })?;
        form.set(USERNAME_FIELD, &credentials.username);
        form.set(PASSWORD_FIELD, &credentials.password);

        let response = self
            .client
            .post(form.action.clone())
            .form(&form.fields)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| WatchError::Authentication(format!("submit: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WatchError::Authentication(format!(
                "login returned HTTP {}",
                status
            )));
        }

        let landing = response
            .text()
            .await
            .map_err(|e| WatchError::Authentication(format!("submit: {}", e)))?;
        if has_login_form(&landing) {
            return Err(WatchError::Authentication(
                "credentials rejected, still on the login form".to_string(),
            ));
        }

        log::info!("Login successful");
        Ok(AuthenticatedSession(self))
    }
}

impl Drop for CatalogSession {
    fn drop(&mut self) {
        log::debug!("Closed catalog session");
    }
}

/// Session carrying the reseller login cookies
pub struct AuthenticatedSession(CatalogSession);

impl AuthenticatedSession {
    /// Wrap a session without logging in (for testing)
    #[cfg(test)]
    pub(crate) fn assume_authenticated(session: CatalogSession) -> Self {
        Self(session)
    }
}

impl Deref for AuthenticatedSession {
    type Target = CatalogSession;

    fn deref(&self) -> &CatalogSession {
        &self.0
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
