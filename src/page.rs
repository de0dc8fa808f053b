//! Capabilities the crawl needs from a browser page
//!
//! The crawler and downloader only talk to these traits. The WebDriver
//! backend lives in `crawlers::web`; tests use a scripted fake.

#![allow(async_fn_in_trait)]

use crate::config::LoginConfig;
use crate::{Error, Result};
use std::time::Duration;

/// Navigation and lifetime of a page
pub trait PageDriver {
    /// Open `link` in the page
    async fn navigate(&self, link: &str) -> Result<()>;

    /// End the browser session
    async fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Element lookup on the current page
pub trait PageQuery {
    type Element;

    /// Wait until an element matches `selector`, or fail with `ElementNotFound`
    async fn wait_for_first(&self, selector: &str, timeout: Duration) -> Result<Self::Element>;

    /// All elements currently matching `selector`, in document order
    async fn find_all(&self, selector: &str) -> Result<Vec<Self::Element>>;

    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    async fn text(&self, element: &Self::Element) -> Result<String>;
}

/// User interaction on the current page
pub trait PageInteraction: PageQuery {
    async fn click(&self, element: &Self::Element) -> Result<()>;

    /// Open the context menu on `target`, then click the menu entry
    /// matching `menu_selector` once it renders within `timeout`
    async fn right_click_then_click(
        &self,
        target: &Self::Element,
        menu_selector: &str,
        timeout: Duration,
    ) -> Result<()>;

    /// Type `text` into the first element matching `selector`
    async fn type_into(&self, selector: &str, text: &str, timeout: Duration) -> Result<()>;
}

/// A page that supports everything a crawl session does
pub trait Page: PageDriver + PageInteraction {}

impl<T: PageDriver + PageInteraction> Page for T {}

/// Read the `href` of a link element
pub async fn href<P: PageQuery>(page: &P, element: &P::Element) -> Result<String> {
    page.attribute(element, "href")
        .await?
        .filter(|href| !href.is_empty())
        .ok_or_else(|| Error::MissingAttribute("href".to_string()))
}

/// Logs a session in before the crawl starts
pub trait Authenticator {
    async fn log_in<P: Page>(&self, page: &P) -> Result<()>;
}

/// Email/password login through a web form
#[derive(Debug, Clone)]
pub struct FormLogin {
    email: String,
    password: String,
    form: LoginConfig,
    timeout: Duration,
    field_timeout: Duration,
}

impl FormLogin {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        form: LoginConfig,
        timeout: Duration,
        field_timeout: Duration,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            form,
            timeout,
            field_timeout,
        }
    }
}

impl Authenticator for FormLogin {
    async fn log_in<P: Page>(&self, page: &P) -> Result<()> {
        ::log::info!("Logging in at {}", self.form.url);
        page.navigate(&self.form.url).await?;
        page.type_into(&self.form.email_input, &self.email, self.field_timeout)
            .await?;
        page.type_into(&self.form.password_input, &self.password, self.field_timeout)
            .await?;

        let submit = page
            .wait_for_first(&self.form.submit_button, self.field_timeout)
            .await?;
        page.click(&submit).await?;

        page.wait_for_first(&self.form.success_marker, self.timeout)
            .await?;
        ::log::info!("Logged in");
        Ok(())
    }
}

/// Skips login, for sites that are public
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLogin;

impl Authenticator for NoLogin {
    async fn log_in<P: Page>(&self, _page: &P) -> Result<()> {
        ::log::debug!("No login configured");
        Ok(())
    }
}
