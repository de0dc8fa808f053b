use crate::config::RipConfig;
use crate::page::{PageDriver, PageInteraction, PageQuery};
use crate::session::SessionFactory;
use crate::{Error, Result};
use fantoccini::actions::{
    InputSource, MOUSE_BUTTON_LEFT, MOUSE_BUTTON_RIGHT, MouseActions, PointerAction,
};
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::time::Duration;

/// A browser page driven over WebDriver
pub struct WebPage {
    client: Client,
}

impl WebPage {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Move the pointer onto `element` and press `button` there
    async fn press_on(&self, element: &Element, button: u64) -> Result<()> {
        let actions = MouseActions::new("mouse".to_string())
            .then(PointerAction::MoveToElement {
                element: element.clone(),
                duration: None,
                x: 0,
                y: 0,
            })
            .then(PointerAction::Down { button })
            .then(PointerAction::Up { button });
        self.client.perform_actions(actions).await?;
        self.client.release_actions().await?;
        Ok(())
    }
}

impl PageDriver for WebPage {
    async fn navigate(&self, link: &str) -> Result<()> {
        ::log::debug!("GOTO: {}", link);
        self.client.goto(link).await?;
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

impl PageQuery for WebPage {
    type Element = Element;

    async fn wait_for_first(&self, selector: &str, timeout: Duration) -> Result<Element> {
        self.client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
            .map_err(|e| match e {
                CmdError::WaitTimeout => Error::ElementNotFound {
                    selector: selector.to_string(),
                    timeout,
                },
                other => Error::WebDriver(other),
            })
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Element>> {
        Ok(self.client.find_all(Locator::Css(selector)).await?)
    }

    async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        Ok(element.attr(name).await?)
    }

    async fn text(&self, element: &Element) -> Result<String> {
        Ok(element.text().await?)
    }
}

impl PageInteraction for WebPage {
    async fn click(&self, element: &Element) -> Result<()> {
        element.click().await?;
        Ok(())
    }

    async fn right_click_then_click(
        &self,
        target: &Element,
        menu_selector: &str,
        timeout: Duration,
    ) -> Result<()> {
        self.press_on(target, MOUSE_BUTTON_RIGHT).await?;
        let menu = self.wait_for_first(menu_selector, timeout).await?;
        self.press_on(&menu, MOUSE_BUTTON_LEFT).await
    }

    async fn type_into(&self, selector: &str, text: &str, timeout: Duration) -> Result<()> {
        let input = self.wait_for_first(selector, timeout).await?;
        input.send_keys(text).await?;
        Ok(())
    }
}

/// Opens Chrome sessions over WebDriver that download into a staging directory
#[derive(Debug, Clone)]
pub struct WebSessionFactory {
    webdriver_url: String,
    headless: bool,
}

impl WebSessionFactory {
    pub fn new(config: &RipConfig) -> Self {
        Self {
            webdriver_url: config.webdriver_url.clone(),
            headless: config.headless,
        }
    }

    fn capabilities(&self, staging: &Path) -> Map<String, Value> {
        let mut args = vec!["--disable-gpu".to_string()];
        if self.headless {
            args.push("--headless=new".to_string());
        }

        let mut caps = Map::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({
                "args": args,
                "prefs": {
                    "download.default_directory": staging.to_string_lossy(),
                    "download.prompt_for_download": false,
                    "download.directory_upgrade": true,
                },
            }),
        );
        caps
    }

    /// Connects to the WebDriver instance, trying common local ports when
    /// the configured URL refuses
    async fn connect(&self, staging: &Path) -> Result<Client> {
        let caps = self.capabilities(staging);
        let mut builder = ClientBuilder::native();
        builder.capabilities(caps);

        let first_error = match builder.connect(&self.webdriver_url).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", self.webdriver_url);
                return Ok(client);
            }
            Err(e) => {
                ::log::error!(
                    "Failed to connect to WebDriver at {}: {}",
                    self.webdriver_url,
                    e
                );
                e
            }
        };

        let fallback_urls = [
            "http://localhost:9515", // ChromeDriver default
            "http://localhost:4444", // Selenium / geckodriver default
            "http://127.0.0.1:4444", // Try with IP instead of localhost
        ];

        for url in fallback_urls.iter() {
            if *url == self.webdriver_url {
                continue;
            }
            ::log::info!("Trying fallback WebDriver URL: {}", url);
            if let Ok(client) = builder.connect(url).await {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Ok(client);
            }
        }

        ::log::error!(
            "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
        );
        Err(Error::NewSession(first_error))
    }
}

impl SessionFactory for WebSessionFactory {
    type Page = WebPage;

    async fn open(&self, staging: &Path) -> Result<WebPage> {
        let client = self.connect(staging).await?;
        if let Err(e) = client.maximize_window().await {
            ::log::warn!("Could not maximize browser window: {}", e);
        }
        Ok(WebPage::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_point_downloads_at_staging() {
        let mut config = RipConfig::new(vec!["https://example.com/site".to_string()]);
        config.headless = true;
        let factory = WebSessionFactory::new(&config);

        let caps = factory.capabilities(Path::new("/tmp/.staging-abc"));
        let chrome = &caps["goog:chromeOptions"];
        assert_eq!(
            chrome["prefs"]["download.default_directory"],
            "/tmp/.staging-abc"
        );
        assert_eq!(chrome["prefs"]["download.prompt_for_download"], false);
        assert!(
            chrome["args"]
                .as_array()
                .unwrap()
                .iter()
                .any(|arg| arg == "--headless=new")
        );
    }
}
