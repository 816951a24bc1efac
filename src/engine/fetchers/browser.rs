//! Headless-browser fetcher (§4.C `browser-cdp`/`browser-stealth`), backed
//! by `chromiumoxide` behind the `Fetcher` trait so a remote browser service
//! could be swapped in later without touching the orchestrator.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use futures::StreamExt;

use crate::engine::abort::AbortInstance;
use crate::engine::registry::Engine;
use crate::engine::{FetchOutcome, Fetcher};
use crate::error::{EngineError, FeatureSignal};
use crate::model::{Action, ActionsResult, FeatureFlag, ProxyTier, ScrapeOptions, ScrapeUrl, ScrollDirection};

pub struct BrowserFetcher {
    engine: Engine,
    stealth: bool,
}

impl BrowserFetcher {
    pub fn cdp() -> Self {
        BrowserFetcher { engine: Engine::BrowserCdp, stealth: false }
    }

    pub fn stealth() -> Self {
        BrowserFetcher { engine: Engine::BrowserStealth, stealth: true }
    }

    async fn launch(&self, proxy: Option<ProxyTier>) -> Result<(Browser, chromiumoxide::Handler), EngineError> {
        let mut builder = BrowserConfig::builder();
        if self.stealth || matches!(proxy, Some(ProxyTier::Stealth)) {
            builder = builder.args(vec!["--disable-blink-features=AutomationControlled"]);
        }
        let config = builder
            .build()
            .map_err(|e| EngineError::Internal(format!("browser config: {e}")))?;

        Browser::launch(config)
            .await
            .map_err(|e| EngineError::Internal(format!("browser launch: {e}")))
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    fn engine(&self) -> Engine {
        self.engine
    }

    async fn fetch(
        &self,
        url: &ScrapeUrl,
        options: &ScrapeOptions,
        proxy: Option<ProxyTier>,
        abort: &AbortInstance,
    ) -> Result<FetchOutcome, EngineError> {
        abort
            .throw_if_aborted()
            .map_err(|e| EngineError::Aborted(e.reason))?;

        let (browser, mut handler) = self.launch(proxy).await?;
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let result = self.drive_page(&browser, url, options, abort).await;

        let _ = browser.close().await;
        handler_task.abort();

        result
    }
}

impl BrowserFetcher {
    async fn drive_page(
        &self,
        browser: &Browser,
        url: &ScrapeUrl,
        options: &ScrapeOptions,
        abort: &AbortInstance,
    ) -> Result<FetchOutcome, EngineError> {
        let page = browser
            .new_page(url.as_url().as_str())
            .await
            .map_err(|e| EngineError::Site(e.to_string()))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| EngineError::Site(e.to_string()))?;

        if let Some(wait_ms) = options.wait_for_ms {
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }

        let mut actions_result = ActionsResult::default();
        for action in &options.actions {
            abort
                .throw_if_aborted()
                .map_err(|e| EngineError::Aborted(e.reason))?;
            run_action(&page, action, &mut actions_result).await?;
        }
        let actions = (!options.actions.is_empty()).then_some(actions_result);

        let html = page
            .content()
            .await
            .map_err(|e| EngineError::Site(e.to_string()))?;

        let status_code = 200u16;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        let screenshot = if options.formats.contains(&crate::model::Format::Screenshot)
            || options.formats.contains(&crate::model::Format::ScreenshotFullPage)
        {
            capture_screenshot(&page, true).await
        } else {
            None
        };

        // Chromium's built-in PDF viewer renders the document inside an
        // `<embed type="application/pdf">` rather than failing navigation,
        // so a PDF surfaces here as content rather than as a response header.
        if html.contains("application/pdf") {
            if !options.parse_pdf {
                return Err(EngineError::UnsupportedFile("application/pdf".to_string()));
            }
            return Err(EngineError::Feature(FeatureSignal::AddFeature(
                vec![FeatureFlag::PDF.to_string()],
                Some(true),
            )));
        }

        if html.trim().len() < 32 {
            return Err(EngineError::EngineUnsuccessful);
        }

        Ok(FetchOutcome {
            status_code,
            final_url,
            html,
            screenshot,
            actions,
            ..Default::default()
        })
    }
}

/// Captures a full-page PNG and returns it as a data URI (§3 `screenshot?
/// (URL or data-URI)`) — callers without a blob store configured still get
/// something directly usable rather than a bare, undecoratable base64 blob.
async fn capture_screenshot(page: &chromiumoxide::Page, full_page: bool) -> Option<String> {
    let bytes = page
        .screenshot(
            chromiumoxide::page::ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(full_page)
                .build(),
        )
        .await
        .ok()?;
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes);
    Some(format!("data:image/png;base64,{encoded}"))
}

async fn run_action(
    page: &chromiumoxide::Page,
    action: &Action,
    acc: &mut ActionsResult,
) -> Result<(), EngineError> {
    match action {
        Action::Wait { milliseconds } => {
            tokio::time::sleep(Duration::from_millis(*milliseconds)).await;
            Ok(())
        }
        Action::Click { selector } => page
            .find_element(selector.as_str())
            .await
            .map_err(|e| EngineError::Action(e.to_string()))?
            .click()
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Action(e.to_string())),
        Action::Write { selector, text } => page
            .find_element(selector.as_str())
            .await
            .map_err(|e| EngineError::Action(e.to_string()))?
            .type_str(text.as_str())
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Action(e.to_string())),
        Action::PressKey { key } => page
            .find_element("body")
            .await
            .map_err(|e| EngineError::Action(e.to_string()))?
            .press_key(key.as_str())
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Action(e.to_string())),
        Action::Scroll { direction } => {
            let delta = match direction {
                ScrollDirection::Down => 800,
                ScrollDirection::Up => -800,
            };
            page.evaluate(format!("window.scrollBy(0, {delta})"))
                .await
                .map(|_| ())
                .map_err(|e| EngineError::Action(e.to_string()))
        }
        Action::Screenshot { full_page } => {
            let shot = capture_screenshot(page, *full_page)
                .await
                .ok_or_else(|| EngineError::Action("screenshot capture failed".to_string()))?;
            acc.screenshots.push(shot);
            Ok(())
        }
        Action::ExecuteJs { script } => page
            .evaluate(script.as_str())
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Action(e.to_string())),
        Action::Scrape => {
            let html = page
                .content()
                .await
                .map_err(|e| EngineError::Action(e.to_string()))?;
            acc.scrapes.push(html);
            Ok(())
        }
    }
}
