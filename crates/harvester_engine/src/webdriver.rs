use serde_json::Value;
use thirtyfour::error::WebDriverErrorInner;
use thirtyfour::prelude::*;
use thirtyfour::prelude::ScriptRet;

use crate::dom::{Dom, DomError, DomResult, ScrollTarget, Viewport};

const QUERY_ONE: &str = r#"
    const root = arguments[0].shadowRoot;
    return root ? root.querySelector(arguments[1]) : null;
"#;

const QUERY_ALL: &str = r#"
    const root = arguments[0].shadowRoot;
    return root ? Array.from(root.querySelectorAll(arguments[1])) : [];
"#;

const FULLY_VISIBLE: &str = r#"
    const rect = arguments[0].getBoundingClientRect();
    return rect.top >= 0 && rect.left >= 0
        && rect.bottom <= (window.innerHeight || document.documentElement.clientHeight)
        && rect.right <= (window.innerWidth || document.documentElement.clientWidth);
"#;

const VIEWPORT: &str = r#"
    return {
        offset: window.pageYOffset || document.documentElement.scrollTop || document.body.scrollTop || 0,
        height: window.innerHeight,
        documentHeight: Math.max(document.body.scrollHeight, document.documentElement.scrollHeight)
    };
"#;

/// `Dom` over a live WebDriver session.
#[derive(Clone)]
pub struct WebDriverDom {
    driver: WebDriver,
}

impl WebDriverDom {
    pub fn new(driver: WebDriver) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &WebDriver {
        &self.driver
    }

    pub fn into_inner(self) -> WebDriver {
        self.driver
    }

    async fn run(&self, script: &str, args: Vec<Value>) -> DomResult<ScriptRet> {
        self.driver
            .execute(script, args)
            .await
            .map_err(map_webdriver_error)
    }
}

#[async_trait::async_trait]
impl Dom for WebDriverDom {
    type Handle = WebElement;

    async fn navigate_to(&self, url: &str) -> DomResult<()> {
        self.driver.goto(url).await.map_err(map_webdriver_error)
    }

    async fn find_in_document(&self, selector: &str) -> DomResult<Option<WebElement>> {
        let mut found = self
            .driver
            .find_all(By::Css(selector))
            .await
            .map_err(map_webdriver_error)?;
        if found.is_empty() {
            Ok(None)
        } else {
            Ok(Some(found.swap_remove(0)))
        }
    }

    async fn query_one(&self, host: &WebElement, selector: &str) -> DomResult<Option<WebElement>> {
        let ret = self
            .run(QUERY_ONE, vec![element_arg(host)?, Value::from(selector)])
            .await?;
        if ret.json().is_null() {
            return Ok(None);
        }
        ret.element().map(Some).map_err(map_webdriver_error)
    }

    async fn query_all(&self, host: &WebElement, selector: &str) -> DomResult<Vec<WebElement>> {
        let ret = self
            .run(QUERY_ALL, vec![element_arg(host)?, Value::from(selector)])
            .await?;
        ret.elements().map_err(map_webdriver_error)
    }

    async fn text(&self, element: &WebElement) -> DomResult<String> {
        element.text().await.map_err(map_webdriver_error)
    }

    async fn attribute(&self, element: &WebElement, name: &str) -> DomResult<Option<String>> {
        element.attr(name).await.map_err(map_webdriver_error)
    }

    async fn click(&self, element: &WebElement) -> DomResult<()> {
        // Script click avoids "element not interactable" on overlapped controls.
        self.run("arguments[0].click();", vec![element_arg(element)?])
            .await
            .map(|_| ())
    }

    async fn scroll_to(&self, target: ScrollTarget<'_, WebElement>) -> DomResult<()> {
        match target {
            ScrollTarget::Offset(y) => {
                self.run("window.scrollTo(0, arguments[0]);", vec![Value::from(y.max(0.0))])
                    .await?;
            }
            ScrollTarget::Top => {
                self.run("window.scrollTo(0, 0);", Vec::new()).await?;
            }
            ScrollTarget::Bottom => {
                self.run("window.scrollTo(0, document.body.scrollHeight);", Vec::new())
                    .await?;
            }
            ScrollTarget::Element(element, align) => {
                self.run(
                    "arguments[0].scrollIntoView({behavior: 'instant', block: arguments[1]});",
                    vec![element_arg(element)?, Value::from(align.as_block())],
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn scroll_container_to(&self, container: &WebElement, fraction: f64) -> DomResult<()> {
        self.run(
            "arguments[0].scrollTop = arguments[0].scrollHeight * arguments[1];",
            vec![element_arg(container)?, Value::from(fraction.clamp(0.0, 1.0))],
        )
        .await
        .map(|_| ())
    }

    async fn is_fully_visible(&self, element: &WebElement) -> DomResult<bool> {
        let ret = self.run(FULLY_VISIBLE, vec![element_arg(element)?]).await?;
        Ok(ret.json().as_bool().unwrap_or(false))
    }

    async fn viewport(&self) -> DomResult<Viewport> {
        let ret = self.run(VIEWPORT, Vec::new()).await?;
        serde_json::from_value(ret.json().clone()).map_err(|err| DomError::Script(err.to_string()))
    }
}

fn element_arg(element: &WebElement) -> DomResult<Value> {
    element.to_json().map_err(map_webdriver_error)
}

fn map_webdriver_error(err: WebDriverError) -> DomError {
    let message = err.to_string();
    match err.as_inner() {
        WebDriverErrorInner::StaleElementReference(_) => DomError::Stale(message),
        WebDriverErrorInner::JavascriptError(_) => DomError::Script(message),
        _ => DomError::Driver(message),
    }
}
