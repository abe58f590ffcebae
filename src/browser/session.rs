use crate::browser::config::{ConnectionOptions, ContextOptions, LaunchOptions};
use crate::browser::BrowserContext;
use crate::dom::{self, ElementDescriptor, PageSnapshot};
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::{DOM, Page};
use headless_chrome::{Browser, Tab};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Map a headless_chrome failure to the crate taxonomy. A dead DevTools
/// connection makes the whole collaborator unusable.
fn classify(operation: &str, e: impl std::fmt::Display) -> AgentError {
    let message = e.to_string();
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("connection is closed")
        || lowered.contains("connection closed")
        || lowered.contains("target closed")
        || lowered.contains("no such target")
    {
        AgentError::CollaboratorUnavailable(format!("{}: {}", operation, message))
    } else {
        AgentError::BrowserOperation(format!("{}: {}", operation, message))
    }
}

/// Browser session that manages a Chrome/Chromium instance shared by any
/// number of agent runs, each in its own tab
pub struct BrowserSession {
    /// The underlying headless_chrome Browser instance
    browser: Browser,

    /// Open contexts keyed by run id
    contexts: Arc<Mutex<HashMap<Uuid, Arc<Tab>>>>,

    context_options: ContextOptions,
}

impl BrowserSession {
    /// Launch a new browser instance with the given options
    pub fn launch(options: LaunchOptions) -> Result<Self> {
        let mut launch_opts = headless_chrome::LaunchOptions::default();

        launch_opts.idle_browser_timeout = options.idle_timeout;
        launch_opts.headless = options.headless;
        launch_opts.window_size = Some((options.window_width, options.window_height));
        launch_opts.sandbox = options.sandbox;

        if let Some(path) = options.chrome_path {
            launch_opts.path = Some(path);
        }

        if let Some(dir) = options.user_data_dir {
            launch_opts.user_data_dir = Some(dir);
        }

        let browser = Browser::new(launch_opts).map_err(|e| AgentError::LaunchFailed(e.to_string()))?;
        log::info!("Launched browser (headless: {})", options.headless);

        Ok(Self::from_browser(browser))
    }

    /// Connect to an existing browser instance via WebSocket
    pub fn connect(options: ConnectionOptions) -> Result<Self> {
        let browser =
            Browser::connect(options.ws_url.clone()).map_err(|e| AgentError::ConnectionFailed(e.to_string()))?;
        log::info!("Connected to browser at {}", options.ws_url);

        Ok(Self::from_browser(browser))
    }

    fn from_browser(browser: Browser) -> Self {
        Self {
            browser,
            contexts: Arc::new(Mutex::new(HashMap::new())),
            context_options: ContextOptions::default(),
        }
    }

    /// Builder method: options applied to contexts opened afterwards
    pub fn with_context_options(mut self, options: ContextOptions) -> Self {
        self.context_options = options;
        self
    }

    pub fn context_options(&self) -> ContextOptions {
        self.context_options
    }

    /// Open an isolated browsing context (a fresh tab) for one run
    pub fn open_context(&self) -> Result<Arc<TabContext>> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| classify("Failed to create tab", e))?;
        let id = Uuid::new_v4();

        self.contexts
            .lock()
            .map_err(|e| AgentError::BrowserOperation(format!("Context pool poisoned: {}", e)))?
            .insert(id, Arc::clone(&tab));

        log::debug!("Opened browsing context {}", id);
        Ok(Arc::new(TabContext {
            id,
            tab,
            options: self.context_options,
            pool: Arc::clone(&self.contexts),
        }))
    }

    /// Number of contexts currently open
    pub fn context_count(&self) -> usize {
        self.contexts.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Get the underlying Browser instance
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Close every open context
    pub fn close(&self) -> Result<()> {
        let tabs: Vec<_> = self
            .contexts
            .lock()
            .map_err(|e| AgentError::BrowserOperation(format!("Context pool poisoned: {}", e)))?
            .drain()
            .map(|(_, tab)| tab)
            .collect();
        for tab in tabs {
            // Ignore errors on individual tab closes
            let _ = tab.close(false);
        }
        Ok(())
    }
}

/// One run's tab. Blocking CDP calls run on the blocking pool under the
/// context's operation timeout.
pub struct TabContext {
    id: Uuid,
    tab: Arc<Tab>,
    options: ContextOptions,
    pool: Arc<Mutex<HashMap<Uuid, Arc<Tab>>>>,
}

impl TabContext {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    async fn run_blocking<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        let task = tokio::task::spawn_blocking(move || f(&tab));

        match tokio::time::timeout(self.options.operation_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(AgentError::BrowserOperation(format!("{} aborted: {}", operation, e))),
            Err(_) => Err(AgentError::Timeout(format!(
                "{} exceeded {:?}",
                operation, self.options.operation_timeout
            ))),
        }
    }
}

fn find<'a>(tab: &'a Tab, element: &ElementDescriptor) -> Result<headless_chrome::Element<'a>> {
    tab.find_element(&element.css_selector).map_err(|e| {
        AgentError::ElementNotFound(format!("Element '{}' not found: {}", element.css_selector, e))
    })
}

#[async_trait]
impl BrowserContext for TabContext {
    async fn current_url(&self) -> Result<String> {
        self.run_blocking("get_url", |tab| Ok(tab.get_url())).await
    }

    async fn snapshot(&self) -> Result<PageSnapshot> {
        self.run_blocking("snapshot", |tab| {
            let result = tab
                .evaluate(dom::EXTRACT_DOM_JS, false)
                .map_err(|e| classify("Failed to execute DOM extraction script", e))?;
            dom::parse_snapshot(result.value)
        })
        .await
    }

    async fn page_html(&self) -> Result<String> {
        self.run_blocking("page_html", |tab| {
            tab.get_content().map_err(|e| classify("Failed to read page content", e))
        })
        .await
    }

    async fn take_screenshot(&self) -> Result<Vec<u8>> {
        self.run_blocking("screenshot", |tab| {
            tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(|e| classify("Failed to capture screenshot", e))
        })
        .await
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.run_blocking("navigate", move |tab| {
            tab.navigate_to(&url)
                .map_err(|e| AgentError::NavigationFailed(format!("Failed to navigate to {}: {}", url, e)))?;
            tab.wait_until_navigated()
                .map_err(|e| AgentError::NavigationFailed(format!("Navigation timeout: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn go_back(&self) -> Result<()> {
        let settle = self.options.navigation_settle;
        self.run_blocking("go_back", move |tab| {
            tab.evaluate("window.history.back()", false)
                .map_err(|e| AgentError::NavigationFailed(format!("Failed to go back: {}", e)))?;
            std::thread::sleep(settle);
            Ok(())
        })
        .await
    }

    async fn locate(&self, element: &ElementDescriptor) -> Result<bool> {
        let element = element.clone();
        self.run_blocking("locate", move |tab| Ok(find(tab, &element).is_ok()))
            .await
    }

    async fn click(&self, element: &ElementDescriptor) -> Result<()> {
        let element = element.clone();
        let settle = self.options.navigation_settle;
        self.run_blocking("click", move |tab| {
            find(tab, &element)?
                .click()
                .map_err(|e| classify(&format!("Failed to click {}", element.css_selector), e))?;
            std::thread::sleep(settle);
            Ok(())
        })
        .await
    }

    async fn fill(&self, element: &ElementDescriptor, text: &str) -> Result<()> {
        let element = element.clone();
        let text = text.to_string();
        self.run_blocking("fill", move |tab| {
            let found = find(tab, &element)?;
            found
                .call_js_fn("function() { this.focus(); this.value = ''; }", vec![], false)
                .map_err(|e| classify(&format!("Failed to clear {}", element.css_selector), e))?;
            found
                .type_into(&text)
                .map_err(|e| classify(&format!("Failed to type into {}", element.css_selector), e))?;
            Ok(())
        })
        .await
    }

    async fn set_input_files(&self, element: &ElementDescriptor, paths: &[PathBuf]) -> Result<()> {
        let element = element.clone();
        let files: Vec<String> = paths.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        self.run_blocking("set_input_files", move |tab| {
            let found = find(tab, &element)?;
            tab.call_method(DOM::SetFileInputFiles {
                files,
                node_id: None,
                backend_node_id: Some(found.backend_node_id),
                object_id: None,
            })
            .map_err(|e| classify(&format!("Failed to set files on {}", element.css_selector), e))?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        if let Ok(mut pool) = self.pool.lock() {
            pool.remove(&self.id);
        }
        self.run_blocking("close", |tab| {
            tab.close(true).map_err(|e| classify("Failed to close tab", e))?;
            Ok(())
        })
        .await
    }
}
