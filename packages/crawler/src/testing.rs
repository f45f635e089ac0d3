//! In-memory rendering engine for tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use listing_crawl_scraper::element::select_document;
use listing_crawl_scraper::{Browser, Element, Page, ScrapeError};

#[derive(Default)]
struct State {
    documents: BTreeMap<String, String>,
    failures: Mutex<BTreeMap<String, u32>>,
    visits: Mutex<Vec<String>>,
    refuse_contexts: bool,
    delay: Option<Duration>,
    opened: AtomicUsize,
    open: AtomicUsize,
    max_open: AtomicUsize,
}

/// Serves canned HTML per URL. URLs can be made to fail a set number of
/// times before succeeding.
#[derive(Default)]
pub struct FakeBrowser {
    state: Arc<State>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self) -> &mut State {
        Arc::get_mut(&mut self.state).expect("configure before sharing")
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.state_mut()
            .documents
            .insert(url.to_owned(), html.to_owned());
        self
    }

    /// Fails the next `times` navigations to `url`.
    pub fn failing(mut self, url: &str, times: u32) -> Self {
        self.state_mut()
            .failures
            .get_mut()
            .unwrap()
            .insert(url.to_owned(), times);
        self
    }

    pub fn without_contexts(mut self) -> Self {
        self.state_mut().refuse_contexts = true;
        self
    }

    /// Holds every navigation for `delay` so concurrent pages overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.state_mut().delay = Some(delay);
        self
    }

    pub fn visits_to(&self, url: &str) -> usize {
        self.state
            .visits
            .lock()
            .unwrap()
            .iter()
            .filter(|visited| *visited == url)
            .count()
    }

    pub fn pages_opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn open_pages(&self) -> usize {
        self.state.open.load(Ordering::SeqCst)
    }

    pub fn max_open_pages(&self) -> usize {
        self.state.max_open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn new_page(&self) -> Result<Box<dyn Page>, ScrapeError> {
        if self.state.refuse_contexts {
            return Err(ScrapeError::Navigation("browser is gone".to_string()));
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        let open = self.state.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            state: Arc::clone(&self.state),
            document: None,
            closed: false,
        }))
    }
}

struct FakePage {
    state: Arc<State>,
    document: Option<String>,
    closed: bool,
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&mut self, url: &str) -> Result<(), ScrapeError> {
        self.state.visits.lock().unwrap().push(url.to_owned());
        if let Some(delay) = self.state.delay {
            tokio::time::sleep(delay).await;
        }

        let should_fail = {
            let mut failures = self.state.failures.lock().unwrap();
            match failures.get_mut(url) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if should_fail {
            return Err(ScrapeError::Navigation(format!("connection reset: {url}")));
        }

        let document = self
            .state
            .documents
            .get(url)
            .ok_or_else(|| ScrapeError::Navigation(format!("404: {url}")))?;
        self.document = Some(document.clone());
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Vec<Element>, ScrapeError> {
        let document = self.document.as_deref().ok_or(ScrapeError::NotLoaded)?;
        select_document(document, selector)
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.document = None;
            self.state.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
