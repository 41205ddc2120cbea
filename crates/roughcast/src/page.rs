//! Page-level driver: acquisition, selection passes and the single recurring poll.

use crate::acquire::{AcquireReport, Fetcher, acquire};
use crate::config::SketchOptions;
use crate::dom::{Document, NodeId};
use crate::guard::{self, ProcessedSet};
use crate::poll::{RetryOutcome, RetryPolicy, Scheduler, StopHandle, retry_until};
use crate::rough::{HandDrawn, RoughrRenderer};
use crate::sketch::{SurfaceReport, sketch_surface};
use url::Url;

/// Opted-in outermost `<svg>` roots that no pass has handled yet, in document order.
///
/// Roots already carrying the processed marker (e.g. re-parsed output) are recorded in
/// `processed` and not returned.
pub fn select_surfaces(
    doc: &Document,
    processed: &mut ProcessedSet,
    options: &SketchOptions,
) -> Vec<NodeId> {
    let mut out = Vec::new();
    for id in doc.elements() {
        let Some(el) = doc.element(id) else {
            continue;
        };
        if el.local_name() != "svg" || processed.state(id) != guard::SurfaceState::Unseen {
            continue;
        }
        let nested = doc
            .ancestors(id)
            .any(|a| doc.element(a).is_some_and(|p| p.local_name() == "svg"));
        if nested || !is_opted_in(doc, id, options) {
            continue;
        }
        if guard::is_marked_processed(doc, id) {
            processed.finish(id);
            continue;
        }
        out.push(id);
    }
    out
}

/// The nearest element carrying the opt-in attribute decides; `"false"` opts out.
fn is_opted_in(doc: &Document, id: NodeId, options: &SketchOptions) -> bool {
    std::iter::once(id)
        .chain(doc.ancestors(id))
        .find_map(|n| doc.element(n)?.attr(&options.opt_in_attribute))
        .is_some_and(|v| !v.trim().eq_ignore_ascii_case("false"))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub surfaces: Vec<SurfaceReport>,
}

impl PassReport {
    pub fn is_noop(&self) -> bool {
        self.surfaces.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum Activation {
    Started(StopHandle),
    AlreadyActive(StopHandle),
}

impl Activation {
    pub fn handle(&self) -> &StopHandle {
        match self {
            Self::Started(h) | Self::AlreadyActive(h) => h,
        }
    }
}

/// One document plus everything a pass needs: the processed set, options and renderer.
#[derive(Debug)]
pub struct Page<R: HandDrawn = RoughrRenderer> {
    document: Document,
    processed: ProcessedSet,
    options: SketchOptions,
    renderer: R,
    timer: Option<StopHandle>,
}

impl Page<RoughrRenderer> {
    pub fn new(document: Document, options: SketchOptions) -> Self {
        Self::with_renderer(document, options, RoughrRenderer)
    }
}

impl<R: HandDrawn> Page<R> {
    pub fn with_renderer(document: Document, options: SketchOptions, renderer: R) -> Self {
        Self {
            document,
            processed: ProcessedSet::new(),
            options,
            renderer,
            timer: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access for hosts that inject content between ticks.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn processed(&self) -> &ProcessedSet {
        &self.processed
    }

    pub fn options(&self) -> &SketchOptions {
        &self.options
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// Inlines every `.svg` placeholder reachable through `fetcher`.
    pub async fn load<F: Fetcher + ?Sized>(&mut self, fetcher: &F, base: &Url) -> AcquireReport {
        acquire(&mut self.document, fetcher, base, &self.options).await
    }

    /// One selection pass. Cheap once every surface has been processed.
    pub fn tick(&mut self) -> PassReport {
        let surfaces = select_surfaces(&self.document, &mut self.processed, &self.options);
        let mut report = PassReport::default();
        for surface in surfaces {
            if let Some(r) = sketch_surface(
                &mut self.document,
                surface,
                &mut self.processed,
                &self.options,
                &self.renderer,
            ) {
                report.surfaces.push(r);
            }
        }
        if !report.is_noop() {
            tracing::debug!(surfaces = report.surfaces.len(), "sketch pass");
        }
        report
    }

    /// Creates the page's single poll timer on first call; later calls hand back the same one.
    pub fn activate(&mut self) -> Activation {
        match &self.timer {
            Some(handle) => Activation::AlreadyActive(handle.clone()),
            None => {
                let handle = StopHandle::new();
                self.timer = Some(handle.clone());
                Activation::Started(handle)
            }
        }
    }

    pub fn stop_handle(&self) -> Option<&StopHandle> {
        self.timer.as_ref()
    }

    /// Ticks now and then once per poll period until the stop handle fires.
    pub fn run<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S) -> RetryOutcome {
        self.run_with(scheduler, |_, _| {})
    }

    /// Like [`Page::run`], but hands the document to `between` after every tick, so the host can
    /// inject late-rendered content that the next tick picks up. `between` receives the 1-based
    /// attempt number.
    pub fn run_with<S, H>(&mut self, scheduler: &mut S, mut between: H) -> RetryOutcome
    where
        S: Scheduler + ?Sized,
        H: FnMut(usize, &mut Document),
    {
        let stop = self.activate().handle().clone();
        let policy = RetryPolicy::every(self.options.poll_period());
        retry_until(&policy, scheduler, &stop, |attempt| {
            self.tick();
            between(attempt, &mut self.document);
            false
        })
    }
}

/// Result of [`sketch_document`].
#[derive(Debug)]
pub struct SketchedDocument {
    pub document: Document,
    pub acquired: AcquireReport,
    pub pass: PassReport,
}

/// Acquisition followed by a single pass, for documents whose diagrams are already final.
pub async fn sketch_document<F: Fetcher + ?Sized>(
    document: Document,
    fetcher: &F,
    base: &Url,
    options: SketchOptions,
) -> SketchedDocument {
    let mut page = Page::new(document, options);
    let acquired = page.load(fetcher, base).await;
    let pass = page.tick();
    SketchedDocument {
        document: page.into_document(),
        acquired,
        pass,
    }
}
