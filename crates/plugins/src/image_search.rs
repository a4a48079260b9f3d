//! `image-search` hook: answers image messages with a reverse-search match.
//!
//! Only the first image segment of a message is looked at. When it carries
//! inline data, the search runs to completion, the reply text (match summary
//! or failure message) is added under `"reply"`, and both the platform
//! default and all later handlers are suppressed. Anything else passes
//! through untouched.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    anyhow::Result,
    async_trait::async_trait,
    picsearch_common::{
        hooks::{EventContext, HookEvent, HookHandler},
        types::MessageSegment,
    },
    picsearch_config::{PicsearchConfig, discover_and_load},
    picsearch_search::{ImagePayload, ImageSearcher, SearchBackend, backend_from_config},
    tokio::sync::RwLock,
    tracing::{debug, info, warn},
};

/// Return slot the host reads chat replies from.
pub const REPLY_KEY: &str = "reply";

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct ImageSearchPlugin {
    searcher: ImageSearcher,
    /// Held shared by every in-flight search; shutdown takes it exclusively.
    gate: RwLock<()>,
    closed: AtomicBool,
    shutdown_grace: Duration,
}

impl ImageSearchPlugin {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            searcher: ImageSearcher::new(backend),
            gate: RwLock::new(()),
            closed: AtomicBool::new(false),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Build the backend selected in config. A missing API key is not an
    /// error; the API backend runs in degraded mode.
    pub fn initialize(config: &PicsearchConfig) -> crate::Result<Self> {
        let backend = backend_from_config(config.search.backend, &config.saucenao)?;
        info!(
            backend = backend.id(),
            configured = backend.is_configured(),
            "image search plugin initialized"
        );
        Ok(Self::new(backend).with_shutdown_grace(config.search.shutdown_grace()))
    }

    /// [`Self::initialize`] with config discovered from the standard
    /// locations and the environment.
    pub fn from_env() -> crate::Result<Self> {
        Self::initialize(&discover_and_load())
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn searcher(&self) -> &ImageSearcher {
        &self.searcher
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Run the interceptor over one event. Returns whether the event was
    /// consumed.
    pub async fn process_message(&self, ctx: &mut EventContext) -> bool {
        let Some(image) = ctx.message_chain().iter().find(|s| s.is_image()) else {
            return false;
        };
        let Some(payload) = ImagePayload::from_segment(image) else {
            debug!(session = %ctx.query().session_key, "first image has no inline data, passing through");
            return false;
        };

        if self.is_closed() {
            debug!(session = %ctx.query().session_key, "image search shut down, passing through");
            return false;
        }
        let Ok(_in_flight) = self.gate.try_read() else {
            debug!(session = %ctx.query().session_key, "image search shutting down, passing through");
            return false;
        };

        let reply = self.searcher.search(&payload).await;
        debug!(
            session = %ctx.query().session_key,
            found = reply.is_found(),
            "image search replied"
        );

        ctx.add_return(REPLY_KEY, vec![MessageSegment::plain(reply.into_text())]);
        ctx.prevent_default();
        ctx.prevent_postorder();
        true
    }

    /// Stop accepting images, wait for in-flight searches up to the configured
    /// grace period, then close the backend.
    pub async fn shutdown(&self) {
        self.shutdown_within(self.shutdown_grace).await;
    }

    /// [`Self::shutdown`] with an explicit grace period. Returns after at most
    /// `grace` plus the backend's own close time.
    pub async fn shutdown_within(&self, grace: Duration) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(grace_secs = grace.as_secs_f64(), "image search plugin shutting down");

        match tokio::time::timeout(grace, self.gate.write()).await {
            Ok(_drained) => debug!("in-flight image searches drained"),
            Err(_) => warn!(
                grace_secs = grace.as_secs_f64(),
                "image searches still in flight after grace period, closing backend anyway"
            ),
        }

        self.searcher.backend().close().await;
        info!("image search plugin stopped");
    }
}

impl std::fmt::Debug for ImageSearchPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSearchPlugin")
            .field("searcher", &self.searcher)
            .field("closed", &self.is_closed())
            .field("shutdown_grace", &self.shutdown_grace)
            .finish()
    }
}

#[async_trait]
impl HookHandler for ImageSearchPlugin {
    fn name(&self) -> &str {
        "image-search"
    }

    fn events(&self) -> &[HookEvent] {
        HookEvent::ALL
    }

    async fn handle(&self, ctx: &mut EventContext) -> Result<()> {
        self.process_message(ctx).await;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use {
        super::*,
        picsearch_common::{
            hooks::{DispatchOutcome, HookRegistry},
            types::MessageChain,
        },
        picsearch_config::BackendKind,
        picsearch_search::{RawBackendResult, SearchError, error::DECODE_FAILED},
        tokio::sync::Notify,
    };

    const MATCH_PAGE: &str = r#"<html><body><div class="result"><table><tr>
        <td class="resulttablecontent"><div class="resultcontent">
        <div class="resultcontentcolumn"><strong>Member:</strong> <a href="https://www.pixiv.net/users/2">painter</a></div>
        </div></td></tr></table></div></body></html>"#;

    /// Records what it was asked and when, then answers with a fixed result.
    struct RecordingBackend {
        delay: Duration,
        result: fn() -> picsearch_search::Result<RawBackendResult>,
        payloads: Mutex<Vec<String>>,
        events: Mutex<Vec<&'static str>>,
        started: Notify,
    }

    impl RecordingBackend {
        fn new(result: fn() -> picsearch_search::Result<RawBackendResult>) -> Self {
            Self {
                delay: Duration::ZERO,
                result,
                payloads: Mutex::new(Vec::new()),
                events: Mutex::new(Vec::new()),
                started: Notify::new(),
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new(|| Ok(RawBackendResult::Html(MATCH_PAGE.into())))
            }
        }

        fn searches(&self) -> usize {
            self.payloads.lock().unwrap().len()
        }

        fn events(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchBackend for RecordingBackend {
        fn id(&self) -> &'static str {
            "recording"
        }

        fn name(&self) -> &'static str {
            "Recording"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn search(
            &self,
            payload: &ImagePayload,
        ) -> picsearch_search::Result<RawBackendResult> {
            self.payloads
                .lock()
                .unwrap()
                .push(payload.as_str().to_string());
            self.events.lock().unwrap().push("search-start");
            self.started.notify_one();
            payload.decode()?;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.events.lock().unwrap().push("search-end");
            (self.result)()
        }

        async fn close(&self) {
            self.events.lock().unwrap().push("close");
        }
    }

    fn matching() -> Arc<RecordingBackend> {
        Arc::new(RecordingBackend::new(|| {
            Ok(RawBackendResult::Html(MATCH_PAGE.into()))
        }))
    }

    fn group_ctx(segments: Vec<MessageSegment>) -> EventContext {
        EventContext::group_message("group-1", "user-1", MessageChain::new(segments))
    }

    fn image_segment_without_data() -> MessageSegment {
        MessageSegment::Image {
            image_id: Some("abc.jpg".into()),
            url: Some("https://example.com/abc.jpg".into()),
            base64: None,
        }
    }

    fn reply_text(ctx: &EventContext) -> String {
        match ctx.returns(REPLY_KEY).unwrap() {
            [MessageSegment::Plain { text }] => text.clone(),
            other => panic!("expected one plain reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn message_without_image_passes_through() {
        let backend = matching();
        let plugin = ImageSearchPlugin::new(backend.clone());
        let mut ctx = group_ctx(vec![MessageSegment::plain("hello")]);

        assert!(!plugin.process_message(&mut ctx).await);
        assert!(!ctx.has_returns());
        assert!(!ctx.is_default_prevented());
        assert!(!ctx.is_postorder_prevented());
        assert_eq!(backend.searches(), 0);
    }

    #[tokio::test]
    async fn first_image_is_searched_and_event_consumed() {
        let backend = matching();
        let plugin = ImageSearchPlugin::new(backend.clone());
        let mut ctx = group_ctx(vec![
            MessageSegment::plain("what is this?"),
            MessageSegment::image_base64("data:image/png;base64,Zmlyc3Q="),
            MessageSegment::image_base64("c2Vjb25k"),
        ]);

        assert!(plugin.process_message(&mut ctx).await);
        assert_eq!(backend.searches(), 1);
        assert_eq!(backend.payloads.lock().unwrap()[0], "Zmlyc3Q=");
        assert_eq!(
            reply_text(&ctx),
            "画师：painter\n链接：https://www.pixiv.net/users/2"
        );
        assert!(ctx.is_default_prevented());
        assert!(ctx.is_postorder_prevented());
    }

    #[tokio::test]
    async fn first_image_without_data_stops_the_scan() {
        let backend = matching();
        let plugin = ImageSearchPlugin::new(backend.clone());
        let mut ctx = group_ctx(vec![
            image_segment_without_data(),
            MessageSegment::image_base64("c2Vjb25k"),
        ]);

        assert!(!plugin.process_message(&mut ctx).await);
        assert_eq!(backend.searches(), 0);
        assert!(!ctx.has_returns());
        assert!(!ctx.is_postorder_prevented());
    }

    #[tokio::test]
    async fn failure_text_is_still_a_reply() {
        let backend = Arc::new(RecordingBackend::new(|| {
            Err(SearchError::backend("Daily search limit exceeded"))
        }));
        let plugin = ImageSearchPlugin::new(backend);
        let mut ctx = group_ctx(vec![MessageSegment::image_base64("aGVsbG8=")]);

        assert!(plugin.process_message(&mut ctx).await);
        assert_eq!(reply_text(&ctx), "图片搜索失败,请稍后再试。");
        assert!(ctx.is_default_prevented());
        assert!(ctx.is_postorder_prevented());
    }

    #[tokio::test]
    async fn undecodable_image_replies_with_decode_message() {
        let plugin = ImageSearchPlugin::new(matching());
        let mut ctx = group_ctx(vec![MessageSegment::image_base64("%%% not base64 %%%")]);

        assert!(plugin.process_message(&mut ctx).await);
        assert_eq!(reply_text(&ctx), DECODE_FAILED);
    }

    #[tokio::test]
    async fn registry_stops_after_image_search() {
        struct Downstream(Arc<AtomicUsize>);

        #[async_trait]
        impl HookHandler for Downstream {
            fn name(&self) -> &str {
                "downstream"
            }

            fn events(&self) -> &[HookEvent] {
                HookEvent::ALL
            }

            fn priority(&self) -> i32 {
                -10
            }

            async fn handle(&self, _ctx: &mut EventContext) -> Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let downstream_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(ImageSearchPlugin::new(matching())));
        registry.register(Arc::new(Downstream(Arc::clone(&downstream_calls))));

        let mut ctx = EventContext::person_message(
            "dm-1",
            MessageChain::new(vec![MessageSegment::image_base64("aGVsbG8=")]),
        );
        let outcome = registry.dispatch(&mut ctx).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Handled {
            handler: "image-search".into()
        });
        assert_eq!(downstream_calls.load(Ordering::SeqCst), 0);

        let mut text_only =
            EventContext::person_message("dm-1", MessageChain::new(vec![MessageSegment::plain("hi")]));
        let outcome = registry.dispatch(&mut text_only).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Unhandled);
        assert_eq!(downstream_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_drains_in_flight_search_before_close() {
        let backend = Arc::new(RecordingBackend::slow(Duration::from_millis(100)));
        let plugin = Arc::new(ImageSearchPlugin::new(backend.clone()));

        let task = tokio::spawn({
            let plugin = Arc::clone(&plugin);
            async move {
                let mut ctx = group_ctx(vec![MessageSegment::image_base64("aGVsbG8=")]);
                let consumed = plugin.process_message(&mut ctx).await;
                (consumed, ctx)
            }
        });
        backend.started.notified().await;

        plugin.shutdown_within(Duration::from_secs(5)).await;
        assert_eq!(backend.events(), vec!["search-start", "search-end", "close"]);

        let (consumed, ctx) = task.await.unwrap();
        assert!(consumed);
        assert!(reply_text(&ctx).contains("painter"));
    }

    #[tokio::test]
    async fn shutdown_is_bounded_by_grace_period() {
        let backend = Arc::new(RecordingBackend::slow(Duration::from_secs(30)));
        let plugin = Arc::new(ImageSearchPlugin::new(backend.clone()));

        let task = tokio::spawn({
            let plugin = Arc::clone(&plugin);
            async move {
                let mut ctx = group_ctx(vec![MessageSegment::image_base64("aGVsbG8=")]);
                plugin.process_message(&mut ctx).await
            }
        });
        backend.started.notified().await;

        let started = std::time::Instant::now();
        plugin.shutdown_within(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(backend.events(), vec!["search-start", "close"]);
        task.abort();
    }

    #[tokio::test]
    async fn events_pass_through_after_shutdown() {
        let backend = matching();
        let plugin = ImageSearchPlugin::new(backend.clone());
        plugin.shutdown().await;
        assert!(plugin.is_closed());

        let mut ctx = group_ctx(vec![MessageSegment::image_base64("aGVsbG8=")]);
        assert!(!plugin.process_message(&mut ctx).await);
        assert!(!ctx.has_returns());
        assert_eq!(backend.searches(), 0);

        // Second shutdown is a no-op.
        plugin.shutdown().await;
        assert_eq!(backend.events(), vec!["close"]);
    }

    #[test]
    fn initialize_selects_backend_from_config() {
        let mut config = PicsearchConfig::default();
        config.search.backend = BackendKind::Html;
        config.search.shutdown_grace_secs = 3;

        let plugin = ImageSearchPlugin::initialize(&config).unwrap();
        assert_eq!(plugin.searcher().backend().id(), "saucenao-html");
        assert_eq!(plugin.shutdown_grace, Duration::from_secs(3));

        let api = ImageSearchPlugin::initialize(&PicsearchConfig::default()).unwrap();
        assert_eq!(api.searcher().backend().id(), "saucenao-api");
        assert_eq!(api.name(), "image-search");
        assert_eq!(api.events(), HookEvent::ALL);
    }
}
