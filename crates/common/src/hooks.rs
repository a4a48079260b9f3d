//! Core hook types for the chat event pipeline.
//!
//! A message event travels through every registered handler in priority
//! order. Each handler receives the mutable [`EventContext`] and may inject
//! replies, suppress the platform's default handling, and stop the handler
//! chain. The registry honours those flags; handlers never see an event after
//! a higher-priority handler has called [`EventContext::prevent_postorder`].

use std::{collections::HashMap, fmt, sync::Arc};

use {
    anyhow::Result,
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tracing::{debug, info, warn},
};

use crate::types::{MessageChain, MessageSegment};

// ── HookEvent ───────────────────────────────────────────────────────────────

/// Message events that handlers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    /// A normal message arrived in a one-to-one conversation.
    PersonMessageReceived,
    /// A normal message arrived in a group conversation.
    GroupMessageReceived,
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl HookEvent {
    /// All variants, for iteration.
    pub const ALL: &'static [HookEvent] =
        &[Self::PersonMessageReceived, Self::GroupMessageReceived];
}

// ── EventContext ────────────────────────────────────────────────────────────

/// The inbound message a handler is looking at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageQuery {
    pub session_key: String,
    pub sender_id: Option<String>,
    pub message_chain: MessageChain,
}

/// Mutable state of one event as it moves through the handler chain.
///
/// Owned by the host. Handlers read the query and mutate only the returns and
/// the two control flags.
#[derive(Debug, Clone)]
pub struct EventContext {
    event: HookEvent,
    query: MessageQuery,
    returns: HashMap<String, Vec<MessageSegment>>,
    default_prevented: bool,
    postorder_prevented: bool,
}

impl EventContext {
    pub fn new(event: HookEvent, query: MessageQuery) -> Self {
        Self {
            event,
            query,
            returns: HashMap::new(),
            default_prevented: false,
            postorder_prevented: false,
        }
    }

    /// Context for a one-to-one message.
    pub fn person_message(session_key: impl Into<String>, chain: MessageChain) -> Self {
        Self::new(HookEvent::PersonMessageReceived, MessageQuery {
            session_key: session_key.into(),
            sender_id: None,
            message_chain: chain,
        })
    }

    /// Context for a group message.
    pub fn group_message(
        session_key: impl Into<String>,
        sender_id: impl Into<String>,
        chain: MessageChain,
    ) -> Self {
        Self::new(HookEvent::GroupMessageReceived, MessageQuery {
            session_key: session_key.into(),
            sender_id: Some(sender_id.into()),
            message_chain: chain,
        })
    }

    pub fn event(&self) -> HookEvent {
        self.event
    }

    pub fn query(&self) -> &MessageQuery {
        &self.query
    }

    pub fn message_chain(&self) -> &MessageChain {
        &self.query.message_chain
    }

    /// Append segments to the named return slot (`"reply"` for chat replies).
    pub fn add_return(&mut self, key: impl Into<String>, segments: Vec<MessageSegment>) {
        self.returns.entry(key.into()).or_default().extend(segments);
    }

    pub fn returns(&self, key: &str) -> Option<&[MessageSegment]> {
        self.returns.get(key).map(Vec::as_slice)
    }

    pub fn has_returns(&self) -> bool {
        self.returns.values().any(|v| !v.is_empty())
    }

    /// Stop the platform's default handling of this message.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Stop every handler after the current one.
    pub fn prevent_postorder(&mut self) {
        self.postorder_prevented = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn is_postorder_prevented(&self) -> bool {
        self.postorder_prevented
    }
}

// ── HookHandler trait ───────────────────────────────────────────────────────

/// Trait implemented by every message handler.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// A human-readable name for this handler.
    fn name(&self) -> &str;

    /// Which events this handler subscribes to.
    fn events(&self) -> &[HookEvent];

    /// Priority for ordering. Higher values run first. Default is 0.
    fn priority(&self) -> i32 {
        0
    }

    /// Handle the event, mutating the context to reply or stop the chain.
    async fn handle(&self, ctx: &mut EventContext) -> Result<()>;
}

// ── DispatchOutcome ─────────────────────────────────────────────────────────

/// What happened to an event after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every handler ran and none stopped the chain.
    Unhandled,
    /// The named handler stopped the chain.
    Handled { handler: String },
}

// ── HookRegistry ────────────────────────────────────────────────────────────

/// Registered message handlers, per event, highest priority first.
#[derive(Default)]
pub struct HookRegistry {
    handlers: HashMap<HookEvent, Vec<Arc<dyn HookHandler>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for all events it subscribes to.
    /// Handlers are sorted by priority (descending) within each event.
    pub fn register(&mut self, handler: Arc<dyn HookHandler>) {
        for &event in handler.events() {
            let handlers = self.handlers.entry(event).or_default();
            handlers.push(Arc::clone(&handler));
            handlers.sort_by_key(|h| std::cmp::Reverse(h.priority()));
        }
        info!(handler = handler.name(), "hook handler registered");
    }

    /// Returns true if any handlers are registered for the given event.
    pub fn has_handlers(&self, event: HookEvent) -> bool {
        self.handlers.get(&event).is_some_and(|v| !v.is_empty())
    }

    /// Dispatch an event to its handlers, highest priority first.
    ///
    /// Stops as soon as a handler calls [`EventContext::prevent_postorder`]
    /// and reports that handler. Handler errors are logged and the chain
    /// continues with the next handler.
    pub async fn dispatch(&self, ctx: &mut EventContext) -> Result<DispatchOutcome> {
        let event = ctx.event();
        let handlers = match self.handlers.get(&event) {
            Some(h) if !h.is_empty() => h,
            _ => return Ok(DispatchOutcome::Unhandled),
        };

        debug!(event = %event, count = handlers.len(), "dispatching hook event");

        for handler in handlers {
            if ctx.is_postorder_prevented() {
                break;
            }

            if let Err(e) = handler.handle(ctx).await {
                warn!(handler = handler.name(), event = %event, error = %e, "hook handler failed");
            }

            if ctx.is_postorder_prevented() {
                info!(handler = handler.name(), event = %event, "hook consumed event");
                return Ok(DispatchOutcome::Handled {
                    handler: handler.name().to_string(),
                });
            }
        }

        Ok(DispatchOutcome::Unhandled)
    }
}
