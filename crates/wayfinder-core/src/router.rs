//! Message Router
//!
//! Answers one-shot runtime messages. Holds no per-request state: every call
//! reads what it needs from the session store and produces exactly one
//! [`Response`], converting any failure into `{success: false, error}`.
//!
//! Session reads and writes happen when a message is dispatched, in arrival
//! order. Only the backend, tab and settings calls are left to the returned
//! future, so a tab event that arrives later always sees the earlier put.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::sync::Arc;
use std::time::Duration;

use wayfinder_backend::{BackendClient, BackendError, Intent, QueryResponse};
use wayfinder_context::Context;
use wayfinder_session::{AnalysisInput, SessionRecord, SessionStore, TabId};

use crate::actions::ActionDispatcher;
use crate::error::RouterError;
use crate::message::{
    ActionPayload, AnalysisOutcome, FollowUpAction, HighlightTarget, MessageType, QueryOutcome,
    QueryPayload, Response, RuntimeMessage, UpdateOutcome,
};
use crate::settings::{Settings, SettingsStore};

/// Confidence above which the panel offers to automate the task
const AUTOMATION_CONFIDENCE: f64 = 0.8;

/// Outcome of dispatching a message
pub enum Dispatch {
    /// Answered without suspending
    Ready(Response),
    /// Waiting on the backend, a tab or the settings store
    Pending(BoxFuture<'static, Response>),
}

impl Dispatch {
    pub async fn resolve(self) -> Response {
        match self {
            Dispatch::Ready(response) => response,
            Dispatch::Pending(pending) => pending.await,
        }
    }
}

pub struct MessageRouter {
    sessions: SessionStore,
    backend: Arc<dyn BackendClient>,
    actions: ActionDispatcher,
    settings: Arc<dyn SettingsStore>,
    backend_timeout: Option<Duration>,
}

impl MessageRouter {
    pub fn new(
        sessions: SessionStore,
        backend: Arc<dyn BackendClient>,
        actions: ActionDispatcher,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            sessions,
            backend,
            actions,
            settings,
            backend_timeout: None,
        }
    }

    /// Bound every backend call; expiry is reported as the backend being unavailable
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = Some(timeout);
        self
    }

    /// Handle a message from `tab` (`None` for senders outside any tab)
    pub async fn handle(&self, tab: Option<TabId>, message: RuntimeMessage) -> Response {
        self.dispatch(tab, message).resolve().await
    }

    /// Apply the session-store part of a message now and defer the rest
    pub fn dispatch(&self, tab: Option<TabId>, message: RuntimeMessage) -> Dispatch {
        let Some(kind) = message.message_type() else {
            tracing::warn!(message_type = %message.kind, "Unknown message type");
            return Dispatch::Ready(Response::unrecognized());
        };

        match kind {
            MessageType::AnalyzeWebsite => Dispatch::Ready(respond(kind, tab, self.analyze(tab, &message))),
            MessageType::GetSessionData => Dispatch::Ready(self.get_session(tab)),
            MessageType::ProcessAiQuery => match self.prepare_query(tab, &message) {
                Ok((query, context)) => {
                    let backend = Arc::clone(&self.backend);
                    let timeout = self.backend_timeout;
                    Dispatch::Pending(
                        async move {
                            let result = process_query(backend, timeout, query, context).await;
                            respond(kind, tab, result)
                        }
                        .boxed(),
                    )
                }
                Err(e) => Dispatch::Ready(respond(kind, tab, Err(e))),
            },
            MessageType::ExecuteAction => match action_target(tab, &message) {
                Ok((tab_id, payload)) => {
                    let actions = self.actions.clone();
                    Dispatch::Pending(
                        async move {
                            let result = actions
                                .execute(tab_id, &payload.action, payload.target, payload.parameters)
                                .await
                                .map(Response::Action)
                                .map_err(RouterError::from);
                            respond(kind, tab, result)
                        }
                        .boxed(),
                    )
                }
                Err(e) => Dispatch::Ready(respond(kind, tab, Err(e))),
            },
            MessageType::GetSettings => {
                let settings = Arc::clone(&self.settings);
                Dispatch::Pending(
                    async move {
                        let result = settings
                            .get_settings()
                            .await
                            .map(Response::Settings)
                            .map_err(RouterError::from);
                        respond(kind, tab, result)
                    }
                    .boxed(),
                )
            }
            MessageType::UpdateSettings => match message.payload::<Settings>() {
                Ok(update) => {
                    let settings = Arc::clone(&self.settings);
                    Dispatch::Pending(
                        async move {
                            let result = settings
                                .update_settings(update)
                                .await
                                .map(|()| {
                                    Response::SettingsUpdated(UpdateOutcome {
                                        success: true,
                                        error: None,
                                    })
                                })
                                .map_err(RouterError::from);
                            respond(kind, tab, result)
                        }
                        .boxed(),
                    )
                }
                Err(e) => Dispatch::Ready(respond(kind, tab, Err(e))),
            },
        }
    }

    fn analyze(&self, tab: Option<TabId>, message: &RuntimeMessage) -> Result<Response, RouterError> {
        let tab = tab.ok_or(RouterError::MissingTab(MessageType::AnalyzeWebsite.as_str()))?;
        let input: AnalysisInput = message.payload()?;

        let record = SessionRecord::new(input.clone());
        let context = wayfinder_context::build(&record);
        let elements = record.element_count();
        self.sessions.put(tab, record);

        tracing::info!(
            tab_id = %tab,
            host = %host_of(&input.url),
            page_type = %context.page_type,
            elements,
            "Analyzed website"
        );

        Ok(Response::Analysis(AnalysisOutcome {
            success: true,
            analysis: input,
            context,
            message: "Website analysis completed successfully".to_string(),
        }))
    }

    /// Build the context from the snapshot current at dispatch; a later
    /// analysis for this tab does not affect the query already in flight.
    fn prepare_query(
        &self,
        tab: Option<TabId>,
        message: &RuntimeMessage,
    ) -> Result<(String, Context), RouterError> {
        let tab = tab.ok_or(RouterError::MissingTab(MessageType::ProcessAiQuery.as_str()))?;
        let payload: QueryPayload = message.payload()?;

        let session = self
            .sessions
            .get(tab)
            .ok_or(RouterError::SessionNotFound(tab))?;

        tracing::info!(tab_id = %tab, query_len = payload.query.len(), "Processing query");
        Ok((payload.query, wayfinder_context::build(&session)))
    }

    fn get_session(&self, tab: Option<TabId>) -> Response {
        let record = tab
            .and_then(|t| self.sessions.get(t))
            .map(|record| (*record).clone());
        Response::Session(record)
    }
}

fn action_target(tab: Option<TabId>, message: &RuntimeMessage) -> Result<(TabId, ActionPayload), RouterError> {
    let tab = tab.ok_or(RouterError::MissingTab(MessageType::ExecuteAction.as_str()))?;
    Ok((tab, message.payload()?))
}

async fn process_query(
    backend: Arc<dyn BackendClient>,
    timeout: Option<Duration>,
    query: String,
    context: Context,
) -> Result<Response, RouterError> {
    let call = backend.query(&query, &context);
    let response = match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| BackendError::Timeout(limit))??,
        None => call.await?,
    };
    let actions = derive_actions(&response);

    Ok(Response::Query(QueryOutcome {
        success: true,
        response,
        actions,
        context,
    }))
}

fn respond(kind: MessageType, tab: Option<TabId>, result: Result<Response, RouterError>) -> Response {
    result.unwrap_or_else(|e| {
        tracing::warn!(
            message_type = %kind,
            tab_id = ?tab.map(|t| t.0),
            error = %e,
            "Request failed"
        );
        Response::failure(&e)
    })
}

/// Follow-ups implied by a backend answer: intent highlights first, then automation
pub fn derive_actions(response: &QueryResponse) -> Vec<FollowUpAction> {
    let mut actions = Vec::new();

    match response.intent {
        Intent::Navigation => actions.push(FollowUpAction::Highlight {
            target: HighlightTarget::Navigation,
        }),
        Intent::Form => actions.push(FollowUpAction::Highlight {
            target: HighlightTarget::Forms,
        }),
        Intent::Assistance | Intent::Other => {}
    }

    if response.confidence > AUTOMATION_CONFIDENCE {
        actions.push(FollowUpAction::SuggestAutomation);
    }

    actions
}

fn host_of(address: &str) -> String {
    url::Url::parse(address)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "-".to_string())
}
