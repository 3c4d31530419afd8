//! The session engine: the iteration loop that drives one agent run.
//!
//! Each iteration: assemble input from session state, call the model,
//! parse the structured response, dispatch requested tool calls, apply
//! memory commands, run the loop guard over the proposed blackboard
//! entry, resolve the session status, and persist. Errors are attached
//! to the session record and surface as a `RunOutcome`; nothing escapes
//! the loop as a panic or an unhandled error.

use std::sync::Arc;

use agentry_types::artifact::Artifact;
use agentry_types::error::{EngineError, LlmError};
use agentry_types::event::EngineEvent;
use agentry_types::llm::ResponseStatus;
use agentry_types::memory::BlackboardEntry;
use agentry_types::session::{
    AssistanceRequest, AssistanceResponse, ConversationMessage, FinalReport, Session,
    SessionStatus,
};
use agentry_types::tool::{MemoryCommand, ToolCallRecord};
use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use crate::event::EventBus;
use crate::llm::LlmClient;
use crate::memory::{GuardDecision, IterationActivity, LoopGuard, MemoryStore, ReferenceResolver};
use crate::storage::SessionStore;
use crate::tool::{DispatchCall, LocalToolHandler, RemoteToolExecutor, ToolDispatcher};

use super::input::{InputAssembler, InputExtras};
use super::registry::ActiveSessions;
use super::response::parse_agent_response;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub llm_timeout: std::time::Duration,
    /// Most recent blackboard entries included in model context.
    pub blackboard_window: usize,
    /// Most recent conversation messages included in model context.
    pub conversation_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            llm_timeout: std::time::Duration::from_secs(300),
            blackboard_window: 20,
            conversation_window: 20,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Suspended; resume with [`SessionEngine::resume`] once answered.
    NeedsAssistance,
    /// Terminal failure; details are on `session.error`.
    Failed,
    /// Non-fatal stop. Raise `max_iterations` and run again to continue.
    IterationLimitReached,
    Cancelled,
}

/// Drives sessions to completion.
pub struct SessionEngine<S, C, R, L> {
    store: Arc<S>,
    llm: Arc<C>,
    dispatcher: Arc<ToolDispatcher<R, L>>,
    events: EventBus,
    registry: ActiveSessions,
    config: EngineConfig,
}

impl<S, C, R, L> SessionEngine<S, C, R, L>
where
    S: SessionStore,
    C: LlmClient,
    R: RemoteToolExecutor,
    L: LocalToolHandler,
{
    pub fn new(
        store: Arc<S>,
        llm: Arc<C>,
        dispatcher: Arc<ToolDispatcher<R, L>>,
        events: EventBus,
        registry: ActiveSessions,
    ) -> Self {
        Self {
            store,
            llm,
            dispatcher,
            events,
            registry,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run the session until it completes, suspends, fails, hits the
    /// iteration cap, or is cancelled. The caller owns the session
    /// record; the engine persists it after every iteration.
    pub async fn run(
        &self,
        session: &mut Session,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        let _claim = self.registry.acquire(session.id)?;

        match session.status {
            SessionStatus::Completed => return Ok(RunOutcome::Completed),
            SessionStatus::Error => return Ok(RunOutcome::Failed),
            SessionStatus::NeedsAssistance
                if !session.assistance.as_ref().is_some_and(|a| a.is_answered()) =>
            {
                return Ok(RunOutcome::NeedsAssistance);
            }
            _ => {}
        }
        session.status = SessionStatus::Running;

        let assembler =
            InputAssembler::new(self.config.blackboard_window, self.config.conversation_window);
        let mut memory = MemoryStore::from_memory(std::mem::take(&mut session.memory));
        let mut guard = LoopGuard::new();
        let mut pending_tool_results: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                self.persist(session, &memory).await?;
                return Ok(RunOutcome::Cancelled);
            }

            if session.iteration >= session.max_iterations {
                warn!(
                    session_id = %session.id,
                    limit = session.max_iterations,
                    "iteration limit reached, stopping without failing the session"
                );
                self.persist(session, &memory).await?;
                self.events.publish(EngineEvent::SessionFinished {
                    session_id: session.id,
                    status: session.status,
                    iterations: session.iteration,
                });
                return Ok(RunOutcome::IterationLimitReached);
            }

            let span = info_span!(
                "iteration",
                session_id = %session.id,
                iteration = session.iteration
            );
            let step = self
                .run_iteration(
                    session,
                    &mut memory,
                    &assembler,
                    &mut guard,
                    &mut pending_tool_results,
                    &cancel,
                )
                .instrument(span)
                .await?;

            if let Some(outcome) = step {
                return Ok(outcome);
            }
        }
    }

    /// Attach an assistance answer and continue the run.
    pub async fn resume(
        &self,
        session: &mut Session,
        answer: AssistanceResponse,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        match session.assistance.as_mut() {
            Some(request) if !request.is_answered() => request.response = Some(answer),
            _ => return Err(EngineError::NoPendingAssistance),
        }
        session.status = SessionStatus::Running;
        self.run(session, cancel).await
    }

    /// One iteration. Returns `Some(outcome)` when the run should stop.
    async fn run_iteration(
        &self,
        session: &mut Session,
        memory: &mut MemoryStore,
        assembler: &InputAssembler,
        guard: &mut LoopGuard,
        pending_tool_results: &mut Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Option<RunOutcome>, EngineError> {
        self.events.publish(EngineEvent::IterationStarted {
            session_id: session.id,
            iteration: session.iteration,
        });

        // An answered assistance request is consumed exactly once.
        let assistance_answer = match session.assistance.take() {
            Some(request) if request.is_answered() => {
                let rendered = request
                    .response
                    .as_ref()
                    .map(AssistanceResponse::render)
                    .unwrap_or_default();
                session
                    .messages
                    .push(ConversationMessage::user(rendered.clone()));
                Some(rendered)
            }
            other => {
                session.assistance = other;
                None
            }
        };

        let request = assembler.assemble(
            session,
            memory,
            InputExtras {
                warning: guard.take_warning(),
                tool_results: pending_tool_results.take(),
                assistance_answer,
            },
        );

        let llm_started = std::time::Instant::now();
        let raw = tokio::select! {
            _ = cancel.cancelled() => {
                self.persist(session, memory).await?;
                return Ok(Some(RunOutcome::Cancelled));
            }
            result = tokio::time::timeout(self.config.llm_timeout, self.llm.complete(&request)) => {
                match result {
                    Ok(Ok(raw)) => raw,
                    Ok(Err(error)) => {
                        return self.fail(session, memory, EngineError::Llm(error)).await;
                    }
                    Err(_) => {
                        let timeout = LlmError::Timeout(self.config.llm_timeout.as_secs());
                        return self.fail(session, memory, EngineError::Llm(timeout)).await;
                    }
                }
            }
        };
        self.events.publish(EngineEvent::LlmCallFinished {
            session_id: session.id,
            iteration: session.iteration,
            duration_ms: llm_started.elapsed().as_millis() as u64,
        });

        let mut response = match parse_agent_response(&raw) {
            Ok(response) => response,
            Err(error) => return self.fail(session, memory, error).await,
        };

        session.messages.push(ConversationMessage::assistant(
            response
                .message_to_user
                .clone()
                .unwrap_or_else(|| response.reasoning.clone()),
        ));

        let mut activity = IterationActivity::default();

        for proposed in response.artifacts.drain(..) {
            let mut artifact = Artifact::new(
                proposed.kind,
                proposed.title,
                proposed.content,
                session.iteration,
            );
            artifact.description = proposed.description;
            artifact.mime_type = proposed.mime_type;
            activity.artifact_titles.push(artifact.title.clone());
            session.artifacts.push(artifact);
        }

        // Tool dispatch: truncate to budget, resolve references, execute.
        let requested = response.tool_calls.len();
        let budget = self.dispatcher.call_budget();
        if requested > budget {
            self.events.publish(EngineEvent::ToolBudgetTruncated {
                session_id: session.id,
                requested,
                dispatched: budget,
            });
        }
        let kept: Vec<_> = response.tool_calls.drain(..).take(budget).collect();

        let mut records: Vec<ToolCallRecord> = Vec::with_capacity(kept.len());
        let mut calls: Vec<DispatchCall> = Vec::with_capacity(kept.len());
        {
            let resolver = ReferenceResolver::new(memory, &session.artifacts);
            for request in &kept {
                let record =
                    ToolCallRecord::pending(&request.tool, request.params.clone(), session.iteration);
                self.events.publish(EngineEvent::ToolDispatched {
                    session_id: session.id,
                    call_id: record.id,
                    tool: request.tool.clone(),
                    iteration: session.iteration,
                });
                calls.push(DispatchCall {
                    tool: request.tool.clone(),
                    params: resolver.resolve(&request.params),
                    save_as: request.save_as.clone(),
                });
                activity.tools_invoked.push(request.tool.clone());
                records.push(record);
            }
        }

        let results = self.dispatcher.dispatch(calls).await;

        let mut rendered_results: Vec<String> = Vec::new();
        let mut assistance_request: Option<AssistanceRequest> = None;

        for (record, result) in records.iter_mut().zip(results) {
            if result.outcome.success {
                record.complete(result.outcome.result.clone().unwrap_or(Value::Null));
                let duration_ms = record
                    .finished_at
                    .map(|f| (f - record.started_at).num_milliseconds().max(0) as u64)
                    .unwrap_or(0);
                self.events.publish(EngineEvent::ToolCompleted {
                    session_id: session.id,
                    call_id: record.id,
                    tool: record.tool.clone(),
                    duration_ms,
                });

                if let (Some(name), Some(value)) = (&result.save_as, &result.outcome.result) {
                    // Attributes keep the full result, even for binary
                    // tools whose context view is summarized.
                    memory.set_attribute(name, &result.tool, value.clone(), session.iteration);
                }
            } else {
                let error = result
                    .outcome
                    .error
                    .clone()
                    .unwrap_or_else(|| "tool failed".to_string());
                record.fail(error.clone());
                self.events.publish(EngineEvent::ToolFailed {
                    session_id: session.id,
                    call_id: record.id,
                    tool: record.tool.clone(),
                    error,
                });
            }

            rendered_results.push(render_result(&result.tool, &result.context_value, record));

            for command in result.commands {
                self.apply_command(
                    session,
                    memory,
                    &result.tool,
                    command,
                    &mut activity,
                    &mut assistance_request,
                );
            }
        }

        session.tool_calls.extend(records);
        if !rendered_results.is_empty() {
            *pending_tool_results = Some(rendered_results.join("\n\n"));
        }

        // Loop guard: accept the model's entry or synthesize one.
        let proposed_category = response
            .blackboard_entry
            .as_ref()
            .map(|e| e.category.as_str().to_string());
        match guard.evaluate(memory.blackboard(), response.blackboard_entry.as_ref()) {
            GuardDecision::Accept => {
                if let Some(proposed) = response.blackboard_entry.take() {
                    let mut entry = BlackboardEntry::new(
                        proposed.category,
                        proposed.content,
                        session.iteration,
                    );
                    entry.data = proposed.data;
                    entry.tools = activity.tools_invoked.clone();
                    memory.append_blackboard(entry);
                    self.events.publish(EngineEvent::BlackboardAppended {
                        session_id: session.id,
                        iteration: session.iteration,
                        auto: false,
                    });
                }
            }
            GuardDecision::Synthesize => {
                let entry = guard.synthesize(session.iteration, &activity);
                memory.append_blackboard(entry);
                self.events.publish(EngineEvent::BlackboardAppended {
                    session_id: session.id,
                    iteration: session.iteration,
                    auto: true,
                });
            }
        }
        if guard.duplicate_streak() > 0 {
            self.events.publish(EngineEvent::LoopWarning {
                session_id: session.id,
                category: proposed_category.unwrap_or_default(),
                occurrences: guard.duplicate_streak(),
            });
        }

        session.iteration += 1;

        // Status resolution. An explicit completion wins over a
        // same-iteration assistance request.
        match response.status {
            ResponseStatus::Completed => {
                let report = response.final_report.take().unwrap_or_else(|| FinalReport {
                    summary: response
                        .message_to_user
                        .clone()
                        .unwrap_or_else(|| response.reasoning.clone()),
                    tools_used: distinct_tools(session),
                    artifacts_created: session.artifacts.iter().map(|a| a.title.clone()).collect(),
                    key_findings: Vec::new(),
                });
                session.final_report = Some(report);
                session.status = SessionStatus::Completed;
                info!(session_id = %session.id, iterations = session.iteration, "session completed");
                self.finish(session, memory).await?;
                return Ok(Some(RunOutcome::Completed));
            }
            ResponseStatus::Error => {
                let message = response
                    .message_to_user
                    .clone()
                    .unwrap_or_else(|| "model reported an unrecoverable error".to_string());
                session.status = SessionStatus::Error;
                session.error = Some(message);
                self.finish(session, memory).await?;
                return Ok(Some(RunOutcome::Failed));
            }
            ResponseStatus::NeedsAssistance | ResponseStatus::InProgress => {
                if assistance_request.is_none()
                    && let Some(spec) = response.assistance.take()
                {
                    assistance_request = Some(AssistanceRequest::new(
                        spec.question,
                        spec.context,
                        spec.expected,
                    ));
                }
                if let Some(request) = assistance_request {
                    self.events.publish(EngineEvent::AssistanceRequested {
                        session_id: session.id,
                        question: request.question.clone(),
                    });
                    session.assistance = Some(request);
                    session.status = SessionStatus::NeedsAssistance;
                    self.finish(session, memory).await?;
                    return Ok(Some(RunOutcome::NeedsAssistance));
                }
            }
        }

        self.persist(session, memory).await?;
        Ok(None)
    }

    fn apply_command(
        &self,
        session: &mut Session,
        memory: &mut MemoryStore,
        tool: &str,
        command: MemoryCommand,
        activity: &mut IterationActivity,
        assistance_request: &mut Option<AssistanceRequest>,
    ) {
        match command {
            MemoryCommand::AppendBlackboard {
                category,
                content,
                data,
            } => {
                let mut entry = BlackboardEntry::new(category, content, session.iteration);
                entry.data = data;
                entry.tools = vec![tool.to_string()];
                memory.append_blackboard(entry);
                self.events.publish(EngineEvent::BlackboardAppended {
                    session_id: session.id,
                    iteration: session.iteration,
                    auto: false,
                });
            }
            MemoryCommand::SetScratchpad { content } => {
                memory.set_scratchpad(content);
                activity.scratchpad_changed = true;
            }
            MemoryCommand::CreateArtifact {
                kind,
                title,
                content,
                mime_type,
            } => {
                let mut artifact = Artifact::new(kind, title, content, session.iteration);
                artifact.mime_type = mime_type;
                activity.artifact_titles.push(artifact.title.clone());
                session.artifacts.push(artifact);
            }
            MemoryCommand::RequestAssistance {
                question,
                context,
                expected,
            } => {
                *assistance_request = Some(AssistanceRequest::new(question, context, expected));
            }
        }
    }

    /// Record a terminal failure on the session and persist it.
    async fn fail(
        &self,
        session: &mut Session,
        memory: &MemoryStore,
        error: EngineError,
    ) -> Result<Option<RunOutcome>, EngineError> {
        warn!(session_id = %session.id, %error, "session failed");
        session.status = SessionStatus::Error;
        session.error = Some(error.to_string());
        session.iteration += 1;
        self.finish(session, memory).await?;
        Ok(Some(RunOutcome::Failed))
    }

    /// Persist and announce a terminal or suspended state.
    async fn finish(&self, session: &mut Session, memory: &MemoryStore) -> Result<(), EngineError> {
        self.persist(session, memory).await?;
        self.events.publish(EngineEvent::SessionFinished {
            session_id: session.id,
            status: session.status,
            iterations: session.iteration,
        });
        Ok(())
    }

    async fn persist(&self, session: &mut Session, memory: &MemoryStore) -> Result<(), EngineError> {
        session.memory = memory.memory().clone();
        session.updated_at = Utc::now();
        self.store.save(session).await?;
        Ok(())
    }
}

/// Context-facing rendering of one tool result.
fn render_result(tool: &str, context_value: &Option<Value>, record: &ToolCallRecord) -> String {
    match (context_value, &record.error) {
        (Some(value), _) => format!("### {tool}\n{value}"),
        (None, Some(error)) => format!("### {tool}\nError: {error}"),
        (None, None) => format!("### {tool}\n(no result)"),
    }
}

/// Distinct tool names used across the whole session, in first-use order.
fn distinct_tools(session: &Session) -> Vec<String> {
    let mut seen = Vec::new();
    for record in &session.tool_calls {
        if !seen.contains(&record.tool) {
            seen.push(record.tool.clone());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::LocalToolResponse;
    use agentry_types::error::{RepositoryError, ToolError};
    use agentry_types::llm::LlmRequest;
    use agentry_types::tool::{ToolOutcome, ToolRoute};
    use serde_json::json;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct ScriptedLlm {
        responses: Mutex<Vec<String>>,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Value>) -> Self {
            let mut scripted: Vec<String> = responses.iter().map(|v| v.to_string()).collect();
            scripted.reverse();
            Self {
                responses: Mutex::new(scripted),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn raw(responses: Vec<&str>) -> Self {
            let mut scripted: Vec<String> = responses.iter().map(|s| s.to_string()).collect();
            scripted.reverse();
            Self {
                responses: Mutex::new(scripted),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request_contexts(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.context.clone())
                .collect()
        }
    }

    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| LlmError::Transport("script exhausted".to_string()))
        }
    }

    struct NullStore;

    impl SessionStore for NullStore {
        async fn save(&self, _session: &Session) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn load(&self, _id: &Uuid) -> Result<Option<Session>, RepositoryError> {
            Ok(None)
        }
    }

    struct EchoRemote;

    impl RemoteToolExecutor for EchoRemote {
        async fn execute(&self, tool: &str, params: &Value) -> Result<Value, ToolError> {
            Ok(json!({ "tool": tool, "echo": params }))
        }
    }

    struct AskLocal;

    impl LocalToolHandler for AskLocal {
        async fn handle(&self, tool: &str, _params: &Value) -> Result<LocalToolResponse, ToolError> {
            match tool {
                "ask_user" => Ok(LocalToolResponse {
                    outcome: ToolOutcome::ok(json!({ "asked": true })),
                    commands: vec![MemoryCommand::RequestAssistance {
                        question: "which dataset?".to_string(),
                        context: "two candidates".to_string(),
                        expected: agentry_types::session::ExpectedInput::FreeText,
                    }],
                }),
                other => Err(ToolError::UnknownTool(other.to_string())),
            }
        }
    }

    fn engine(llm: ScriptedLlm) -> SessionEngine<NullStore, ScriptedLlm, EchoRemote, AskLocal> {
        let dispatcher = ToolDispatcher::new(Arc::new(EchoRemote), Arc::new(AskLocal))
            .route("web_search", ToolRoute::remote())
            .route("ask_user", ToolRoute::local());
        SessionEngine::new(
            Arc::new(NullStore),
            Arc::new(llm),
            Arc::new(dispatcher),
            EventBus::default(),
            ActiveSessions::new(),
        )
    }

    fn completed_response(summary: &str) -> Value {
        json!({
            "reasoning": "task is done",
            "status": "completed",
            "final_report": {
                "summary": summary,
                "tools_used": [],
                "artifacts_created": [],
                "key_findings": []
            }
        })
    }

    #[tokio::test]
    async fn completes_in_one_iteration() {
        let engine = engine(ScriptedLlm::new(vec![completed_response("found it")]));
        let mut session = Session::new("what day is it", "m", 25);

        let outcome = engine
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.iteration, 1);
        assert_eq!(session.final_report.unwrap().summary, "found it");
    }

    #[tokio::test]
    async fn seven_requested_calls_dispatch_five() {
        let calls: Vec<Value> = (0..7)
            .map(|i| json!({ "tool": "web_search", "params": { "q": i } }))
            .collect();
        let engine = engine(ScriptedLlm::new(vec![
            json!({
                "reasoning": "need lots of searches",
                "tool_calls": calls,
                "blackboard_entry": {
                    "category": "plan",
                    "content": "searching all seven sources in parallel"
                }
            }),
            completed_response("done"),
        ]));
        let mut events = engine.events().subscribe();
        let mut session = Session::new("t", "m", 25);

        let outcome = engine
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(session.tool_calls.len(), 5);

        let mut saw_truncation = false;
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::ToolBudgetTruncated {
                requested,
                dispatched,
                ..
            } = event
            {
                assert_eq!(requested, 7);
                assert_eq!(dispatched, 5);
                saw_truncation = true;
            }
        }
        assert!(saw_truncation);
    }

    #[tokio::test]
    async fn duplicate_entry_warning_reaches_next_iteration_input() {
        let entry = json!({
            "category": "observation",
            "content": "the api requires authentication"
        });
        let engine = engine(ScriptedLlm::new(vec![
            json!({ "reasoning": "first look", "blackboard_entry": entry }),
            json!({ "reasoning": "second look", "blackboard_entry": entry }),
            completed_response("done"),
        ]));
        let mut session = Session::new("t", "m", 25);

        let outcome = engine
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let contexts = engine.llm.request_contexts();
        assert_eq!(contexts.len(), 3);
        // The repeat in iteration 2 queues a warning; it is injected
        // into iteration 3's input and nowhere else.
        assert!(!contexts[1].contains("## Warning"));
        assert!(contexts[2].contains("## Warning"));
        assert!(contexts[2].contains("repeated an earlier observation entry"));
    }

    #[tokio::test]
    async fn assistance_suspends_then_answer_consumed_once() {
        let llm = ScriptedLlm::new(vec![
            json!({
                "reasoning": "two datasets qualify, need a choice",
                "status": "needs_assistance",
                "assistance": { "question": "which dataset?" }
            }),
            json!({ "reasoning": "got the answer, continuing" }),
            completed_response("used dataset B"),
        ]);
        let engine = engine(llm);
        let mut session = Session::new("t", "m", 25);

        let outcome = engine
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::NeedsAssistance);
        assert_eq!(session.status, SessionStatus::NeedsAssistance);
        assert!(session.assistance.as_ref().is_some_and(|a| !a.is_answered()));

        let outcome = engine
            .resume(
                &mut session,
                AssistanceResponse::text("use dataset B"),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        assert!(session.assistance.is_none());

        let contexts = engine.llm.request_contexts();
        assert_eq!(contexts.len(), 3);
        // The answer appears in the resume iteration's input only.
        assert!(contexts[1].contains("use dataset B"));
        assert!(contexts[2].contains("[user] use dataset B"));
        assert!(!contexts[2].contains("## User response"));
    }

    #[tokio::test]
    async fn resume_without_pending_request_is_an_error() {
        let engine = engine(ScriptedLlm::new(vec![]));
        let mut session = Session::new("t", "m", 25);

        let result = engine
            .resume(
                &mut session,
                AssistanceResponse::text("answer"),
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(EngineError::NoPendingAssistance)));
    }

    #[tokio::test]
    async fn iteration_cap_is_a_non_fatal_stop() {
        let engine = engine(ScriptedLlm::new(vec![
            json!({ "reasoning": "still working on the first angle" }),
            json!({ "reasoning": "still working on another angle" }),
        ]));
        let mut session = Session::new("t", "m", 2);

        let outcome = engine
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::IterationLimitReached);
        assert_eq!(session.status, SessionStatus::Running);
        assert!(session.error.is_none());
        assert_eq!(session.iteration, 2);
    }

    #[tokio::test]
    async fn save_as_stores_full_result_as_attribute() {
        let engine = engine(ScriptedLlm::new(vec![
            json!({
                "reasoning": "searching",
                "tool_calls": [{
                    "tool": "web_search",
                    "params": { "q": "rust" },
                    "save_as": "results"
                }]
            }),
            completed_response("done"),
        ]));
        let mut session = Session::new("t", "m", 25);

        engine
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap();

        let attribute = session
            .memory
            .attributes
            .iter()
            .find(|a| a.name == "results")
            .unwrap();
        assert_eq!(attribute.tool, "web_search");
        assert_eq!(attribute.value["echo"]["q"], "rust");
    }

    #[tokio::test]
    async fn llm_transport_failure_attaches_error() {
        let engine = engine(ScriptedLlm::new(vec![]));
        let mut session = Session::new("t", "m", 25);

        let outcome = engine
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Failed);
        assert_eq!(session.status, SessionStatus::Error);
        assert!(session.error.as_deref().unwrap().contains("transport"));
    }

    #[tokio::test]
    async fn unparseable_response_fails_session() {
        let engine = engine(ScriptedLlm::raw(vec!["I refuse to answer in JSON."]));
        let mut session = Session::new("t", "m", 25);

        let outcome = engine
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Failed);
        assert!(
            session
                .error
                .as_deref()
                .unwrap()
                .contains("structured data")
        );
    }

    #[tokio::test]
    async fn running_session_rejects_second_run() {
        let engine = engine(ScriptedLlm::new(vec![]));
        let mut session = Session::new("t", "m", 25);
        let _claim = engine.registry.acquire(session.id).unwrap();

        let result = engine.run(&mut session, CancellationToken::new()).await;
        assert!(matches!(result, Err(EngineError::SessionBusy(_))));
    }

    #[tokio::test]
    async fn completed_session_returns_immediately() {
        let engine = engine(ScriptedLlm::new(vec![]));
        let mut session = Session::new("t", "m", 25);
        session.status = SessionStatus::Completed;

        let outcome = engine
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        // No model call was made.
        assert!(engine.llm.request_contexts().is_empty());
    }

    #[tokio::test]
    async fn local_tool_assistance_command_suspends() {
        let engine = engine(ScriptedLlm::new(vec![json!({
            "reasoning": "asking the user directly",
            "tool_calls": [{ "tool": "ask_user", "params": {} }]
        })]));
        let mut session = Session::new("t", "m", 25);

        let outcome = engine
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::NeedsAssistance);
        assert_eq!(
            session.assistance.unwrap().question,
            "which dataset?"
        );
    }

    #[tokio::test]
    async fn completion_wins_over_same_iteration_assistance() {
        let engine = engine(ScriptedLlm::new(vec![json!({
            "reasoning": "done, even though I also asked",
            "status": "completed",
            "tool_calls": [{ "tool": "ask_user", "params": {} }],
            "final_report": {
                "summary": "finished",
                "tools_used": [],
                "artifacts_created": [],
                "key_findings": []
            }
        })]));
        let mut session = Session::new("t", "m", 25);

        let outcome = engine
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(session.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn reference_token_resolves_against_saved_attribute() {
        let engine = engine(ScriptedLlm::new(vec![
            json!({
                "reasoning": "save first",
                "tool_calls": [{
                    "tool": "web_search",
                    "params": { "q": "capital of portugal" },
                    "save_as": "place"
                }]
            }),
            json!({
                "reasoning": "now use it",
                "tool_calls": [{
                    "tool": "web_search",
                    "params": { "q": "weather in {{ attr.place }}" }
                }]
            }),
            completed_response("done"),
        ]));
        let mut session = Session::new("t", "m", 25);

        engine
            .run(&mut session, CancellationToken::new())
            .await
            .unwrap();

        // The second call's record keeps the raw params; resolution
        // happened at dispatch time against the stored attribute.
        assert!(
            session.tool_calls[1].params["q"]
                .as_str()
                .unwrap()
                .contains("{{ attr.place }}")
        );
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_iteration() {
        let engine = engine(ScriptedLlm::new(vec![completed_response("never used")]));
        let mut session = Session::new("t", "m", 25);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = engine.run(&mut session, cancel).await.unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(session.status, SessionStatus::Running);
    }
}
