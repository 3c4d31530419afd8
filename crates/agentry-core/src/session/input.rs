//! Iteration input assembly.
//!
//! Each iteration the engine rebuilds the model's context from session
//! state: the task, recent conversation, the blackboard window, the
//! scratchpad, attribute and artifact listings, the previous iteration's
//! tool results, and any one-shot extras (loop warning, assistance
//! answer). Sections with nothing to say are omitted entirely.

use agentry_types::llm::LlmRequest;
use agentry_types::session::{MessageRole, Session};

use crate::memory::MemoryStore;

/// One-shot extras injected into a single iteration's input.
#[derive(Debug, Default)]
pub struct InputExtras {
    /// Loop-guard warning, consumed once.
    pub warning: Option<String>,
    /// Rendered tool results from the previous iteration.
    pub tool_results: Option<String>,
    /// The user's assistance answer, consumed once.
    pub assistance_answer: Option<String>,
}

/// Assembles one iteration's `LlmRequest` from session state.
pub struct InputAssembler {
    blackboard_window: usize,
    conversation_window: usize,
}

impl InputAssembler {
    pub fn new(blackboard_window: usize, conversation_window: usize) -> Self {
        Self {
            blackboard_window,
            conversation_window,
        }
    }

    pub fn assemble(
        &self,
        session: &Session,
        memory: &MemoryStore,
        extras: InputExtras,
    ) -> LlmRequest {
        let mut sections: Vec<(&str, String)> = Vec::new();

        if let Some(answer) = extras.assistance_answer {
            sections.push(("User response to your question", answer));
        }
        if let Some(warning) = extras.warning {
            sections.push(("Warning", warning));
        }

        let conversation = self.render_conversation(session);
        if !conversation.is_empty() {
            sections.push(("Conversation", conversation));
        }

        let blackboard = memory.render_blackboard(Some(self.blackboard_window));
        if !blackboard.is_empty() {
            sections.push(("Blackboard", blackboard));
        }

        if !memory.scratchpad().is_empty() {
            sections.push(("Scratchpad", memory.scratchpad().to_string()));
        }

        let attributes = memory.attribute_names();
        if !attributes.is_empty() {
            sections.push((
                "Saved attributes (reference with {{ attr.<name> }})",
                attributes.join(", "),
            ));
        }

        if !session.input_files.is_empty() {
            let listing = session
                .input_files
                .iter()
                .map(|f| format!("- {} ({}, {} bytes): {}", f.name, f.mime_type, f.size, f.id))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(("Uploaded files", listing));
        }

        if !session.artifacts.is_empty() {
            let listing = session
                .artifacts
                .iter()
                .map(|a| format!("- {} ({}): {}", a.title, a.kind, a.id))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(("Artifacts (reference with {{ artifact.<id> }})", listing));
        }

        if let Some(results) = extras.tool_results {
            sections.push(("Tool results from the previous iteration", results));
        }

        sections.push((
            "Progress",
            format!(
                "Iteration {} of {}.",
                session.iteration + 1,
                session.max_iterations
            ),
        ));

        let context = sections
            .into_iter()
            .map(|(title, body)| format!("## {title}\n{body}"))
            .collect::<Vec<_>>()
            .join("\n\n");

        LlmRequest {
            model: session.model.clone(),
            context,
            task: session.task.clone(),
        }
    }

    fn render_conversation(&self, session: &Session) -> String {
        let messages = &session.messages;
        let skip = messages.len().saturating_sub(self.conversation_window);
        messages[skip..]
            .iter()
            .map(|m| {
                let role = match m.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                };
                format!("[{role}] {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
