//! Chat session state machine and interactive terminal chat.
//!
//! [`SessionContext`] owns the per-session mutable state the question
//! answering surfaces share: the loaded document, the lifecycle state, and
//! the append-only message history. It is created on session start, mutated
//! only by the load/clear/ask operations, and discarded on session end.
//!
//! State machine: `NoDocument → Loading → Ready ⇄ Answering`. A question is
//! only accepted in `Ready`; asking without a loaded document never reaches
//! retrieval or generation. A failed load falls back to `NoDocument` with
//! the error surfaced. Re-loading replaces the document and clears history;
//! clearing history keeps the document.

use anyhow::{bail, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sqlx::SqlitePool;
use std::path::PathBuf;

use crate::answer;
use crate::config::Config;
use crate::models::{ChatMessage, Role, SourceRef};
use crate::retrieve;
use crate::store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoDocument,
    Loading,
    Ready,
    Answering,
}

pub struct SessionContext {
    state: SessionState,
    source: Option<String>,
    messages: Vec<ChatMessage>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            state: SessionState::NoDocument,
            source: None,
            messages: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn begin_load(&mut self) {
        self.state = SessionState::Loading;
    }

    /// Successful load: the new document replaces the old one and the
    /// history is cleared.
    pub fn finish_load(&mut self, source: String) {
        self.source = Some(source);
        self.messages.clear();
        self.state = SessionState::Ready;
    }

    /// Failed load: back to no-document; the caller surfaces the error.
    pub fn fail_load(&mut self) {
        self.source = None;
        self.state = SessionState::NoDocument;
    }

    /// Gate a question on the session state. Returns an error (and makes
    /// no retrieval or generation call) unless a document is loaded.
    pub fn begin_question(&mut self) -> Result<()> {
        match self.state {
            SessionState::Ready => {
                self.state = SessionState::Answering;
                Ok(())
            }
            SessionState::NoDocument | SessionState::Loading => {
                bail!("No document loaded. Load a document first.")
            }
            SessionState::Answering => bail!("Still answering the previous question."),
        }
    }

    /// Record one completed turn: the user's question and the assistant's
    /// answer with its citations (empty on a degraded error answer).
    pub fn finish_question(&mut self, question: &str, answer: String, sources: Vec<SourceRef>) {
        self.messages.push(ChatMessage {
            role: Role::User,
            content: question.to_string(),
            sources: Vec::new(),
        });
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content: answer,
            sources,
        });
        self.state = SessionState::Ready;
    }

    /// Clear the message history; the loaded document is untouched.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Plain-text transcript: timestamp + document header, then each turn
    /// with numbered source citations.
    pub fn export_transcript(&self) -> String {
        let mut out = format!(
            "Chat History - {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        out.push_str(&format!(
            "Document: {}\n",
            self.source.as_deref().unwrap_or("(none)")
        ));
        out.push_str(&"=".repeat(80));
        out.push_str("\n\n");

        for msg in &self.messages {
            let role = match msg.role {
                Role::User => "You",
                Role::Assistant => "Assistant",
            };
            out.push_str(&format!("{}: {}\n\n", role, msg.content));

            if msg.role == Role::Assistant && !msg.sources.is_empty() {
                out.push_str("Sources:\n");
                for (i, source) in msg.sources.iter().enumerate() {
                    out.push_str(&format!("  [{}] Page {} ({})\n", i + 1, source.page, source.kind));
                }
                out.push('\n');
            }

            out.push_str(&"-".repeat(80));
            out.push_str("\n\n");
        }

        out
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Retrieve context and generate an answer for one question.
///
/// Service failures degrade to a message: the returned answer is a
/// formatted error string and the sources list is empty. Never errors.
pub async fn answer_question(
    pool: &SqlitePool,
    config: &Config,
    question: &str,
) -> (String, Vec<SourceRef>) {
    let chunks = match retrieve::retrieve(pool, config, question, config.retrieval.top_k).await {
        Ok(chunks) => chunks,
        Err(e) => return (format!("Error: {}", e), Vec::new()),
    };

    let prompt = answer::build_prompt(&chunks, question);
    match answer::generate_answer(&config.generation, &prompt).await {
        Ok(text) => {
            let sources = chunks
                .iter()
                .map(|c| c.to_source_ref(config.retrieval.snippet_chars))
                .collect();
            (text, sources)
        }
        Err(e) => (format!("Error: {}", e), Vec::new()),
    }
}

/// Run one full turn against the session: gate on state, answer, record.
pub async fn ask(
    session: &mut SessionContext,
    pool: &SqlitePool,
    config: &Config,
    question: &str,
) -> Result<ChatMessage> {
    session.begin_question()?;
    let (answer, sources) = answer_question(pool, config, question).await;
    session.finish_question(question, answer, sources);
    Ok(session
        .messages()
        .last()
        .cloned()
        .unwrap_or_else(|| ChatMessage {
            role: Role::Assistant,
            content: String::new(),
            sources: Vec::new(),
        }))
}

/// CLI entry point for `docchat ask`: one-shot question answering with
/// printed citations, no session loop.
pub async fn run_ask(config: &Config, question: &str, k: Option<usize>) -> Result<()> {
    let pool = store::connect(config).await?;

    if store::count_vectors(&pool).await? == 0 {
        bail!("No indexed document found. Run `docchat ingest <pdf>` first.");
    }
    answer::api_key(&config.generation)?;

    let mut config = config.clone();
    if let Some(k) = k {
        config.retrieval.top_k = k;
    }

    let (answer_text, sources) = answer_question(&pool, &config, question).await;

    println!("Answer:");
    println!("{}", "-".repeat(60));
    println!("{}", answer_text);
    println!("{}", "-".repeat(60));

    if !sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, source) in sources.iter().enumerate() {
            let preview: String = source.snippet.chars().take(160).collect();
            println!("  [{}] Page {} ({})", i + 1, source.page, source.kind);
            println!("      {}", preview.replace('\n', " "));
        }
    }

    pool.close().await;
    Ok(())
}

const SAMPLE_QUESTIONS: [&str; 5] = [
    "What is this document about?",
    "What are the key findings?",
    "Are there any tables or statistics?",
    "What recommendations are provided?",
    "Summarize the main points",
];

/// CLI entry point for `docchat chat`: interactive question loop over the
/// indexed document.
pub async fn run_chat(config: &Config) -> Result<()> {
    let pool = store::connect(config).await?;

    // Fail fast on missing prerequisites before entering the loop.
    if store::count_vectors(&pool).await? == 0 {
        bail!("No indexed document found. Run `docchat ingest <pdf>` first.");
    }
    answer::api_key(&config.generation)?;

    let sources = store::indexed_sources(&pool).await?;
    let source = sources
        .into_iter()
        .next()
        .unwrap_or_else(|| "(unknown)".to_string());

    let mut session = SessionContext::new();
    session.begin_load();
    session.finish_load(source.clone());

    println!("Chatting with: {}", source);
    println!("Type a question, /help for commands, or quit to exit.");
    println!();

    let mut editor = DefaultEditor::new()?;

    loop {
        let line = match editor.readline("docchat> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input);

        match input {
            "quit" | "exit" | "q" => break,
            "/help" => {
                println!("Commands:");
                println!("  /clear           clear the chat history");
                println!("  /export [path]   save the transcript to a text file");
                println!("  quit             leave the chat");
                println!();
                println!("Sample questions:");
                for q in SAMPLE_QUESTIONS {
                    println!("  - {}", q);
                }
                println!();
            }
            "/clear" => {
                session.clear();
                println!("Chat history cleared.");
                println!();
            }
            _ if input.starts_with("/export") => {
                let path = input
                    .strip_prefix("/export")
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| {
                        PathBuf::from(format!(
                            "chat_history_{}.txt",
                            chrono::Local::now().format("%Y%m%d_%H%M%S")
                        ))
                    });
                match std::fs::write(&path, session.export_transcript()) {
                    Ok(()) => println!("Transcript saved to {}", path.display()),
                    Err(e) => eprintln!("Error: could not write {}: {}", path.display(), e),
                }
                println!();
            }
            question => {
                println!();
                println!("Searching and generating answer...");
                println!();
                let message = ask(&mut session, &pool, config, question).await?;

                println!("Answer:");
                println!("{}", "-".repeat(60));
                println!("{}", message.content);
                println!("{}", "-".repeat(60));

                if !message.sources.is_empty() {
                    println!();
                    println!("Sources:");
                    for (i, source) in message.sources.iter().enumerate() {
                        let preview: String = source.snippet.chars().take(160).collect();
                        println!("  [{}] Page {} ({})", i + 1, source.page, source.kind);
                        println!("      {}", preview.replace('\n', " "));
                    }
                }
                println!();
            }
        }
    }

    println!("Goodbye!");
    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentKind;

    fn source_ref(page: u32) -> SourceRef {
        SourceRef {
            page,
            kind: ContentKind::Table,
            snippet: "snippet".to_string(),
        }
    }

    #[test]
    fn new_session_has_no_document() {
        let session = SessionContext::new();
        assert_eq!(session.state(), SessionState::NoDocument);
        assert!(session.source().is_none());
        assert!(session.messages().is_empty());
    }

    #[test]
    fn question_without_document_is_rejected() {
        let mut session = SessionContext::new();
        let err = session.begin_question().unwrap_err();
        assert!(err.to_string().contains("Load a document first"));
        // Nothing was recorded and the state did not advance.
        assert_eq!(session.state(), SessionState::NoDocument);
        assert!(session.messages().is_empty());
    }

    #[test]
    fn load_then_question_records_both_turns() {
        let mut session = SessionContext::new();
        session.begin_load();
        session.finish_load("doc.pdf".to_string());
        assert_eq!(session.state(), SessionState::Ready);

        session.begin_question().unwrap();
        assert_eq!(session.state(), SessionState::Answering);
        session.finish_question("What?", "Because.".to_string(), vec![source_ref(2)]);

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[0].role, Role::User);
        assert_eq!(session.messages()[1].role, Role::Assistant);
        assert_eq!(session.messages()[1].sources.len(), 1);
    }

    #[test]
    fn failed_load_falls_back_to_no_document() {
        let mut session = SessionContext::new();
        session.begin_load();
        session.fail_load();
        assert_eq!(session.state(), SessionState::NoDocument);
        assert!(session.begin_question().is_err());
    }

    #[test]
    fn error_turn_is_recorded_with_empty_sources() {
        let mut session = SessionContext::new();
        session.finish_load("doc.pdf".to_string());
        session.begin_question().unwrap();
        session.finish_question(
            "What?",
            "Error: Generation request timed out".to_string(),
            Vec::new(),
        );
        assert_eq!(session.messages().len(), 2);
        assert!(session.messages()[1].content.starts_with("Error:"));
        assert!(session.messages()[1].sources.is_empty());
        // The surface stays usable for the next question.
        assert!(session.begin_question().is_ok());
    }

    #[test]
    fn clear_keeps_document() {
        let mut session = SessionContext::new();
        session.finish_load("doc.pdf".to_string());
        session.begin_question().unwrap();
        session.finish_question("Q", "A".to_string(), Vec::new());

        session.clear();
        assert!(session.messages().is_empty());
        assert_eq!(session.source(), Some("doc.pdf"));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn reload_replaces_document_and_clears_history() {
        let mut session = SessionContext::new();
        session.finish_load("first.pdf".to_string());
        session.begin_question().unwrap();
        session.finish_question("Q", "A".to_string(), Vec::new());

        session.begin_load();
        session.finish_load("second.pdf".to_string());
        assert_eq!(session.source(), Some("second.pdf"));
        assert!(session.messages().is_empty());
    }

    #[test]
    fn transcript_lists_turns_and_numbered_citations() {
        let mut session = SessionContext::new();
        session.finish_load("report.pdf".to_string());
        session.begin_question().unwrap();
        session.finish_question(
            "What grew?",
            "Revenue grew.".to_string(),
            vec![source_ref(2), source_ref(5)],
        );

        let transcript = session.export_transcript();
        assert!(transcript.starts_with("Chat History - "));
        assert!(transcript.contains("Document: report.pdf"));
        assert!(transcript.contains("You: What grew?"));
        assert!(transcript.contains("Assistant: Revenue grew."));
        assert!(transcript.contains("  [1] Page 2 (table)"));
        assert!(transcript.contains("  [2] Page 5 (table)"));
    }
}
