use crate::config::EngineConfig;
use crate::prompt::{
    build_system_prompt, select_with_ceiling, PromptSelection, PromptTemplate, FINAL_CLOSE,
    FINAL_OPEN,
};
use crate::provider::{
    ChatMessage, Completion, CompletionOptions, CompletionProvider, ProviderError, ProviderResult,
    Usage,
};
use nucleus_dsl::{extract_command, Bindings, Interpreter, Value};
use nucleus_protocol::truncate_with_marker;
use nucleus_snapshot::SnapshotDocument;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Error text of a session that ran out of turns without an answer.
pub const MAX_TURNS_REACHED: &str = "Max turns reached";

const CORRECTIVE: &str = "No command found in your reply. Reply with exactly one Nucleus command, \
     for example (grep \"pattern\"), or give your final answer as <<<FINAL>>>answer<<<END>>>.";
const NUDGE: &str = "You are almost out of turns. Give your final answer as \
     <<<FINAL>>>answer<<<END>>> unless one more command is essential.";
const FORCE_FINAL: &str = "The turn budget is exhausted. Reply now with your final answer only, \
     wrapped as <<<FINAL>>>answer<<<END>>>.";

/// Observer fired after each successful command: `(turn, command, result)`.
pub type ProgressCallback = Arc<dyn Fn(usize, &str, &Value) + Send + Sync>;

#[derive(Clone)]
pub struct AnalyzeOptions {
    pub max_turns: usize,
    pub turn_timeout: Option<Duration>,
    pub result_char_limit: usize,
    pub max_grep_matches: usize,
    pub verbose: bool,
    pub completion: CompletionOptions,
    pub on_progress: Option<ProgressCallback>,
}

impl AnalyzeOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            turn_timeout: config.turn_timeout(),
            result_char_limit: config.result_char_limit,
            max_grep_matches: config.max_grep_matches,
            verbose: false,
            completion: CompletionOptions::default(),
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, callback: impl Fn(usize, &str, &Value) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// What happened in one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnAction {
    /// Reply carried a final answer. `forced` marks the extra request made
    /// after the budget ran out.
    Final { answer: String, forced: bool },
    Command {
        command: String,
        result: String,
        truncated: bool,
    },
    CommandError { command: String, error: String },
    NoCommand,
    /// Forced-final request still produced a command.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    pub turn: usize,
    pub response: String,
    pub action: TurnAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub answer: String,
    pub turns: usize,
    pub commands: Vec<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub template: PromptTemplate,
    pub budget: usize,
    pub usage: Usage,
    pub history: Vec<TurnRecord>,
}

/// Text between the final-answer delimiters, trimmed.
pub fn extract_final_answer(reply: &str) -> Option<&str> {
    let start = reply.find(FINAL_OPEN)? + FINAL_OPEN.len();
    let len = reply[start..].find(FINAL_CLOSE)?;
    Some(reply[start..start + len].trim())
}

/// Per-call state of one analysis. Owned by a single task and dropped when
/// the call returns, whatever the outcome.
struct Session<'a> {
    provider: &'a dyn CompletionProvider,
    options: &'a AnalyzeOptions,
    selection: PromptSelection,
    messages: Vec<ChatMessage>,
    bindings: Bindings,
    commands: Vec<String>,
    history: Vec<TurnRecord>,
    usage: Usage,
}

impl Session<'_> {
    async fn request(&mut self) -> ProviderResult<String> {
        let call = self.provider.complete(&self.messages, &self.options.completion);
        let completion: Completion = match self.options.turn_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ProviderError::Timeout {
                    ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })??,
            None => call.await?,
        };
        if let Some(usage) = completion.usage {
            self.usage.add(usage);
        }
        self.messages.push(ChatMessage::assistant(completion.content.clone()));
        Ok(completion.content)
    }

    fn record(&mut self, turn: usize, response: String, action: TurnAction) {
        self.history.push(TurnRecord {
            turn,
            response,
            action,
        });
    }

    fn feedback(&mut self, turn: usize, body: String) {
        let mut content = body;
        if turn + 2 > self.selection.budget {
            content.push_str("\n\n");
            content.push_str(NUDGE);
        }
        self.messages.push(ChatMessage::user(content));
    }

    fn finish(self, answer: String, turns: usize, error: Option<String>) -> AnalysisResult {
        AnalysisResult {
            success: error.is_none(),
            answer,
            turns,
            commands: self.commands,
            error,
            template: self.selection.template,
            budget: self.selection.budget,
            usage: self.usage,
            history: self.history,
        }
    }
}

/// Run one bounded analysis session against a document handle.
///
/// The handle is used as-is for every turn, so a concurrent cache
/// invalidation never changes what this session sees.
pub async fn analyze_document(
    provider: &dyn CompletionProvider,
    document: &SnapshotDocument,
    query: &str,
    options: &AnalyzeOptions,
) -> ProviderResult<AnalysisResult> {
    let selection = select_with_ceiling(query, options.max_turns.max(1));
    let interpreter = Interpreter::new(document).with_max_matches(options.max_grep_matches);
    log::info!(
        "Analyzing {} with {} template, budget {} turns ({})",
        document.path().display(),
        selection.template.as_str(),
        selection.budget,
        provider.name()
    );

    let system = build_system_prompt(
        &selection,
        &document.stats(),
        document.files().map(|(path, _)| path),
    );
    let mut session = Session {
        provider,
        options,
        selection,
        messages: vec![ChatMessage::system(system), ChatMessage::user(format!("Query: {query}"))],
        bindings: Bindings::new(),
        commands: Vec::new(),
        history: Vec::new(),
        usage: Usage::default(),
    };

    for turn in 1..=selection.budget {
        let reply = session.request().await?;

        if let Some(answer) = extract_final_answer(&reply) {
            let answer = answer.to_string();
            session.record(
                turn,
                reply,
                TurnAction::Final {
                    answer: answer.clone(),
                    forced: false,
                },
            );
            log::info!("Final answer after {turn} turn(s)");
            return Ok(session.finish(answer, turn, None));
        }

        let Some(command) = extract_command(&reply).map(str::to_string) else {
            log::debug!("Turn {turn}: no command in reply");
            session.record(turn, reply, TurnAction::NoCommand);
            session.feedback(turn, CORRECTIVE.to_string());
            continue;
        };
        session.commands.push(command.clone());

        match interpreter.execute(&command, &session.bindings) {
            Ok(value) => {
                let serialized = serde_json::to_string_pretty(&value)
                    .unwrap_or_else(|_| value.to_string());
                let (result, truncated) = truncate_with_marker(&serialized, options.result_char_limit);
                if options.verbose {
                    log::info!("Turn {turn}: {command}\n{result}");
                } else {
                    log::debug!("Turn {turn}: {command} -> {} chars", serialized.len());
                }
                if let Some(callback) = &options.on_progress {
                    callback(turn, &command, &value);
                }
                session.bindings.record_result(turn, value);
                session.feedback(turn, format!("Result of turn {turn}:\n{result}"));
                session.record(
                    turn,
                    reply,
                    TurnAction::Command {
                        command,
                        result,
                        truncated,
                    },
                );
            }
            Err(err) => {
                let error = err.to_string();
                if options.verbose {
                    log::info!("Turn {turn}: {command} failed: {error}");
                } else {
                    log::debug!("Turn {turn}: {command} failed: {error}");
                }
                session.feedback(turn, format!("Error in turn {turn}: {error}"));
                session.record(turn, reply, TurnAction::CommandError { command, error });
            }
        }
    }

    let turns = selection.budget;
    session.messages.push(ChatMessage::user(FORCE_FINAL));
    let reply = session.request().await?;

    let forced = match extract_final_answer(&reply) {
        Some(answer) => Some(answer.to_string()),
        None if extract_command(&reply).is_none() && !reply.trim().is_empty() => {
            Some(reply.trim().to_string())
        }
        None => None,
    };
    match forced {
        Some(answer) => {
            log::info!("Forced final answer after {turns} turn(s)");
            session.record(
                turns,
                reply,
                TurnAction::Final {
                    answer: answer.clone(),
                    forced: true,
                },
            );
            Ok(session.finish(answer, turns, None))
        }
        None => {
            log::warn!("No final answer within {turns} turn(s)");
            session.record(turns, reply, TurnAction::Exhausted);
            Ok(session.finish(String::new(), turns, Some(MAX_TURNS_REACHED.to_string())))
        }
    }
}
