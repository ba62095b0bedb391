use crate::domain::chat::{ChatMessage, ChatRequest, ToolCall};
use crate::domain::model::{DocumentText, InvoiceExtraction};
use crate::domain::ports::ChatModel;
use crate::llm::prompts::{build_user_prompt, SUBMIT_NUDGE, SYSTEM_PROMPT};
use crate::llm::repair::{normalize_invoice_value, parse_tool_arguments};
use crate::llm::schema::{has_invoice_content, validate_extraction};
use crate::llm::tools::{tool_definitions, ToolDispatcher, SUBMIT_INVOICE};
use crate::utils::error::{ExtractorError, Result};
use serde_json::Value;

pub const DEFAULT_MAX_TURNS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub max_turns: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            temperature: 0.0,
            max_tokens: 4096,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub extraction: InvoiceExtraction,
    /// Every message of the conversation, serialised as JSON.
    pub raw_conversation: String,
    pub turns_used: usize,
    pub repairs: Vec<String>,
}

/// Drives the tool-calling conversation until the model submits a valid
/// invoice or the turn budget runs out. Model errors are not retried.
pub struct ExtractionAgent<'a, M: ChatModel + ?Sized> {
    model: &'a M,
    settings: AgentSettings,
}

enum TurnResult {
    Submitted(InvoiceExtraction),
    Continue,
}

impl<'a, M: ChatModel + ?Sized> ExtractionAgent<'a, M> {
    pub fn new(model: &'a M, settings: AgentSettings) -> Self {
        Self { model, settings }
    }

    pub async fn run(&self, document: &DocumentText) -> Result<AgentOutcome> {
        let tools = tool_definitions();
        let dispatcher = ToolDispatcher::new(&document.full_text, &document.pages);
        let total_pages = document.total_pages.max(document.pages.len()).max(1);
        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_user_prompt(&document.full_text, total_pages)),
        ];
        let mut repairs = Vec::new();

        for turn in 1..=self.settings.max_turns {
            let request = ChatRequest {
                messages: messages.clone(),
                tools: tools.clone(),
                temperature: Some(self.settings.temperature),
                max_tokens: Some(self.settings.max_tokens),
                json_response: false,
            };

            let response = self.model.complete(&request).await?;
            let assistant = response.message;
            let tool_calls = assistant.tool_calls.clone();
            let content = assistant.content.clone();
            messages.push(assistant);

            tracing::debug!(
                "🤖 Turn {}/{}: {} tool call(s), finish_reason={:?}",
                turn,
                self.settings.max_turns,
                tool_calls.len(),
                response.finish_reason
            );

            let result = if tool_calls.is_empty() {
                self.handle_plain_reply(content.as_deref(), &mut messages, &mut repairs)
            } else {
                self.handle_tool_calls(&tool_calls, &dispatcher, &mut messages, &mut repairs)
            };

            if let TurnResult::Submitted(extraction) = result {
                tracing::info!(
                    "✅ Invoice submitted after {} turn(s) with {} entries",
                    turn,
                    extraction.entries.len()
                );
                return Ok(AgentOutcome {
                    extraction,
                    raw_conversation: serde_json::to_string_pretty(&messages)?,
                    turns_used: turn,
                    repairs,
                });
            }
        }

        tracing::warn!(
            "⚠️ No valid submit_invoice call within {} turns",
            self.settings.max_turns
        );
        Err(ExtractorError::TurnBudgetExhausted {
            max_turns: self.settings.max_turns,
        })
    }

    fn handle_tool_calls(
        &self,
        tool_calls: &[ToolCall],
        dispatcher: &ToolDispatcher<'_>,
        messages: &mut Vec<ChatMessage>,
        repairs: &mut Vec<String>,
    ) -> TurnResult {
        let mut submitted: Option<InvoiceExtraction> = None;

        // 每個 tool call 都必須有對應的 tool 訊息，即使已經收到發票
        for call in tool_calls {
            let name = call.function.name.as_str();
            let reply = if name == SUBMIT_INVOICE {
                if submitted.is_some() {
                    "Ignored: the invoice was already submitted.".to_string()
                } else {
                    match check_submission(&call.function.arguments) {
                        Ok((extraction, fixed)) => {
                            repairs.extend(fixed);
                            submitted = Some(extraction);
                            "Invoice accepted.".to_string()
                        }
                        Err(feedback) => {
                            tracing::debug!("Rejected submission: {}", feedback);
                            feedback
                        }
                    }
                }
            } else {
                tracing::debug!("🔧 {}({})", name, call.function.arguments);
                match parse_tool_arguments(&call.function.arguments) {
                    Ok(args) => dispatcher.dispatch(name, &args.value),
                    Err(_) if call.function.arguments.trim().is_empty() => {
                        dispatcher.dispatch(name, &Value::Null)
                    }
                    Err(e) => format!("Error: {}", e),
                }
            };
            messages.push(ChatMessage::tool_result(call.id.clone(), reply));
        }

        match submitted {
            Some(extraction) => TurnResult::Submitted(extraction),
            None => TurnResult::Continue,
        }
    }

    fn handle_plain_reply(
        &self,
        content: Option<&str>,
        messages: &mut Vec<ChatMessage>,
        repairs: &mut Vec<String>,
    ) -> TurnResult {
        // 模型有時直接把 JSON 寫在回覆裡，能通過驗證就接受
        if let Some(text) = content.filter(|t| t.contains('{')) {
            if let Ok((extraction, fixed)) = check_submission(text) {
                if !has_invoice_content(&extraction) {
                    messages.push(ChatMessage::user(SUBMIT_NUDGE));
                    return TurnResult::Continue;
                }
                repairs.push("accepted invoice JSON from a plain reply".to_string());
                repairs.extend(fixed);
                return TurnResult::Submitted(extraction);
            }
        }
        messages.push(ChatMessage::user(SUBMIT_NUDGE));
        TurnResult::Continue
    }
}

/// Repair, normalise and validate submitted arguments. The error string is
/// written for the model.
fn check_submission(raw: &str) -> std::result::Result<(InvoiceExtraction, Vec<String>), String> {
    let parsed = parse_tool_arguments(raw).map_err(|e| {
        format!(
            "Error: {}. Call submit_invoice again with valid JSON arguments.",
            e
        )
    })?;

    let mut repairs = parsed.repairs;
    let value = normalize_invoice_value(parsed.value, &mut repairs);

    match validate_extraction(value) {
        Ok(extraction) => Ok((extraction, repairs)),
        Err(issues) => Err(format!(
            "The submission has problems:\n- {}\nFix them and call submit_invoice again.",
            issues.join("\n- ")
        )),
    }
}
