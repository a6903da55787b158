//! Deterministic keyword reasoning model.
//!
//! A stand-in for a hosted model: maps an analytics question onto one of
//! the registered queries by keyword, then narrates the tool result on the
//! following turn. Deterministic by construction, which keeps the agent
//! loop fully testable offline.

use sightline_application::ports::reasoning_model::{
    ModelError, ModelTurn, ReasoningModelPort, TranscriptItem,
};
use async_trait::async_trait;
use regex::Regex;
use sightline_domain::{QueryRegistry, ToolRequest, ToolResult};

pub struct HeuristicModel {
    warehouse_id: Regex,
    order_id: Regex,
    months: Regex,
    count: Regex,
}

impl HeuristicModel {
    pub fn new() -> Self {
        Self {
            warehouse_id: Regex::new(r"\b(WH\d+)\b").expect("warehouse pattern"),
            order_id: Regex::new(r"\b(ORD-\d+)\b").expect("order pattern"),
            months: Regex::new(r"(?i)\b(\d{1,2})\s*months?\b").expect("months pattern"),
            count: Regex::new(r"(?i)\btop\s+(\d{1,3})\b").expect("count pattern"),
        }
    }

    fn plan(&self, question: &str, registry: &QueryRegistry) -> Option<ToolRequest> {
        let lower = question.to_lowercase();
        let pick = |name: &str| registry.contains(name).then(|| ToolRequest::new(name));

        if lower.contains("inventory") || lower.contains("stock") || lower.contains("warehouse") {
            let mut request = pick("get_inventory_status")?;
            if let Some(caps) = self.warehouse_id.captures(question) {
                request = request.with_arg("warehouse_id", &caps[1]);
            }
            return Some(request);
        }
        if lower.contains("order") && self.order_id.is_match(question) {
            let caps = self.order_id.captures(question)?;
            return Some(pick("get_order_details")?.with_arg("order_id", &caps[1]));
        }
        if lower.contains("customer") {
            let mut request = pick("get_top_customers")?;
            if let Some(caps) = self.count.captures(question) {
                if let Ok(limit) = caps[1].parse::<i64>() {
                    request = request.with_arg("limit", limit);
                }
            }
            return Some(request);
        }
        if lower.contains("product") {
            let mut request = pick("get_product_performance")?;
            if let Some(caps) = self.months.captures(question) {
                if let Ok(months) = caps[1].parse::<i64>() {
                    request = request.with_arg("months", months);
                }
            }
            return Some(request);
        }
        if lower.contains("region") {
            let mut request = pick("get_regional_breakdown")?;
            if let Some(caps) = self.months.captures(question) {
                if let Ok(months) = caps[1].parse::<i64>() {
                    request = request.with_arg("months", months);
                }
            }
            return Some(request);
        }
        if lower.contains("sales") || lower.contains("trend") || lower.contains("revenue") {
            return pick("get_sales_summary");
        }
        None
    }

    fn narrate(result: &ToolResult) -> String {
        match result.payload() {
            Some(payload) => {
                let mut text = format!(
                    "The {} query returned {} row(s).\n{}",
                    result.tool_name,
                    payload.row_count(),
                    payload.columns.join(" | ")
                );
                for row in payload.rows.iter().take(10) {
                    let line: Vec<String> = row
                        .iter()
                        .map(|v| match v {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect();
                    text.push('\n');
                    text.push_str(&line.join(" | "));
                }
                text
            }
            None => {
                let detail = result
                    .error()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "unknown error".to_string());
                format!(
                    "I could not complete the {} query: {}",
                    result.tool_name, detail
                )
            }
        }
    }

    fn capabilities(registry: &QueryRegistry) -> String {
        let mut names: Vec<&str> = registry.names().collect();
        names.sort_unstable();
        format!(
            "I can answer analytics questions using these queries: {}. \
             Try asking about sales trends, top customers, product performance, \
             regional breakdowns, inventory by warehouse, or a specific order.",
            names.join(", ")
        )
    }
}

impl Default for HeuristicModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningModelPort for HeuristicModel {
    async fn next_turn(
        &self,
        transcript: &[TranscriptItem],
        registry: &QueryRegistry,
    ) -> Result<ModelTurn, ModelError> {
        // Once a tool result is on the transcript, narrate it and finish.
        if let Some(TranscriptItem::Tool(result)) = transcript.last() {
            return Ok(ModelTurn::text_only(Self::narrate(result)));
        }

        let question = transcript
            .iter()
            .rev()
            .find_map(|item| match item {
                TranscriptItem::User(text) => Some(text.as_str()),
                _ => None,
            })
            .ok_or_else(|| ModelError::Failed("transcript holds no user message".into()))?;

        Ok(match self.plan(question, registry) {
            Some(request) => ModelTurn {
                text: format!("Looking that up with {}.", request.tool_name),
                requests: vec![request],
            },
            None => ModelTurn::text_only(Self::capabilities(registry)),
        })
    }
}
