/// Concrete agent strategies used by the workflow factory.
///
/// Every strategy extends its input (intake wraps it under `original_data`)
/// and can pause to simulate work. Pauses are the only suspension points.
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde_json::{Value, json};

use super::agent::{AgentContext, AgentLogic, Payload};

/// Simulated processing delay applied by the specialized strategies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedWork {
    enabled: bool,
    scale: f64,
}

impl Default for SimulatedWork {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: 1.0,
        }
    }
}

impl SimulatedWork {
    pub const DISABLED: SimulatedWork = SimulatedWork {
        enabled: false,
        scale: 0.0,
    };

    pub fn new(enabled: bool, scale: f64) -> Self {
        Self { enabled, scale }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.scale.is_finite() && self.scale > 0.0
    }

    pub fn delay(&self, base_ms: u64) -> Option<Duration> {
        if !self.is_enabled() {
            return None;
        }
        let secs = Duration::from_millis(base_ms).as_secs_f64() * self.scale;
        Duration::try_from_secs_f64(secs).ok()
    }

    async fn pause(&self, base_ms: u64) {
        if let Some(delay) = self.delay(base_ms) {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Lowercased JSON text of a payload, used for keyword matching.
fn keyword_text(payload: &Payload) -> String {
    serde_json::to_string(payload)
        .unwrap_or_default()
        .to_lowercase()
}

fn random_between(low: f64, high: f64) -> f64 {
    rand::rng().random_range(low..high)
}

fn new_request_id() -> String {
    format!("REQ-{}", rand::rng().random_range(1000..=9999))
}

/// Passthrough: wraps the input in a status envelope.
#[derive(Debug, Clone, Default)]
pub struct BaseLogic {
    pub work: SimulatedWork,
}

#[async_trait]
impl AgentLogic for BaseLogic {
    async fn execute(&self, ctx: &AgentContext<'_>, input: Payload) -> Result<Payload> {
        ctx.memory()
            .store("last_input", Value::Object(input.clone()), false);
        self.work.pause(500).await;

        let mut output = Payload::new();
        output.insert("agent".into(), json!(ctx.agent_name()));
        output.insert("status".into(), json!("success"));
        output.insert("data".into(), Value::Object(input));
        output.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));

        ctx.memory()
            .store("last_output", Value::Object(output.clone()), false);
        Ok(output)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn assess(payload: &Payload) -> Self {
        let text = keyword_text(payload);
        if text.contains("urgent") || text.contains("critical") {
            Priority::High
        } else if text.contains("important") {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

/// Validates a request and assigns it an id and a priority.
#[derive(Debug, Clone, Default)]
pub struct IntakeLogic {
    pub work: SimulatedWork,
}

#[async_trait]
impl AgentLogic for IntakeLogic {
    async fn execute(&self, ctx: &AgentContext<'_>, input: Payload) -> Result<Payload> {
        ctx.log("Starting intake process");
        if input.is_empty() {
            anyhow::bail!("Empty input received");
        }
        self.work.pause(300).await;

        let request_id = new_request_id();
        let priority = Priority::assess(&input);
        let timestamp = input.get("timestamp").cloned().unwrap_or(json!(""));

        let mut validated = Payload::new();
        validated.insert("request_id".into(), json!(request_id));
        validated.insert("original_data".into(), Value::Object(input));
        validated.insert("validated".into(), json!(true));
        validated.insert("timestamp".into(), timestamp);
        validated.insert("priority".into(), json!(priority.label()));

        ctx.memory()
            .store("intake_data", Value::Object(validated.clone()), true);
        ctx.log(format!("Validated request {request_id}"));
        Ok(validated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Financial,
    Technical,
    Account,
    General,
}

impl Category {
    pub fn classify(payload: &Payload) -> Self {
        let text = keyword_text(payload);
        let has = |words: &[&str]| words.iter().any(|w| text.contains(w));
        if has(&["payment", "billing"]) {
            Category::Financial
        } else if has(&["technical", "error"]) {
            Category::Technical
        } else if has(&["account", "profile"]) {
            Category::Account
        } else {
            Category::General
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "financial" => Some(Category::Financial),
            "technical" => Some(Category::Technical),
            "account" => Some(Category::Account),
            "general" => Some(Category::General),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Financial => "financial",
            Category::Technical => "technical",
            Category::Account => "account",
            Category::General => "general",
        }
    }

    pub fn subcategory(self) -> &'static str {
        match self {
            Category::Financial => "payment_processing",
            Category::Technical => "bug_report",
            Category::Account => "profile_update",
            Category::General => "inquiry",
        }
    }

    pub fn routing(self) -> &'static str {
        match self {
            Category::Financial => "finance_team",
            Category::Technical => "tech_support",
            Category::Account => "customer_service",
            Category::General => "general_support",
        }
    }

    fn solution(self) -> Value {
        let (kind, action, steps) = match self {
            Category::Financial => (
                "payment_resolution",
                "Process refund or payment adjustment",
                ["Verify transaction", "Process adjustment", "Send confirmation"],
            ),
            Category::Technical => (
                "technical_fix",
                "Apply technical solution",
                ["Diagnose issue", "Apply fix", "Verify resolution"],
            ),
            Category::Account => (
                "account_update",
                "Update account information",
                ["Verify identity", "Update records", "Confirm changes"],
            ),
            Category::General => (
                "general_response",
                "Provide information",
                ["Gather information", "Formulate response", "Send reply"],
            ),
        };
        json!({ "type": kind, "action": action, "steps": steps })
    }
}

/// Categorizes a request and decides where it is routed.
#[derive(Debug, Clone, Default)]
pub struct ClassificationLogic {
    pub work: SimulatedWork,
}

#[async_trait]
impl AgentLogic for ClassificationLogic {
    async fn execute(&self, ctx: &AgentContext<'_>, mut input: Payload) -> Result<Payload> {
        ctx.log("Starting classification");
        self.work.pause(400).await;

        let category = Category::classify(&input);
        input.insert("category".into(), json!(category.label()));
        input.insert("subcategory".into(), json!(category.subcategory()));
        input.insert("routing".into(), json!(category.routing()));

        ctx.memory()
            .store("classification", Value::Object(input.clone()), false);
        ctx.log(format!("Classified as: {}", category.label()));
        Ok(input)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessingLogic {
    pub work: SimulatedWork,
}

#[async_trait]
impl AgentLogic for ProcessingLogic {
    async fn execute(&self, ctx: &AgentContext<'_>, mut input: Payload) -> Result<Payload> {
        ctx.log("Starting processing");
        self.work.pause(500).await;

        input.insert("processed".into(), json!(true));
        input.insert(
            "processing_steps".into(),
            json!(["data_validation", "transformation", "enrichment"]),
        );
        input.insert(
            "enriched_data".into(),
            json!({
                "metadata": {
                    "processed_by": ctx.agent_name(),
                    "confidence_score": random_between(0.7, 1.0),
                    "quality_check": "passed",
                }
            }),
        );

        ctx.memory()
            .store("processed_data", Value::Object(input.clone()), false);
        ctx.log("Processing completed");
        Ok(input)
    }
}

/// Attaches a solution template for the request's category.
#[derive(Debug, Clone, Default)]
pub struct ResolutionLogic {
    pub work: SimulatedWork,
}

#[async_trait]
impl AgentLogic for ResolutionLogic {
    async fn execute(&self, ctx: &AgentContext<'_>, mut input: Payload) -> Result<Payload> {
        ctx.log("Generating resolution");
        self.work.pause(600).await;

        // Unclassified requests get the general template.
        let category = input
            .get("category")
            .and_then(Value::as_str)
            .and_then(Category::from_label)
            .unwrap_or(Category::General);
        let solution = category.solution();
        let kind = solution["type"].as_str().unwrap_or_default().to_string();

        input.insert("solution".into(), solution);
        input.insert("resolution_type".into(), json!("automated"));
        input.insert("confidence".into(), json!(random_between(0.8, 0.99)));

        ctx.memory()
            .store("resolution", Value::Object(input.clone()), false);
        ctx.log(format!("Generated solution: {kind}"));
        Ok(input)
    }
}

/// Score in `0.0..=1.0` from the presence of a solution, a confident
/// resolution and prior processing.
pub fn quality_score(payload: &Payload) -> f64 {
    let mut score: f64 = 0.0;
    if payload.contains_key("solution") {
        score += 0.4;
    }
    if payload
        .get("confidence")
        .and_then(Value::as_f64)
        .is_some_and(|c| c > 0.8)
    {
        score += 0.3;
    }
    if payload
        .get("processed")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        score += 0.3;
    }
    score.min(1.0)
}

#[derive(Debug, Clone, Default)]
pub struct QualityLogic {
    pub work: SimulatedWork,
}

#[async_trait]
impl AgentLogic for QualityLogic {
    async fn execute(&self, ctx: &AgentContext<'_>, mut input: Payload) -> Result<Payload> {
        ctx.log("Starting quality review");
        self.work.pause(400).await;

        let score = quality_score(&input);
        input.insert("quality_score".into(), json!(score));
        input.insert(
            "quality_checks".into(),
            json!({
                "completeness": score > 0.7,
                "accuracy": score > 0.8,
                "consistency": score > 0.75,
            }),
        );
        input.insert("approved".into(), json!(score > 0.7));

        ctx.memory()
            .store("quality_check", Value::Object(input.clone()), false);
        ctx.log(format!("Quality score: {score:.2}"));
        Ok(input)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationLogic {
    pub work: SimulatedWork,
}

impl NotificationLogic {
    fn notifications(payload: &Payload) -> Vec<Value> {
        let mut sent = Vec::new();
        if payload
            .get("approved")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            sent.push(json!({
                "type": "email",
                "subject": "Request Processed Successfully",
                "status": "sent",
            }));
        }
        if payload.get("priority").and_then(Value::as_str) == Some(Priority::High.label()) {
            sent.push(json!({
                "type": "sms",
                "message": "High priority request completed",
                "status": "sent",
            }));
        }
        sent
    }
}

#[async_trait]
impl AgentLogic for NotificationLogic {
    async fn execute(&self, ctx: &AgentContext<'_>, mut input: Payload) -> Result<Payload> {
        ctx.log("Sending notifications");
        self.work.pause(300).await;

        let notifications = Self::notifications(&input);
        let count = notifications.len();
        input.insert("notifications_sent".into(), Value::Array(notifications));
        input.insert("delivery_status".into(), json!("sent"));
        input.insert("recipients".into(), json!(["customer", "support_team"]));

        ctx.memory()
            .store("notifications", Value::Object(input.clone()), false);
        ctx.log(format!("Sent {count} notifications"));
        Ok(input)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyticsLogic {
    pub work: SimulatedWork,
}

impl AnalyticsLogic {
    fn insights(success_rate: f64, satisfaction: f64) -> Vec<&'static str> {
        let mut insights = Vec::new();
        if success_rate > 0.95 {
            insights.push("High success rate maintained");
        }
        if satisfaction > 4.5 {
            insights.push("Excellent customer satisfaction");
        }
        insights
    }
}

#[async_trait]
impl AgentLogic for AnalyticsLogic {
    async fn execute(&self, ctx: &AgentContext<'_>, mut input: Payload) -> Result<Payload> {
        ctx.log("Analyzing data");
        self.work.pause(500).await;

        let success_rate = random_between(0.85, 0.99);
        let satisfaction = random_between(4.0, 5.0);
        input.insert(
            "analytics".into(),
            json!({
                "processing_time": random_between(1.0, 5.0),
                "success_rate": success_rate,
                "customer_satisfaction": satisfaction,
                "efficiency_score": random_between(0.8, 0.95),
            }),
        );
        input.insert(
            "insights".into(),
            json!(Self::insights(success_rate, satisfaction)),
        );

        ctx.memory()
            .store("analytics", Value::Object(input.clone()), true);
        ctx.log("Analytics generated");
        Ok(input)
    }
}
