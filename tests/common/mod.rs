//! Shared test helpers: scripted engines and function agents.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use agentweave::agent::{Agent, FnAgent, InvocationContext};
use agentweave::error::WeaveError;
use agentweave::model::{GenerateRequest, ScriptedEngine};
use agentweave::types::{Generation, Part, ToolCall};

/// Agent that returns its input with `suffix` appended.
pub fn append(name: &str, suffix: &str) -> Arc<dyn Agent> {
    let suffix = suffix.to_string();
    Arc::new(FnAgent::map(name, move |input| format!("{input}{suffix}")))
}

/// Agent that always fails with an upstream error.
pub fn failing(name: &str) -> Arc<dyn Agent> {
    let service = name.to_string();
    Arc::new(FnAgent::new(name, move |_input, _ctx: InvocationContext| {
        let service = service.clone();
        async move { Err::<String, _>(WeaveError::upstream(service, "backend unavailable")) }
    }))
}

/// Agent that sleeps before answering with `text`.
pub fn delayed(name: &str, millis: u64, text: &str) -> Arc<dyn Agent> {
    let text = text.to_string();
    Arc::new(FnAgent::new(name, move |_input, _ctx: InvocationContext| {
        let text = text.clone();
        async move {
            tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
            Ok(text)
        }
    }))
}

/// Agent that records every input it receives and echoes it back.
pub fn recorder(name: &str) -> (Arc<dyn Agent>, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let agent = FnAgent::map(name, move |input| {
        log.lock().unwrap().push(input.to_string());
        input.to_string()
    });
    (Arc::new(agent), seen)
}

/// Engine that requests `tool` with `args` once, then answers with the tool result.
pub fn call_then_answer(tool: &str, args: serde_json::Value) -> ScriptedEngine {
    let tool = tool.to_string();
    ScriptedEngine::new("scripted", move |req: &GenerateRequest| {
        if req.is_tool_followup() {
            Ok(Generation::text(format!("done: {}", last_tool_result(req))))
        } else {
            Ok(Generation::calls(vec![ToolCall::new(tool.clone(), args.clone())]))
        }
    })
}

/// JSON of the most recent tool result in the request context.
pub fn last_tool_result(req: &GenerateRequest) -> serde_json::Value {
    req.context
        .iter()
        .rev()
        .flat_map(|m| m.parts.iter())
        .find_map(|part| match part {
            Part::ToolResult(result) => Some(result.result.clone()),
            _ => None,
        })
        .unwrap_or(serde_json::Value::Null)
}
