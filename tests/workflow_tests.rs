//! Integration tests for the four workflow topologies.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentweave::agent::{Agent, FnAgent, InvocationContext, LlmAgent};
use agentweave::error::{FailureKind, WeaveError};
use agentweave::model::{GenerateRequest, ScriptedEngine};
use agentweave::stop::{LengthStop, NeverStop, StringStop};
use agentweave::tools::builtin::{exit_loop_tool, EXIT_LOOP};
use agentweave::types::{Generation, ToolCall};
use agentweave::workflow::{concat_merge, BranchResult, MergeFn, ParallelPolicy, Workflow};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{append, delayed, failing, last_tool_result, recorder};

fn ctx() -> InvocationContext {
    InvocationContext::detached("test")
}

fn counting(name: &str, counter: Arc<AtomicUsize>, chunk: &'static str) -> Arc<dyn Agent> {
    Arc::new(FnAgent::map(name, move |input| {
        counter.fetch_add(1, Ordering::SeqCst);
        format!("{input}{chunk}")
    }))
}

// ---------------------------------------------------------------------------
// Sequential
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sequential_feeds_each_output_to_the_next_step() {
    let (second, seen_second) = recorder("second");
    let (fourth, seen_fourth) = recorder("fourth");
    let workflow = Workflow::sequential(
        "pipeline",
        [append("first", "-a"), second, append("third", "-c"), fourth],
    )
    .unwrap();

    let output = workflow.run(&ctx(), "x".into()).await.unwrap();

    assert_eq!(*seen_second.lock().unwrap(), vec!["x-a".to_string()]);
    assert_eq!(*seen_fourth.lock().unwrap(), vec!["x-a-c".to_string()]);
    assert_eq!(output.text, "x-a-c");
    assert_eq!(
        output.invoked_agents(),
        vec!["first", "second", "third", "fourth", "pipeline"]
    );
}

#[tokio::test]
async fn sequential_fails_fast() {
    let (after, seen_after) = recorder("after");
    let workflow = Workflow::sequential("pipeline", [append("first", "-a"), failing("flaky"), after]).unwrap();

    let err = workflow.run(&ctx(), "x".into()).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::UpstreamFailure);
    assert!(seen_after.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Parallel
// ---------------------------------------------------------------------------

fn recording_merge(calls: Arc<Mutex<Vec<Vec<String>>>>) -> MergeFn {
    Arc::new(move |results: &[BranchResult]| {
        calls
            .lock()
            .unwrap()
            .push(results.iter().map(|r| r.name.clone()).collect());
        concat_merge()(results)
    })
}

#[tokio::test(start_paused = true)]
async fn parallel_merges_once_in_declaration_order() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let workflow = Workflow::parallel(
        "research",
        [
            delayed("slow", 30, "s"),
            delayed("fast", 10, "f"),
            delayed("medium", 20, "m"),
        ],
        recording_merge(Arc::clone(&calls)),
    )
    .unwrap();

    let output = workflow.run(&ctx(), "topic".into()).await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], vec!["slow", "fast", "medium"]);
    assert_eq!(output.text, "slow:\ns\n\nfast:\nf\n\nmedium:\nm");
}

#[tokio::test]
async fn parallel_branch_failure_fails_the_step_by_default() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let workflow = Workflow::parallel(
        "research",
        [append("ok", "!"), failing("down")],
        recording_merge(Arc::clone(&calls)),
    )
    .unwrap();

    let err = workflow.run(&ctx(), "q".into()).await.unwrap_err();

    match &err {
        WeaveError::BranchesFailed { failures, .. } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, "down");
        }
        other => panic!("expected BranchesFailed, got {other:?}"),
    }
    assert_eq!(err.kind(), FailureKind::UpstreamFailure);
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn parallel_partial_merge_sees_failed_entries() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let merge: MergeFn = Arc::new(move |results: &[BranchResult]| {
        log.lock().unwrap().extend(results.iter().map(|r| (r.name.clone(), r.is_success())));
        concat_merge()(results)
    });
    let policy = ParallelPolicy {
        merge_on_partial_failure: true,
        join_timeout: None,
    };
    let workflow =
        Workflow::parallel_with_policy("research", [append("ok", "!"), failing("down")], merge, policy).unwrap();

    let output = workflow.run(&ctx(), "q".into()).await.unwrap();

    assert_eq!(output.text, "ok:\nq!");
    assert_eq!(
        *seen.lock().unwrap(),
        vec![("ok".to_string(), true), ("down".to_string(), false)]
    );
}

#[tokio::test(start_paused = true)]
async fn parallel_join_timeout_aborts_slow_branches() {
    let policy = ParallelPolicy {
        merge_on_partial_failure: true,
        join_timeout: Some(Duration::from_millis(100)),
    };
    let workflow = Workflow::parallel_with_policy(
        "research",
        [delayed("quick", 10, "q"), delayed("stuck", 60_000, "never")],
        concat_merge(),
        policy,
    )
    .unwrap();

    let output = workflow.run(&ctx(), "go".into()).await.unwrap();

    assert_eq!(output.text, "quick:\nq");
}

#[tokio::test]
async fn parallel_branches_share_staged_state() {
    let writer: Arc<dyn Agent> = Arc::new(FnAgent::new("writer", |input: String, ctx: InvocationContext| async move {
        ctx.set_state("user:topic", json!(input));
        Ok("saved".to_string())
    }));
    let workflow = Workflow::parallel("fanout", [writer, append("other", "")], concat_merge()).unwrap();
    let ctx = ctx();

    workflow.run(&ctx, "rust".into()).await.unwrap();

    assert_eq!(ctx.get_state("user:topic"), Some(json!("rust")));
}

#[test]
fn parallel_rejects_duplicate_branch_names() {
    let err = Workflow::parallel("dup", [append("a", ""), append("a", "")], concat_merge()).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Configuration);
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn loop_without_convergence_stops_at_max_iterations() {
    let runs = Arc::new(AtomicUsize::new(0));
    let body = counting("grow", Arc::clone(&runs), "0123456789");
    let workflow = Workflow::looping("refine", body, 3, Arc::new(LengthStop::new(100))).unwrap();

    let output = workflow.run(&ctx(), String::new()).await.unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(output.text.chars().count(), 30);
    assert!(!output.escalate);
}

#[tokio::test]
async fn loop_with_rejecting_predicate_terminates_within_bound() {
    for max in [1u32, 2, 5, 8] {
        let runs = Arc::new(AtomicUsize::new(0));
        let body = counting("body", Arc::clone(&runs), "x");
        let workflow = Workflow::looping("spin", body, max, Arc::new(NeverStop)).unwrap();

        workflow.run(&ctx(), String::new()).await.unwrap();

        assert!(runs.load(Ordering::SeqCst) <= max as usize + 1);
    }
}

#[tokio::test]
async fn loop_stops_when_predicate_accepts() {
    let runs = Arc::new(AtomicUsize::new(0));
    let body = counting("draft", Arc::clone(&runs), "+");
    let workflow = Workflow::looping("refine", body, 10, Arc::new(StringStop::new("+++"))).unwrap();

    let output = workflow.run(&ctx(), "v".into()).await.unwrap();

    assert_eq!(output.text, "v+++");
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn loop_exits_when_body_calls_exit_loop() {
    let engine = Arc::new(ScriptedEngine::new("critic", |req: &GenerateRequest| {
        if req.is_tool_followup() {
            Ok(Generation::text("looks good"))
        } else {
            Ok(Generation::calls(vec![ToolCall::new(EXIT_LOOP, json!({}))]))
        }
    }));
    let critic = LlmAgent::builder("critic", engine.clone())
        .instruction("Call exit_loop when the draft is good.")
        .tool(exit_loop_tool())
        .build()
        .unwrap();
    let workflow = Workflow::looping("review", Arc::new(critic), 5, Arc::new(NeverStop)).unwrap();

    let output = workflow.run(&ctx(), "draft".into()).await.unwrap();

    assert_eq!(output.text, "looks good");
    assert_eq!(engine.calls(), 2);
    assert!(!output.escalate);
}

// ---------------------------------------------------------------------------
// Hierarchical
// ---------------------------------------------------------------------------

fn router() -> Workflow {
    let billing = Arc::new(FnAgent::map("billing", |q| format!("billing handled: {q}")).with_description("Fees and charges"));
    let support = Arc::new(FnAgent::map("support", |q| format!("support handled: {q}")));
    let engine = Arc::new(ScriptedEngine::new("router", |req: &GenerateRequest| {
        if req.is_tool_followup() {
            let result = last_tool_result(req);
            return Ok(Generation::text(result["result"].as_str().unwrap_or_default()));
        }
        let query = req.last_user_text().unwrap_or_default();
        if query.contains("fee") {
            Ok(Generation::calls(vec![ToolCall::new("billing", json!({ "request": query }))]))
        } else {
            Ok(Generation::text("answered directly"))
        }
    }));
    let root = LlmAgent::builder("router", engine)
        .instruction("Route billing questions to the billing agent.")
        .sub_agent(billing)
        .sub_agent(support)
        .build()
        .unwrap();
    Workflow::hierarchical("desk", Arc::new(root)).unwrap()
}

#[tokio::test]
async fn hierarchical_delegates_only_to_the_matching_child() {
    let output = router().run(&ctx(), "what is the fee for cards?".into()).await.unwrap();

    assert_eq!(output.text, "billing handled: what is the fee for cards?");
    assert_eq!(output.invoked_agents(), vec!["billing", "router", "desk"]);
}

#[tokio::test]
async fn hierarchical_answers_directly_without_children() {
    let output = router().run(&ctx(), "hello there".into()).await.unwrap();

    assert_eq!(output.text, "answered directly");
    assert_eq!(output.invoked_agents(), vec!["router", "desk"]);
    assert_eq!(output.tool_calls().count(), 0);
}

#[test]
fn hierarchical_rejects_delegation_cycles() {
    let engine = Arc::new(ScriptedEngine::echo("e"));
    let leaf = LlmAgent::builder("loop", engine.clone()).build().unwrap();
    let middle = LlmAgent::builder("middle", engine.clone())
        .sub_agent(Arc::new(leaf))
        .build()
        .unwrap();
    let root = LlmAgent::builder("loop", engine).sub_agent(Arc::new(middle)).build().unwrap();

    let err = Workflow::hierarchical("desk", Arc::new(root)).unwrap_err();

    assert_eq!(err.kind(), FailureKind::Configuration);
    assert!(err.to_string().contains("loop -> middle -> loop"));
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

#[tokio::test]
async fn topologies_nest() {
    let fanout: Arc<dyn Agent> = Arc::new(
        Workflow::parallel("fanout", [append("left", "<"), append("right", ">")], concat_merge()).unwrap(),
    );
    let outer = Workflow::sequential("outer", [append("prep", "!"), fanout]).unwrap();

    let output = outer.run(&ctx(), "q".into()).await.unwrap();

    assert_eq!(output.text, "left:\nq!<\n\nright:\nq!>");
    assert_eq!(output.invoked_agents().last(), Some(&"outer"));
}
