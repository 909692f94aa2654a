//! Built-in tools for payment lookups, user memory, and loop control.
//!
//! Each tool is constructed via [`FunctionTool`] and returned as `Arc<dyn Tool>`.
//!
//! ```rust,no_run
//! use agentweave::tools::builtin::all_tools;
//!
//! let tools = all_tools();
//! assert_eq!(tools.len(), 5);
//! ```

use std::sync::Arc;

use serde_json::json;

use crate::tools::tool::{FunctionTool, Tool};
use crate::tools::types::ToolParameters;

/// Prefix under which user memory is stored in session state.
pub const USER_STATE_PREFIX: &str = "user:";

/// Tool name an agent calls to end an enclosing loop.
pub const EXIT_LOOP: &str = "exit_loop";

const FEES: &[(&str, f64)] = &[
    ("platinum credit card", 0.02),
    ("gold debit card", 0.035),
    ("bank transfer", 0.01),
];

const EXCHANGE_RATES: &[(&str, &str, f64)] = &[
    ("usd", "eur", 0.93),
    ("usd", "jpy", 157.50),
    ("usd", "inr", 83.58),
];

/// Look up the transaction fee percentage for a payment method.
pub fn fee_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::sync(
        "get_fee_for_payment_method",
        "Looks up the transaction fee percentage for a given payment method",
        ToolParameters::object()
            .string(
                "method",
                "The name of the payment method, e.g. \"platinum credit card\" or \"bank transfer\"",
                true,
            )
            .build(),
        |args, _ctx| {
            let method = args.get_str("method")?;
            let normalized = method.trim().to_lowercase();
            let fee = FEES
                .iter()
                .find(|(name, _)| *name == normalized)
                .map(|(_, fee)| *fee);
            Ok(match fee {
                Some(fee) => json!({ "status": "success", "fee_percentage": fee }),
                None => json!({
                    "status": "error",
                    "error_message": format!("Payment method '{method}' not found"),
                }),
            })
        },
    ))
}

/// Look up the exchange rate between two currencies.
pub fn exchange_rate_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::sync(
        "get_exchange_rate",
        "Looks up the exchange rate between two currencies",
        ToolParameters::object()
            .string("base_currency", "ISO 4217 code of the currency to convert from, e.g. \"USD\"", true)
            .string("target_currency", "ISO 4217 code of the currency to convert to, e.g. \"EUR\"", true)
            .build(),
        |args, _ctx| {
            let base = args.get_str("base_currency")?;
            let target = args.get_str("target_currency")?;
            let (b, t) = (base.trim().to_lowercase(), target.trim().to_lowercase());
            let rate = EXCHANGE_RATES
                .iter()
                .find(|(from, to, _)| *from == b && *to == t)
                .map(|(_, _, rate)| *rate);
            Ok(match rate {
                Some(rate) => json!({ "status": "success", "rate": rate }),
                None => json!({
                    "status": "error",
                    "error_message": format!("Unsupported currency pair: {base}/{target}"),
                }),
            })
        },
    ))
}

/// Save a piece of user information into session state.
pub fn save_userinfo_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::sync(
        "save_userinfo",
        "Saves a piece of information about the user (for example their name or country) to the session",
        ToolParameters::object()
            .string("key", "Name of the fact, e.g. \"user_name\"", true)
            .string("value", "Value to remember", true)
            .build(),
        |args, ctx| {
            let key = args.get_str("key")?;
            let value = args.get_str("value")?;
            ctx.set_state(format!("{USER_STATE_PREFIX}{key}"), json!(value));
            Ok(json!({ "status": "success", "key": key }))
        },
    ))
}

/// Retrieve previously saved user information; `value` is null when absent.
pub fn retrieve_userinfo_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::sync(
        "retrieve_userinfo",
        "Retrieves a piece of information about the user previously saved to the session",
        ToolParameters::object()
            .string("key", "Name of the fact, e.g. \"user_name\"", true)
            .build(),
        |args, ctx| {
            let key = args.get_str("key")?;
            let value = ctx
                .state(&format!("{USER_STATE_PREFIX}{key}"))
                .unwrap_or(serde_json::Value::Null);
            Ok(json!({ "status": "success", "key": key, "value": value }))
        },
    ))
}

/// Signal the enclosing loop to stop after this iteration.
pub fn exit_loop_tool() -> Arc<dyn Tool> {
    Arc::new(FunctionTool::sync(
        EXIT_LOOP,
        "Call this function ONLY when the critique says the work is approved, signaling the refinement loop should end",
        ToolParameters::empty(),
        |_args, ctx| {
            ctx.escalate();
            Ok(json!({
                "status": "approved",
                "message": "Story approved. Exiting refinement loop.",
            }))
        },
    ))
}

/// The two lookup tools.
pub fn lookup_tools() -> Vec<Arc<dyn Tool>> {
    vec![fee_tool(), exchange_rate_tool()]
}

/// The save/retrieve pair for user memory.
pub fn memory_tools() -> Vec<Arc<dyn Tool>> {
    vec![save_userinfo_tool(), retrieve_userinfo_tool()]
}

/// Return all built-in tools.
pub fn all_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        fee_tool(),
        exchange_rate_tool(),
        save_userinfo_tool(),
        retrieve_userinfo_tool(),
        exit_loop_tool(),
    ]
}
