use chromiumoxide::Page;
use labelgrab_engine::backend::BackendError;
use labelgrab_engine::protocol::PageSnapshot;
use serde_json::Value;
use std::time::Duration;

const SNAPSHOT_JS: &str = include_str!("snapshot.js");

/// Attribute the snapshot script stamps on every element it reports.
pub const ID_ATTR: &str = "data-lg-id";

/// Upper bound for one evaluation. A JavaScript dialog blocks the page
/// thread, and so does a page busy rendering a large order table.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_CONTEXT_RETRIES: u32 = 10;

const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// The page context goes away while a navigation commits.
fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

pub fn selector_for(id: u32) -> String {
    format!("[{}=\"{}\"]", ID_ATTR, id)
}

/// Evaluate `expression`, retrying while the execution context is being
/// replaced by a navigation.
pub async fn evaluate(page: &Page, expression: &str) -> Result<Value, BackendError> {
    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        match evaluate_with_timeout(page, expression).await {
            Ok(value) => return Ok(value),
            Err(EvalError::Timeout) => {
                return Err(BackendError::Timeout {
                    operation: "script evaluation (is a dialog open?)".into(),
                });
            }
            Err(EvalError::Context(err)) => {
                tracing::debug!(
                    "Context error during evaluation (attempt {}/{}), retrying...",
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(EvalError::Other(err)) => return Err(BackendError::ScriptError(err)),
        }
    }

    Err(BackendError::ScriptError(last_error.unwrap_or_else(|| {
        "evaluation failed after retries".to_string()
    })))
}

pub async fn snapshot(page: &Page) -> Result<PageSnapshot, BackendError> {
    let value = evaluate(page, SNAPSHOT_JS).await?;
    Ok(serde_json::from_value(value)?)
}

enum EvalError {
    Timeout,
    Context(String),
    Other(String),
}

async fn evaluate_with_timeout(page: &Page, expression: &str) -> Result<Value, EvalError> {
    match tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await {
        Err(_) => Err(EvalError::Timeout),
        Ok(Err(e)) => {
            let err = e.to_string();
            if is_context_error(&err) {
                Err(EvalError::Context(err))
            } else {
                Err(EvalError::Other(err))
            }
        }
        // `undefined` has no JSON value; treat it as null.
        Ok(Ok(result)) => Ok(result.value().cloned().unwrap_or(Value::Null)),
    }
}
