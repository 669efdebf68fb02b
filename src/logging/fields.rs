//! Field extraction helpers for structured logging of routed requests.

use crate::adapter::{Response, SystemError, TokenUsage};

/// Extract token counts from a provider response.
///
/// Returns a tuple of (input_tokens, output_tokens, total_tokens).
///
/// # Examples
///
/// ```no_run
/// use keyrouter::logging::extract_tokens;
/// use keyrouter::adapter::TokenUsage;
///
/// let usage = TokenUsage { input_tokens: 10, output_tokens: 5 };
/// let (input, output, total) = extract_tokens(&usage);
/// assert_eq!(total, 15);
/// ```
pub fn extract_tokens(usage: &TokenUsage) -> (u32, u32, u32) {
    (usage.input_tokens, usage.output_tokens, usage.total())
}

/// Extract a log-friendly (status, error_message) pair from a provider call
/// result.
///
/// - For Ok results: ("success", None)
/// - For Err results: (error category as lowercase string, Some(message))
///
/// # Examples
///
/// ```no_run
/// use keyrouter::logging::extract_status;
/// use keyrouter::adapter::{ErrorCategory, SystemError};
///
/// let result: Result<(), SystemError> = Err(SystemError::rate_limit("too many requests", Some(30)));
/// let (status, error_msg) = extract_status(&result);
/// assert_eq!(status, "rate_limit");
/// assert!(error_msg.is_some());
/// ```
pub fn extract_status<T>(result: &Result<T, SystemError>) -> (String, Option<String>) {
    match result {
        Ok(_) => ("success".to_string(), None),
        Err(e) => {
            let status = format!("{:?}", e.category).to_lowercase();
            (status, Some(e.message.clone()))
        }
    }
}

/// Truncate the final message of a routed request for an audit-log preview
/// (privacy-safe). Returns `None` if content logging is disabled.
///
/// When enabled, returns the first ~100 characters of the last message, which
/// is usually the user's most recent turn.
pub fn truncate_prompt(messages: &[crate::adapter::Message], enable_content_logging: bool) -> Option<String> {
    if !enable_content_logging {
        return None;
    }

    let content = messages.last().map(|m| m.content.as_str())?;
    if content.is_empty() {
        return None;
    }

    Some(truncate_string(content, 100))
}

/// Extract (model_used, response_time_ms) for audit logging of a successful
/// call.
pub fn extract_response_fields(response: &Response) -> (&str, u64) {
    (&response.metadata.model_used, response.metadata.response_time_ms)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len.min(s.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ErrorCategory, Message};

    #[test]
    fn extract_tokens_sums_input_and_output() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
        };

        let (input, output, total) = extract_tokens(&usage);
        assert_eq!(input, 100);
        assert_eq!(output, 50);
        assert_eq!(total, 150);
    }

    #[test]
    fn extract_status_ok_has_no_message() {
        let result: Result<(), SystemError> = Ok(());
        let (status, message) = extract_status(&result);
        assert_eq!(status, "success");
        assert!(message.is_none());
    }

    #[test]
    fn extract_status_err_reports_category_and_message() {
        let result: Result<(), SystemError> = Err(SystemError::new(ErrorCategory::Network, "connection reset"));
        let (status, message) = extract_status(&result);
        assert_eq!(status, "network");
        assert_eq!(message.as_deref(), Some("connection reset"));
    }

    #[test]
    fn truncate_prompt_disabled_returns_none() {
        let messages = vec![Message {
            role: "user".to_string(),
            content: "hello".to_string(),
        }];
        assert!(truncate_prompt(&messages, false).is_none());
    }

    #[test]
    fn truncate_prompt_uses_last_message() {
        let messages = vec![
            Message { role: "user".to_string(), content: "first".to_string() },
            Message { role: "assistant".to_string(), content: "second".to_string() },
        ];
        assert_eq!(truncate_prompt(&messages, true), Some("second".to_string()));
    }
}
