use http::StatusCode;
use msgbridge_protocol::client::AssistantMessage;
use msgbridge_protocol::client::Choice;
use msgbridge_protocol::client::ClientRole;
use msgbridge_protocol::client::ClientUnaryResponse;
use msgbridge_protocol::client::ClientUsage;
use msgbridge_protocol::client::FinishReason;
use msgbridge_protocol::upstream::ResponseBlock;
use msgbridge_protocol::upstream::UpstreamUnaryResponse;

use crate::error::GatewayError;
use crate::error::Result;

/// Converts a complete upstream reply into a chat completion.
///
/// `status` is the upstream HTTP status; it is passed through unchanged when
/// the body carries an `error` object or the status is not a success.
pub fn translate_response(
    status: StatusCode,
    body: &[u8],
    requested_model: &str,
) -> Result<ClientUnaryResponse> {
    let resp: UpstreamUnaryResponse =
        serde_json::from_slice(body).map_err(GatewayError::UpstreamDecode)?;

    if let Some(error) = resp.error {
        return Err(GatewayError::UpstreamReported {
            status,
            kind: error.kind,
            message: error.message,
        });
    }
    if !status.is_success() {
        return Err(status_error(status));
    }

    let content = assistant_text(&resp.content);
    let usage = ClientUsage {
        prompt_tokens: resp.usage.input_tokens,
        completion_tokens: resp.usage.output_tokens,
        total_tokens: resp.usage.input_tokens.saturating_add(resp.usage.output_tokens),
    };
    let id = if resp.id.is_empty() {
        crate::new_completion_id()
    } else {
        resp.id
    };
    let model = if resp.model.is_empty() {
        requested_model.to_string()
    } else {
        resp.model
    };

    Ok(ClientUnaryResponse {
        id,
        object: ClientUnaryResponse::OBJECT.to_string(),
        created: crate::unix_now(),
        model,
        choices: vec![Choice {
            index: 0,
            message: AssistantMessage {
                role: ClientRole::Assistant,
                content,
            },
            finish_reason: FinishReason::Stop,
        }],
        usage,
    })
}

/// Failure for a non-success upstream reply whose body has no `error` object.
pub(crate) fn status_error(status: StatusCode) -> GatewayError {
    GatewayError::UpstreamReported {
        status,
        kind: "api_error".to_string(),
        message: format!("upstream returned status {status}"),
    }
}

/// Pulls the assistant text out of the reply's content blocks.
///
/// Text blocks (or untyped blocks with text) are preferred. If none match, the
/// text of every block is used, and as a last resort the first block's text.
fn assistant_text(blocks: &[ResponseBlock]) -> String {
    let text: String = blocks
        .iter()
        .filter(|b| match b.kind.as_deref() {
            Some("text") => true,
            None | Some("") => !b.text.is_empty(),
            Some(_) => false,
        })
        .map(|b| b.text.as_str())
        .collect();
    if !text.is_empty() {
        return text;
    }

    let text: String = blocks.iter().map(|b| b.text.as_str()).collect();
    if !text.is_empty() {
        return text;
    }

    blocks.first().map(|b| b.text.clone()).unwrap_or_default()
}
