use msgbridge_protocol::client::ClientRequest;
use msgbridge_protocol::client::ClientRole;
use msgbridge_protocol::upstream::UpstreamMessage;
use msgbridge_protocol::upstream::UpstreamRequest;
use msgbridge_protocol::upstream::UpstreamRole;

use crate::error::GatewayError;
use crate::error::Result;
use crate::normalize;

/// Output ceiling sent with every request; the lowest limit shared by all
/// supported models.
pub const MAX_TOKENS: u32 = 4096;

/// Builds the upstream request for `req`. `model` is the already-resolved
/// allowlist entry.
pub fn translate_request(req: &ClientRequest, model: &str, stream: bool) -> Result<UpstreamRequest> {
    if req.messages.is_empty() {
        return Err(GatewayError::BadRequest(
            "messages must not be empty".to_string(),
        ));
    }

    let mut system = None;
    let mut messages = Vec::with_capacity(req.messages.len());
    for message in &req.messages {
        let role = match message.role {
            ClientRole::System => {
                // Only one system prompt is forwarded; a later one replaces
                // an earlier one.
                let text = normalize::system_text(message.content.as_ref());
                system = (!text.is_empty()).then_some(text);
                continue;
            }
            ClientRole::User => UpstreamRole::User,
            ClientRole::Assistant => UpstreamRole::Assistant,
        };
        let content = normalize::content_blocks(message.content.as_ref());
        if content.is_empty() {
            tracing::debug!("dropping {role} message without content");
            continue;
        }
        messages.push(UpstreamMessage { role, content });
    }

    Ok(UpstreamRequest {
        model: model.to_string(),
        max_tokens: MAX_TOKENS,
        system,
        messages,
        stream,
        temperature: req.temperature,
        top_p: req.top_p,
    })
}
