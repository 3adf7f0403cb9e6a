//! Folds client message content into upstream content blocks.
//!
//! Content arrives either as a bare string or as a list of typed parts. Both
//! forms are reduced to a `Vec<UpstreamContentBlock>` here so nothing further
//! down the pipeline needs to look at the raw client shape.

use msgbridge_protocol::client::ContentPart;
use msgbridge_protocol::client::MessageContent;
use msgbridge_protocol::upstream::ImageEncoding;
use msgbridge_protocol::upstream::ImageSource;
use msgbridge_protocol::upstream::UpstreamContentBlock;
use tracing::debug;

const DATA_URI_IMAGE_PREFIX: &str = "data:image/";
const REMOTE_IMAGE_MEDIA_TYPE: &str = "image/jpeg";

/// Plain text of a system turn: string content verbatim, otherwise every text
/// part concatenated in order. Image and unknown parts contribute nothing.
pub fn system_text(content: Option<&MessageContent>) -> String {
    match content {
        None => String::new(),
        Some(MessageContent::Text(text)) => text.clone(),
        Some(MessageContent::Parts(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect(),
    }
}

pub fn content_blocks(content: Option<&MessageContent>) -> Vec<UpstreamContentBlock> {
    match content {
        None => Vec::new(),
        Some(MessageContent::Text(text)) if text.is_empty() => Vec::new(),
        Some(MessageContent::Text(text)) => vec![UpstreamContentBlock::Text { text: text.clone() }],
        Some(MessageContent::Parts(parts)) => parts.iter().filter_map(part_to_block).collect(),
    }
}

fn part_to_block(part: &ContentPart) -> Option<UpstreamContentBlock> {
    match part {
        ContentPart::Text { text } => Some(UpstreamContentBlock::Text { text: text.clone() }),
        ContentPart::ImageUrl { image_url } => {
            image_source(&image_url.url).map(|source| UpstreamContentBlock::Image { source })
        }
        ContentPart::Unsupported => {
            debug!("dropping unsupported content part");
            None
        }
    }
}

fn image_source(url: &str) -> Option<ImageSource> {
    if !url.starts_with(DATA_URI_IMAGE_PREFIX) {
        return Some(ImageSource {
            encoding: ImageEncoding::Url,
            media_type: REMOTE_IMAGE_MEDIA_TYPE.to_string(),
            data: url.to_string(),
        });
    }

    let Some((header, payload)) = url.split_once(',') else {
        debug!("dropping data URI image without payload");
        return None;
    };
    if payload.is_empty() {
        debug!("dropping data URI image with empty payload");
        return None;
    }
    let media_type = header.trim_start_matches("data:");
    let media_type = media_type.strip_suffix(";base64").unwrap_or(media_type);
    Some(ImageSource {
        encoding: ImageEncoding::Base64,
        media_type: media_type.to_string(),
        data: payload.to_string(),
    })
}
