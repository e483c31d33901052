//! Result Normalizer - turns a raw strategy payload into a [`MediaEnvelope`]
//!
//! Classification order, first match wins:
//! 1. `is_video` flag → video
//! 2. `is_image` flag → photo
//! 3. leading bytes: JPEG, PNG, GIF → photo
//! 4. anything else → video

use crate::extractor::types::{
    DispatchOutcome, EnvelopeMetadata, MediaEnvelope, MediaKind, RawPayload,
};

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47];
const GIF_MAGIC: &[u8] = b"GIF8";

/// Guess the media kind from the content's leading bytes
#[must_use]
pub fn sniff_kind(content: &[u8]) -> MediaKind {
    if content.starts_with(JPEG_MAGIC)
        || content.starts_with(PNG_MAGIC)
        || content.starts_with(GIF_MAGIC)
    {
        MediaKind::Photo
    } else {
        MediaKind::Video
    }
}

/// Kind of a payload: explicit flags first, then signature sniffing
#[must_use]
pub fn classify(payload: &RawPayload) -> MediaKind {
    if payload.is_video {
        MediaKind::Video
    } else if payload.is_image {
        MediaKind::Photo
    } else {
        sniff_kind(&payload.content)
    }
}

/// Caption if non-empty, else title, else empty
#[must_use]
pub fn resolve_caption(payload: &RawPayload) -> String {
    [&payload.caption, &payload.title]
        .into_iter()
        .flatten()
        .find(|text| !text.is_empty())
        .cloned()
        .unwrap_or_default()
}

/// Build the canonical envelope for a successful dispatch
#[must_use]
pub fn normalize(outcome: DispatchOutcome) -> MediaEnvelope {
    let kind = classify(&outcome.payload);
    let caption = resolve_caption(&outcome.payload);
    let RawPayload {
        content,
        url,
        author,
        ..
    } = outcome.payload;

    MediaEnvelope {
        kind,
        data: content,
        caption,
        metadata: EnvelopeMetadata {
            url,
            author: author.unwrap_or_default(),
            timestamp: outcome.timestamp,
            strategy: outcome.strategy,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn outcome(payload: RawPayload) -> DispatchOutcome {
        DispatchOutcome {
            strategy: "ytdlp".to_string(),
            payload,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_flags_take_precedence_over_content() {
        let mut payload = RawPayload::new(&b"\xff\xd8jpeg"[..], "u");
        payload.is_video = true;
        assert_eq!(classify(&payload), MediaKind::Video);

        let mut payload = RawPayload::new(&b"\x00\x00\x00\x18ftypmp4"[..], "u");
        payload.is_image = true;
        assert_eq!(classify(&payload), MediaKind::Photo);

        // is_video wins when both are set
        payload.is_video = true;
        assert_eq!(classify(&payload), MediaKind::Video);
    }

    #[test]
    fn test_signature_sniffing() {
        assert_eq!(sniff_kind(b"\xff\xd8\xff\xe0"), MediaKind::Photo);
        assert_eq!(sniff_kind(b"\x89PNG\r\n\x1a\n"), MediaKind::Photo);
        assert_eq!(sniff_kind(b"GIF89a"), MediaKind::Photo);
        assert_eq!(sniff_kind(b"\x00\x00\x00\x18ftypisom"), MediaKind::Video);
        assert_eq!(sniff_kind(b"\xff"), MediaKind::Video);
        assert_eq!(sniff_kind(b""), MediaKind::Video);
    }

    #[test]
    fn test_caption_resolution_order() {
        let mut payload = RawPayload::new(Vec::<u8>::new(), "u");
        assert_eq!(resolve_caption(&payload), "");

        payload.title = Some("title".to_string());
        assert_eq!(resolve_caption(&payload), "title");

        payload.caption = Some(String::new());
        assert_eq!(resolve_caption(&payload), "title");

        payload.caption = Some("caption".to_string());
        assert_eq!(resolve_caption(&payload), "caption");
    }

    #[test]
    fn test_normalize_video_flag() {
        let mut payload = RawPayload::new(&b"anything"[..], "https://instagram.com/reel/x/");
        payload.is_video = true;
        payload.author = Some("someone".to_string());

        let envelope = normalize(outcome(payload));
        assert_eq!(envelope.kind, MediaKind::Video);
        assert_eq!(envelope.kind.to_string(), "video");
        assert_eq!(envelope.metadata.author, "someone");
        assert_eq!(envelope.metadata.url, "https://instagram.com/reel/x/");
        assert_eq!(envelope.metadata.strategy, "ytdlp");
    }

    #[test]
    fn test_normalize_jpeg_without_flags() {
        let payload = RawPayload::new(&b"\xff\xd8rest"[..], "https://instagram.com/p/x/");
        let envelope = normalize(outcome(payload));
        assert_eq!(envelope.kind, MediaKind::Photo);
        assert_eq!(envelope.data.as_ref(), b"\xff\xd8rest");
        assert_eq!(envelope.metadata.author, "");
    }

    proptest! {
        #[test]
        fn classification_is_deterministic(
            content in proptest::collection::vec(any::<u8>(), 0..64),
            is_video in any::<bool>(),
            is_image in any::<bool>(),
        ) {
            let mut payload = RawPayload::new(content, "u");
            payload.is_video = is_video;
            payload.is_image = is_image;

            let first = classify(&payload);
            prop_assert_eq!(first, classify(&payload));
            if is_video {
                prop_assert_eq!(first, MediaKind::Video);
            } else if is_image {
                prop_assert_eq!(first, MediaKind::Photo);
            }
        }

        #[test]
        fn image_signatures_always_photo(
            magic in prop_oneof![
                Just(JPEG_MAGIC.to_vec()),
                Just(PNG_MAGIC.to_vec()),
                Just(GIF_MAGIC.to_vec()),
            ],
            tail in proptest::collection::vec(any::<u8>(), 0..32),
        ) {
            let mut content = magic;
            content.extend(tail);
            prop_assert_eq!(sniff_kind(&content), MediaKind::Photo);
        }

        #[test]
        fn caption_is_idempotent(
            caption in proptest::option::of("\\PC{0,20}"),
            title in proptest::option::of("\\PC{0,20}"),
        ) {
            let mut payload = RawPayload::new(Vec::<u8>::new(), "u");
            payload.caption = caption;
            payload.title = title;

            let first = normalize(outcome(payload.clone())).caption;
            let second = normalize(outcome(payload)).caption;
            prop_assert_eq!(first, second);
        }
    }
}
