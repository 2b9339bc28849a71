use super::*;
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::json;
use std::io::Cursor;

fn raw_with(message: Value) -> RawMessage {
    serde_json::from_value(json!({
        "key": {"remoteJid": "5491112223333@s.whatsapp.net", "fromMe": false, "id": "ID1"},
        "message": message,
        "messageTimestamp": 1700000000
    }))
    .unwrap()
}

fn media(mimetype: &str) -> Value {
    json!({
        "url": "https://mmg.whatsapp.net/v/t62/abc",
        "directPath": "/v/t62/abc",
        "mimetype": mimetype,
        "fileLength": "20480",
        "fileSha256": "c2hh",
        "mediaKey": "a2V5",
        "width": 800,
        "height": 600,
        "seconds": 12
    })
}

#[test]
fn test_all_variants_classified() {
    let cases = [
        (json!({"conversation": "hola"}), MessageType::Text),
        (json!({"extendedTextMessage": {"text": "see https://x.y"}}), MessageType::Text),
        (json!({"imageMessage": media("image/jpeg")}), MessageType::Image),
        (json!({"videoMessage": media("video/mp4")}), MessageType::Video),
        (json!({"audioMessage": media("audio/ogg; codecs=opus")}), MessageType::Audio),
        (json!({"stickerMessage": media("image/webp")}), MessageType::Sticker),
        (json!({"documentMessage": media("application/pdf")}), MessageType::Document),
        (
            json!({"contactMessage": {"displayName": "Ana", "vcard": "BEGIN:VCARD\nEND:VCARD"}}),
            MessageType::Contact,
        ),
        (
            json!({"locationMessage": {"degreesLatitude": -34.6, "degreesLongitude": -58.4}}),
            MessageType::Location,
        ),
    ];

    for (message, expected) in cases {
        let classified = classify(&raw_with(message.clone()));
        assert_eq!(classified.message_type, expected, "payload {message}");
        assert!(!classified.content.is_empty(), "payload {message}");

        if expected.is_downloadable() {
            let info = classified
                .download_info
                .as_ref()
                .unwrap_or_else(|| panic!("{expected} must carry download info"));
            assert_eq!(info.media_type, expected);
            assert!(!info.filename.is_empty());
        } else {
            assert!(classified.download_info.is_none());
        }
    }
}

#[test]
fn test_placeholders_for_non_text() {
    let image = classify(&raw_with(json!({"imageMessage": media("image/jpeg")})));
    assert_eq!(image.content, "[Image]");

    let voice = classify(&raw_with(
        json!({"audioMessage": {"mimetype": "audio/ogg; codecs=opus", "ptt": true}}),
    ));
    assert_eq!(voice.content, "[Voice note]");
    assert_eq!(voice.media_info.is_voice_note, Some(true));

    let doc = classify(&raw_with(
        json!({"documentMessage": {"mimetype": "application/pdf", "fileName": "quote.pdf"}}),
    ));
    assert_eq!(doc.content, "[Document: quote.pdf]");

    let contact = classify(&raw_with(json!({"contactMessage": {"displayName": "Ana"}})));
    assert_eq!(contact.content, "[Contact: Ana]");

    let location = classify(&raw_with(
        json!({"locationMessage": {"degreesLatitude": 1.5, "degreesLongitude": 2.25}}),
    ));
    assert_eq!(location.content, "[Location: 1.5, 2.25]");
}

#[test]
fn test_caption_replaces_placeholder() {
    let mut payload = media("image/png");
    payload["caption"] = json!("  new catalogue  ");
    let classified = classify(&raw_with(json!({"imageMessage": payload})));
    assert_eq!(classified.content, "new catalogue");
    assert_eq!(classified.media_info.caption.as_deref(), Some("  new catalogue  "));
}

#[test]
fn test_media_info_fields() {
    let classified = classify(&raw_with(json!({"videoMessage": media("video/mp4")})));
    let info = &classified.media_info;
    assert_eq!(info.file_length, Some(20480));
    assert_eq!(info.seconds, Some(12));
    assert_eq!(info.media_key.as_deref(), Some("a2V5"));
    assert_eq!(info.can_download, Some(true));
    assert_eq!(info.download_method, Some(DownloadMethod::Url));

    let download = classified.download_info.unwrap();
    assert_eq!(download.filename, "video_1700000000.mp4");
    assert_eq!(download.url.as_deref(), Some("https://mmg.whatsapp.net/v/t62/abc"));
}

#[test]
fn test_media_key_only_download_method() {
    let classified = classify(&raw_with(json!({"stickerMessage": {
        "directPath": "/v/t62/sticker",
        "mediaKey": "a2V5",
        "mimetype": "image/webp"
    }})));
    assert_eq!(classified.media_info.download_method, Some(DownloadMethod::MediaKey));
    assert_eq!(classified.media_info.can_download, Some(true));
    assert_eq!(classified.download_info.unwrap().filename, "sticker_1700000000.webp");
}

#[test]
fn test_unknown_mime_and_missing_timestamp() {
    let raw: RawMessage = serde_json::from_value(json!({
        "key": {"remoteJid": "1@s.whatsapp.net", "id": "X"},
        "message": {"documentMessage": {"url": "https://cdn/x", "mimetype": "application/x-custom"}}
    }))
    .unwrap();
    let before = Utc::now().timestamp();
    let filename = classify(&raw).download_info.unwrap().filename;

    assert!(filename.starts_with("document_"));
    assert!(filename.ends_with(".bin"));
    let ts: i64 = filename
        .trim_start_matches("document_")
        .trim_end_matches(".bin")
        .parse()
        .unwrap();
    assert!(ts >= before);
}

#[test]
fn test_unknown_variant_keeps_raw_payload() {
    let classified = classify(&raw_with(json!({"pollCreationMessage": {"name": "Lunch?"}})));
    assert_eq!(classified.message_type, MessageType::Unknown);
    assert!(classified.download_info.is_none());
    assert_eq!(
        classified.media_info.raw,
        Some(json!({"pollCreationMessage": {"name": "Lunch?"}}))
    );
}

#[test]
fn test_text_media_info_serializes_empty() {
    let classified = classify(&raw_with(json!({"conversation": "hi"})));
    assert_eq!(serde_json::to_value(&classified.media_info).unwrap(), json!({}));
}

struct StaticDownloader(std::result::Result<Vec<u8>, String>);

#[async_trait]
impl MediaDownloader for StaticDownloader {
    async fn download_media(&self, _raw: &Value) -> Result<Vec<u8>> {
        self.0
            .clone()
            .map_err(zapgate_core::Error::Socket)
    }
}

fn large_bmp() -> Vec<u8> {
    let img = RgbImage::from_fn(2200, 1000, |x, y| {
        image::Rgb([(x % 251) as u8, (y % 241) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Bmp)
        .unwrap();
    out.into_inner()
}

#[tokio::test]
async fn test_image_enrichment_compresses_inline() {
    let payload = json!({
        "key": {"remoteJid": "5491112223333@s.whatsapp.net", "fromMe": false, "id": "IMG1"},
        "message": {"imageMessage": media("image/bmp")},
        "messageTimestamp": 1700000000
    });
    let raw: RawMessage = serde_json::from_value(payload.clone()).unwrap();
    let input = large_bmp();
    let downloader = StaticDownloader(Ok(input.clone()));

    let mut classified = classify(&raw);
    enrich_image(&mut classified, &payload, &downloader, TranscodeOptions::default()).await;

    assert_eq!(classified.message_type, MessageType::Image);
    let compressed = classified.media_info.image_compressed.as_deref().unwrap();
    assert!(!compressed.is_empty());
    assert!(compressed.len() < input.len());
    assert_eq!(classified.media_info.image_width, Some(1920));
    assert_eq!(classified.media_info.image_mimetype.as_deref(), Some("image/jpeg"));
    assert_eq!(classified.download_info.unwrap().media_type, MessageType::Image);
}

#[tokio::test]
async fn test_image_enrichment_failure_keeps_reference() {
    let payload = json!({
        "key": {"remoteJid": "5491112223333@s.whatsapp.net", "id": "IMG2"},
        "message": {"imageMessage": media("image/jpeg")}
    });
    let raw: RawMessage = serde_json::from_value(payload.clone()).unwrap();
    let downloader = StaticDownloader(Err("media expired".to_string()));

    let mut classified = classify(&raw);
    let before = classified.clone();
    enrich_image(&mut classified, &payload, &downloader, TranscodeOptions::default()).await;

    assert_eq!(classified, before);
    assert!(classified.media_info.image_compressed.is_none());
    assert!(classified.media_info.url.is_some());
}
