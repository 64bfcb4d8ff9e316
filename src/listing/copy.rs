use crate::llm::{ChatCompletionRequest, LlmError, VisionClient};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const MAX_TITLE_CHARS: usize = 60;

const COPY_PROMPT: &str = "\
Premium bir kadın giyim markası için yazan bir moda editörüsün. Pazarlama metni değil, stil rehberi yazıyorsun.

GÖREV: Görseldeki ürünü incele ve ham ürün adını da kullanarak SEO başlığı ile açıklaması üret.

MARKA SESİ:
- Şehirli, minimal ve özgüvenli.
- \"Siz\" hitabı; mesafeli değil, samimi.
- Ürünü övme; ne hissettirdiğini anlat.

KAÇIN: \"şıklık\", \"zarif siluet\", \"sofistike\", \"modern kadın\", \"harika\", \"muhteşem\" gibi klişeler ve değerlendirme cümleleri.

AÇIKLAMA: İlk cümle ürünü tanıtır, ikinci cümle kullanım anını somutlaştırır, isteğe bağlı üçüncü cümle bir detay ya da kombin önerisi verir. Kısa cümleler kur. Kumaşı yalnızca görselden açıkça anlaşılıyorsa belirt.

SEO BAŞLIĞI: En fazla 60 karakter. Ürün türü + ayırt edici özellik + varsa desen/renk. Örnek: \"Leopar Desenli Kuşaklı Midi Elbise\". Gereksiz sıfat yok.

ÇIKTI: Yalnızca şu JSON yapısını döndür, başka metin ya da markdown ekleme:
{\"seo_title\": \"...\", \"seo_description\": \"...\"}";

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("copy generation failed: {0}")]
    Llm(#[from] LlmError),
    #[error("copy response is not the expected JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("copy response has an empty title")]
    EmptyTitle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingCopy {
    pub seo_title: String,
    pub seo_description: String,
}

pub fn copy_prompt(raw_title: &str) -> String {
    format!("{COPY_PROMPT}\n\nHAM ÜRÜN ADI: {}", raw_title.trim())
}

/// Ask the vision model for an SEO title and description of the product
/// shown in `image_url`.
pub async fn generate_copy(
    client: &VisionClient,
    model: &str,
    max_tokens: u32,
    image_url: &str,
    raw_title: &str,
) -> Result<ListingCopy, CopyError> {
    let request =
        ChatCompletionRequest::single_image(model, copy_prompt(raw_title), image_url, max_tokens);
    let text = client.complete(&request).await?;
    let copy = parse_copy(&text)?;

    let title_chars = copy.seo_title.chars().count();
    if title_chars > MAX_TITLE_CHARS {
        warn!(
            target = "vton.publish",
            title_chars,
            limit = MAX_TITLE_CHARS,
            "seo title exceeds recommended length"
        );
    }
    info!(target = "vton.publish", model, "listing copy generated");
    Ok(copy)
}

pub fn parse_copy(raw: &str) -> Result<ListingCopy, CopyError> {
    let body = strip_markdown_fence(raw);
    let mut copy: ListingCopy = serde_json::from_str(&body)?;
    copy.seo_title = copy.seo_title.trim().to_string();
    copy.seo_description = copy.seo_description.trim().to_string();
    if copy.seo_title.is_empty() {
        return Err(CopyError::EmptyTitle);
    }
    Ok(copy)
}

fn strip_markdown_fence(input: &str) -> String {
    let trimmed = input.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut body = Vec::new();
    for line in trimmed.lines().skip(1) {
        if line.trim_start().starts_with("```") {
            break;
        }
        body.push(line);
    }
    body.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayResponse;
    use crate::testing::ScriptedUpstream;
    use serde_json::json;

    #[test]
    fn parses_plain_and_fenced_json() {
        let plain = r#"{"seo_title": "Kuşaklı Midi Elbise", "seo_description": "Beli tanımlar."}"#;
        assert_eq!(parse_copy(plain).unwrap().seo_title, "Kuşaklı Midi Elbise");

        let fenced = "```json\n{\"seo_title\": \" Keten Gömlek \", \"seo_description\": \"Rahat düşüş.\"}\n```";
        let copy = parse_copy(fenced).unwrap();
        assert_eq!(copy.seo_title, "Keten Gömlek");
        assert_eq!(copy.seo_description, "Rahat düşüş.");
    }

    #[test]
    fn rejects_prose_and_empty_titles() {
        assert!(matches!(parse_copy("Here you go!"), Err(CopyError::Parse(_))));
        assert!(matches!(
            parse_copy(r#"{"seo_title": "  ", "seo_description": "x"}"#),
            Err(CopyError::EmptyTitle)
        ));
    }

    #[test]
    fn prompt_carries_raw_title() {
        assert!(copy_prompt(" ELB-2291 leopar ").ends_with("HAM ÜRÜN ADI: ELB-2291 leopar"));
    }

    #[tokio::test]
    async fn generate_copy_uses_vision_path() {
        let upstream = ScriptedUpstream::new(|_| {
            GatewayResponse::json(
                200,
                &json!({"choices": [{"message": {"content":
                    "```\n{\"seo_title\": \"Saten Gömlek\", \"seo_description\": \"Akşam için.\"}\n```"
                }}]}),
            )
        });
        let client = VisionClient::new(upstream.clone());

        let copy = generate_copy(&client, "gpt-4o", 500, "https://x/1.jpg", "GML-1")
            .await
            .expect("copy");

        assert_eq!(copy.seo_title, "Saten Gömlek");
        let calls = upstream.calls();
        let payload = calls[0].payload.as_ref().expect("payload");
        assert_eq!(payload["model"], "gpt-4o");
        assert_eq!(payload["messages"][0]["content"][1]["image_url"]["url"], "https://x/1.jpg");
    }

    #[tokio::test]
    async fn upstream_failure_is_llm_error() {
        let upstream = ScriptedUpstream::new(|_| GatewayResponse::error(401, "bad key"));
        let client = VisionClient::new(upstream);
        let err = generate_copy(&client, "gpt-4o", 500, "https://x/1.jpg", "GML-1")
            .await
            .expect_err("llm");
        assert!(matches!(err, CopyError::Llm(LlmError::Status { status: 401, .. })));
    }
}
