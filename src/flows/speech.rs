use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::errors::AppError;
use crate::models::SpeechAudio;
use crate::services::gemini::GenerateRequest;
use crate::services::{GeminiClient, ServiceError};

pub const DEFAULT_VOICE: &str = "Kore";
pub const MAX_SPEECH_CHARS: usize = 5000;

/// Gemini speech output: signed 16-bit little-endian mono PCM.
const PCM_DEFAULT_RATE: u32 = 24_000;
const PCM_CHANNELS: u16 = 1;
const PCM_BITS_PER_SAMPLE: u16 = 16;

/// Sample rate from a MIME type such as `audio/L16;codec=pcm;rate=24000`.
fn pcm_sample_rate(mime_type: &str) -> Option<u32> {
    let mime = mime_type.to_ascii_lowercase();
    if !(mime.starts_with("audio/l16") || mime.starts_with("audio/pcm")) {
        return None;
    }
    Some(
        mime.split(';')
            .filter_map(|p| p.trim().strip_prefix("rate="))
            .find_map(|r| r.parse().ok())
            .unwrap_or(PCM_DEFAULT_RATE),
    )
}

/// Prefix raw PCM with a canonical 44-byte RIFF/WAVE header.
fn wav_from_pcm(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let block_align = PCM_CHANNELS * PCM_BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = pcm.len() as u32;

    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&PCM_CHANNELS.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&PCM_BITS_PER_SAMPLE.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}

/// Read `text` aloud. Raw PCM from the model is returned as a WAV data URI.
pub async fn text_to_speech(
    gemini: &GeminiClient,
    text: &str,
    voice: Option<&str>,
) -> Result<SpeechAudio, AppError> {
    let voice = voice
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_VOICE);

    let response = gemini
        .generate(GenerateRequest::new(text).speech(voice))
        .await?;
    let audio = response.inline_data().ok_or_else(|| {
        ServiceError::EmptyResponse("speech model returned no audio".to_string())
    })?;

    let Some(sample_rate) = pcm_sample_rate(&audio.mime_type) else {
        // Already a container format; hand it through untouched.
        return Ok(SpeechAudio {
            audio_data_uri: format!("data:{};base64,{}", audio.mime_type, audio.data),
            mime_type: audio.mime_type.clone(),
        });
    };

    let pcm = STANDARD
        .decode(&audio.data)
        .map_err(|e| ServiceError::Serde(format!("speech audio is not valid base64: {}", e)))?;
    let wav = wav_from_pcm(&pcm, sample_rate);
    tracing::debug!(voice, bytes = wav.len(), sample_rate, "Speech synthesized");

    Ok(SpeechAudio {
        mime_type: "audio/wav".to_string(),
        audio_data_uri: format!("data:audio/wav;base64,{}", STANDARD.encode(wav)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_sample_rate() {
        assert_eq!(pcm_sample_rate("audio/L16;codec=pcm;rate=24000"), Some(24_000));
        assert_eq!(pcm_sample_rate("audio/L16; rate=16000"), Some(16_000));
        assert_eq!(pcm_sample_rate("audio/pcm"), Some(PCM_DEFAULT_RATE));
        assert_eq!(pcm_sample_rate("audio/mpeg"), None);
    }

    #[test]
    fn test_wav_header() {
        let pcm = [0u8, 1, 2, 3];
        let wav = wav_from_pcm(&pcm, 24_000);

        assert_eq!(wav.len(), 48);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 40);
        assert_eq!(&wav[8..16], b"WAVEfmt ");
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 24_000);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 48_000);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 4);
        assert_eq!(&wav[44..], &pcm);
    }
}
