use tracing::warn;

use crate::audio::{pcm, wav, WavSpec};
use crate::protocol::TurnResponse;

/// How the upstream stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The model signalled the end of its turn
    TurnComplete,
    /// The stream closed first; whatever arrived is the result
    Closed,
}

/// Collects reply fragments in arrival order
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    pcm: Vec<u8>,
    transcript: String,
    chunk_count: usize,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one base64 PCM chunk; undecodable chunks are skipped
    pub fn push_audio_chunk(&mut self, encoded: &str) {
        match pcm::from_base64(encoded) {
            Ok(bytes) => {
                self.pcm.extend_from_slice(&bytes);
                self.chunk_count += 1;
            }
            Err(e) => warn!("Skipping undecodable audio chunk: {}", e),
        }
    }

    pub fn push_text(&mut self, text: &str) {
        self.transcript.push_str(text);
    }

    pub fn has_audio(&self) -> bool {
        !self.pcm.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn finish(self, completion: Completion) -> TurnOutcome {
        let transcript = self.transcript.trim();
        TurnOutcome {
            transcript: (!transcript.is_empty()).then(|| transcript.to_string()),
            pcm: self.pcm,
            chunk_count: self.chunk_count,
            completion,
        }
    }
}

/// Everything one turn produced
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Reply audio, chunks joined in arrival order
    pub pcm: Vec<u8>,
    pub transcript: Option<String>,
    pub chunk_count: usize,
    pub completion: Completion,
}

impl TurnOutcome {
    /// Frame the audio as WAV, or mark the turn as a fallback when there is none
    pub fn into_result(self, spec: WavSpec) -> VoiceTurnResult {
        if self.pcm.is_empty() {
            return VoiceTurnResult {
                combined_audio: None,
                transcript_text: self.transcript,
                fallback: true,
            };
        }

        VoiceTurnResult {
            combined_audio: Some(wav::encode(&self.pcm, spec)),
            transcript_text: self.transcript,
            fallback: false,
        }
    }
}

/// Final product of a turn, returned as the HTTP response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceTurnResult {
    /// WAV container
    pub combined_audio: Option<Vec<u8>>,
    pub transcript_text: Option<String>,
    pub fallback: bool,
}

impl VoiceTurnResult {
    /// Wire body; `apology` stands in when a fallback has no transcript
    pub fn into_response(self, apology: &str) -> TurnResponse {
        match self.combined_audio {
            Some(audio) if !self.fallback => TurnResponse::audio(&audio, self.transcript_text),
            _ => TurnResponse::fallback(
                self.transcript_text
                    .unwrap_or_else(|| apology.to_string()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_joined_in_arrival_order() {
        let mut acc = TurnAccumulator::new();
        acc.push_audio_chunk(&pcm::to_base64(&[3, 3]));
        acc.push_audio_chunk(&pcm::to_base64(&[1]));
        acc.push_audio_chunk(&pcm::to_base64(&[2, 2, 2]));

        let outcome = acc.finish(Completion::TurnComplete);
        assert_eq!(outcome.pcm, vec![3, 3, 1, 2, 2, 2]);
        assert_eq!(outcome.chunk_count, 3);
    }

    #[test]
    fn test_bad_chunk_skipped() {
        let mut acc = TurnAccumulator::new();
        acc.push_audio_chunk("!!!");
        acc.push_audio_chunk(&pcm::to_base64(&[5, 6]));
        assert_eq!(acc.chunk_count(), 1);
        assert_eq!(acc.finish(Completion::Closed).pcm, vec![5, 6]);
    }

    #[test]
    fn test_blank_transcript_is_none() {
        let mut acc = TurnAccumulator::new();
        acc.push_text("  ");
        assert_eq!(acc.finish(Completion::Closed).transcript, None);
    }

    #[test]
    fn test_no_audio_is_fallback() {
        let mut acc = TurnAccumulator::new();
        acc.push_text("Solo texto");
        let result = acc.finish(Completion::TurnComplete).into_result(WavSpec::default());

        assert!(result.fallback);
        assert!(result.combined_audio.is_none());

        let response = result.into_response("perdón");
        assert!(response.fallback);
        assert!(response.audio_base64.is_none());
        assert_eq!(response.text.as_deref(), Some("Solo texto"));
    }

    #[test]
    fn test_empty_fallback_uses_apology() {
        let result = TurnAccumulator::new()
            .finish(Completion::Closed)
            .into_result(WavSpec::default());
        assert_eq!(result.into_response("perdón").text.as_deref(), Some("perdón"));
    }

    #[test]
    fn test_audio_is_wav_framed() {
        let mut acc = TurnAccumulator::new();
        acc.push_audio_chunk(&pcm::to_base64(&[0u8; 10]));
        let result = acc.finish(Completion::TurnComplete).into_result(WavSpec::default());

        let audio = result.combined_audio.unwrap();
        assert_eq!(audio.len(), wav::WAV_HEADER_LEN + 10);
        assert_eq!(&audio[0..4], b"RIFF");
    }
}
