//! Transcript format resolution
//!
//! Normalizes heterogeneous transcription outputs onto the ordered
//! format ladder and selects which representation becomes the Event's
//! authoritative transcript. `raw` is always derivable locally by
//! concatenating a finer format, so no model is required to supply it.

use crate::models::transcript::{TranscriptFormat, TranscriptPayload, TranscriptUnit};

/// A selected canonical payload plus the raw rendition that downstream
/// consumers can always rely on existing
#[derive(Debug, Clone)]
pub struct ResolvedTranscript {
    /// Highest-ranked payload the model produced
    pub canonical: TranscriptPayload,
    /// Supplied raw payload, or one synthesized from the canonical
    pub raw: TranscriptPayload,
}

/// Select the authoritative representation from a model's outputs
///
/// Preference order: timestamped-sentences, then timestamped-words,
/// then raw. Returns `None` only when the model produced nothing.
pub fn resolve(payloads: &[TranscriptPayload]) -> Option<ResolvedTranscript> {
    let canonical = payloads.iter().max_by_key(|p| p.format)?.clone();

    let raw = payloads
        .iter()
        .find(|p| p.format == TranscriptFormat::Raw)
        .cloned()
        .unwrap_or_else(|| synthesize_raw(&canonical));

    Some(ResolvedTranscript { canonical, raw })
}

/// Derive a raw payload from a finer-grained one by concatenation:
/// a single unit spanning the first start to the last end
pub fn synthesize_raw(payload: &TranscriptPayload) -> TranscriptPayload {
    let data = if payload.data.is_empty() {
        Vec::new()
    } else {
        vec![TranscriptUnit {
            start_time: payload.data.first().map(|u| u.start_time).unwrap_or(0.0),
            text: payload.full_text(),
            end_time: payload.data.last().map(|u| u.end_time).unwrap_or(0.0),
        }]
    };

    TranscriptPayload {
        format: TranscriptFormat::Raw,
        annotations: payload.annotations.clone(),
        confidence: payload.confidence,
        data,
    }
}

/// Format monotonicity: the stored transcript is replaced only by a
/// strictly higher-ranked representation
pub fn should_replace(stored: TranscriptFormat, candidate: TranscriptFormat) -> bool {
    candidate > stored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(start: f64, text: &str, end: f64) -> TranscriptUnit {
        TranscriptUnit {
            start_time: start,
            text: text.to_string(),
            end_time: end,
        }
    }

    fn payload(format: TranscriptFormat, units: Vec<TranscriptUnit>) -> TranscriptPayload {
        TranscriptPayload::new(format, 0.9, units)
    }

    #[test]
    fn test_prefers_sentences_over_words_over_raw() {
        let payloads = vec![
            payload(TranscriptFormat::Raw, vec![unit(0.0, "a b", 2.0)]),
            payload(
                TranscriptFormat::TimestampedWords,
                vec![unit(0.0, "a", 1.0), unit(1.0, "b", 2.0)],
            ),
            payload(
                TranscriptFormat::TimestampedSentences,
                vec![unit(0.0, "a b.", 2.0)],
            ),
        ];

        let resolved = resolve(&payloads).unwrap();
        assert_eq!(
            resolved.canonical.format,
            TranscriptFormat::TimestampedSentences
        );
        assert_eq!(resolved.raw.format, TranscriptFormat::Raw);
        assert_eq!(resolved.raw.data[0].text, "a b");
    }

    #[test]
    fn test_synthesizes_raw_when_not_supplied() {
        let payloads = vec![payload(
            TranscriptFormat::TimestampedSentences,
            vec![
                unit(0.0, "Meeting called to order.", 3.0),
                unit(3.0, "Roll call.", 5.5),
            ],
        )];

        let resolved = resolve(&payloads).unwrap();
        assert_eq!(resolved.raw.format, TranscriptFormat::Raw);
        assert_eq!(resolved.raw.data.len(), 1);
        assert_eq!(resolved.raw.data[0].text, "Meeting called to order. Roll call.");
        assert_eq!(resolved.raw.data[0].start_time, 0.0);
        assert_eq!(resolved.raw.data[0].end_time, 5.5);
    }

    #[test]
    fn test_empty_outputs_resolve_to_none() {
        assert!(resolve(&[]).is_none());
    }

    #[test]
    fn test_replacement_requires_strict_rank_increase() {
        use TranscriptFormat::*;
        assert!(should_replace(Raw, TimestampedWords));
        assert!(should_replace(TimestampedWords, TimestampedSentences));
        assert!(!should_replace(TimestampedSentences, TimestampedSentences));
        assert!(!should_replace(TimestampedSentences, Raw));
        assert!(!should_replace(TimestampedWords, TimestampedWords));
    }

    #[test]
    fn test_synthesized_raw_keeps_confidence() {
        let source = payload(
            TranscriptFormat::TimestampedWords,
            vec![unit(0.0, "order", 1.0)],
        );
        let raw = synthesize_raw(&source);
        assert_eq!(raw.confidence, source.confidence);
    }
}
