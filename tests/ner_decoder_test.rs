//! Tests for token-classification decoding.
//!
//! Drives `NerDecoder` with hand-built logits over real encodings and checks
//! the span, offset and confidence properties of its output.

use huginn::ner::{DEFAULT_SPECIAL_TOKENS, NerDecoder, softmax};
use huginn::tokenizer::{TokenizerProvider, WhitespaceTokenizer};
use huginn::{LabelSet, PredictionResult, TensorDescriptor, TokenEncoding};

const LABELS: usize = 9;
// Default label indices
const O: usize = 0;
const VESSEL: usize = 1;
const PORT: usize = 3;
const IMO: usize = 5;
const FLAG: usize = 6;

// ============================================================================
// Helpers
// ============================================================================

/// Logits where `hot[i]` scores `margin` above every other label.
fn logits_with_margin(hot: &[usize], num_labels: usize, margin: f32) -> TensorDescriptor {
    let mut data = vec![0.0; hot.len() * num_labels];
    for (i, &h) in hot.iter().enumerate() {
        data[i * num_labels + h] = margin;
    }
    TensorDescriptor::fp32("logits", vec![1, hot.len(), num_labels], data).unwrap()
}

fn logits(hot: &[usize]) -> TensorDescriptor {
    logits_with_margin(hot, LABELS, 6.0)
}

fn decoder() -> NerDecoder {
    NerDecoder::new(LabelSet::default(), "bert-base-uncased")
}

fn decode(text: &str, hot: &[usize]) -> PredictionResult {
    let encoding = WhitespaceTokenizer.encode(text).unwrap();
    assert_eq!(encoding.len(), hot.len(), "test logits must cover every token");
    decoder().decode(&logits(hot), &encoding, text, "huginn-1")
}

fn assert_invariants(result: &PredictionResult, text: &str) {
    for entity in &result.entities {
        assert!(entity.start_offset < entity.end_offset, "empty span {entity:?}");
        assert!(entity.end_offset <= text.len(), "span past text {entity:?}");
        assert_eq!(&text[entity.start_offset..entity.end_offset], entity.text);
        assert!((0.0..=1.0).contains(&entity.confidence));
    }
    for pair in result.entities.windows(2) {
        assert!(pair[0].start_offset <= pair[1].start_offset, "entities out of order");
    }
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn vessel_record_decodes_to_three_entities() {
    let text = "VESSEL: Arctic Explorer IMO: 1234567 FLAG: Norway";
    // [CLS] vessel: arctic explorer imo: 1234567 flag: norway [SEP]
    let result = decode(text, &[O, O, VESSEL, VESSEL, O, IMO, O, FLAG, O]);

    assert_invariants(&result, text);
    let found: Vec<(&str, &str)> = result
        .entities
        .iter()
        .map(|e| (e.label.as_str(), e.text.as_str()))
        .collect();
    assert_eq!(
        found,
        vec![("VESSEL", "Arctic Explorer"), ("IMO", "1234567"), ("FLAG", "Norway")]
    );
    assert_eq!(result.entities[0].contributing_tokens, vec!["arctic", "explorer"]);
    assert_eq!(result.model_id, "bert-base-uncased");
    assert_eq!(result.run_id, "huginn-1");
}

#[test]
fn vessel_and_flag_decode_to_two_entities() {
    let text = "VESSEL: Arctic Explorer IMO: 1234567 FLAG: Norway";
    let result = decode(text, &[O, O, VESSEL, VESSEL, O, O, O, FLAG, O]);

    assert_invariants(&result, text);
    let found: Vec<(&str, &str)> = result
        .entities
        .iter()
        .map(|e| (e.label.as_str(), e.text.as_str()))
        .collect();
    assert_eq!(found, vec![("VESSEL", "Arctic Explorer"), ("FLAG", "Norway")]);
    for entity in &result.entities {
        assert!(entity.confidence > 0.0 && entity.confidence <= 1.0);
    }
}

#[test]
fn aggregate_score_is_mean_entity_confidence() {
    let text = "VESSEL: Arctic Explorer IMO: 1234567 FLAG: Norway";
    let result = decode(text, &[O, O, VESSEL, VESSEL, O, IMO, O, FLAG, O]);
    let mean = result.entities.iter().map(|e| e.confidence).sum::<f32>() / 3.0;
    assert!((result.aggregate_score - mean).abs() < 1e-6);
}

#[test]
fn all_outside_labels_yield_no_entities() {
    let text = "nothing to see here";
    let result = decode(text, &[O; 6]);
    assert!(result.is_empty());
    assert_eq!(result.aggregate_score, 0.0);
}

// ============================================================================
// Merge correctness
// ============================================================================

#[test]
fn adjacent_same_label_tokens_merge_with_mean_confidence() {
    let text = "Arctic Explorer";
    let encoding = WhitespaceTokenizer.encode(text).unwrap();
    // Different margins give different per-token confidences.
    let mut data = vec![0.0; 4 * LABELS];
    data[LABELS + VESSEL] = 6.0;
    data[2 * LABELS + VESSEL] = 2.0;
    let tensor = TensorDescriptor::fp32("logits", vec![1, 4, LABELS], data).unwrap();

    let result = decoder().decode(&tensor, &encoding, text, "r");
    assert_eq!(result.entities.len(), 1);

    let p1 = softmax(&[6.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])[0];
    let p2 = softmax(&[2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])[0];
    assert!((result.entities[0].confidence - (p1 + p2) / 2.0).abs() < 1e-5);
}

#[test]
fn label_change_starts_a_new_span() {
    let text = "Oslo Bergen";
    let result = decode(text, &[O, PORT, VESSEL, O]);
    assert_invariants(&result, text);
    assert_eq!(result.entities.len(), 2);
    assert_eq!(result.entities[0].label, "PORT");
    assert_eq!(result.entities[1].label, "VESSEL");
}

#[test]
fn outside_token_splits_same_label_runs() {
    let text = "Oslo and Bergen";
    let result = decode(text, &[O, PORT, O, PORT, O]);
    assert_eq!(result.entities.len(), 2);
    assert_eq!(result.entities[0].text, "Oslo");
    assert_eq!(result.entities[1].text, "Bergen");
}

#[test]
fn special_tokens_never_join_spans() {
    // Even when the model labels [CLS]/[SEP] as an entity.
    let text = "Oslo";
    let result = decode(text, &[PORT, PORT, PORT]);
    assert_eq!(result.entities.len(), 1);
    assert_eq!(result.entities[0].contributing_tokens, vec!["oslo"]);
    assert!(DEFAULT_SPECIAL_TOKENS.contains(&"[CLS]"));
}

#[test]
fn multibyte_text_slices_on_char_boundaries() {
    let text = "Port Tromsø Ålesund";
    let result = decode(text, &[O, O, PORT, PORT, O]);
    assert_invariants(&result, text);
    assert_eq!(result.entities[0].text, "Tromsø Ålesund");
}

// ============================================================================
// Degradation
// ============================================================================

#[test]
fn sequence_length_mismatch_degrades() {
    let text = "Oslo Bergen";
    let encoding = WhitespaceTokenizer.encode(text).unwrap();
    // 4 tokens encoded, logits only cover 2
    let result = decoder().decode(&logits(&[PORT, PORT]), &encoding, text, "r");
    assert!(result.is_empty());
    assert_eq!(result.aggregate_score, 0.0);
    assert_eq!(result.run_id, "r");
}

#[test]
fn two_label_tensor_against_nine_labels_degrades() {
    let text = "Oslo";
    let encoding =
        TokenEncoding::new(vec![1], vec!["oslo".into()], vec![(0, 4)], vec![1]).unwrap();
    let tensor = TensorDescriptor::fp32("logits", vec![1, 1, 2], vec![0.1, 0.9]).unwrap();
    let result = decoder().decode(&tensor, &encoding, text, "r");
    assert!(result.is_empty());
    assert_eq!(result.aggregate_score, 0.0);
}

#[test]
fn fewer_model_labels_than_configured_degrades() {
    // Model emits 4 labels against a 9-label configuration.
    let text = "Oslo";
    let encoding = WhitespaceTokenizer.encode(text).unwrap();
    let result = decoder().decode(&logits_with_margin(&[O, PORT, O], 4, 6.0), &encoding, text, "r");
    assert!(result.is_empty());
    assert_eq!(result.aggregate_score, 0.0);
}

#[test]
fn extra_model_labels_still_decode() {
    let labels = LabelSet::new(["O", "VESSEL", "HS_CODE", "PORT"]).unwrap();
    let decoder = NerDecoder::new(labels, "m");
    let text = "Oslo";
    let encoding = WhitespaceTokenizer.encode(text).unwrap();
    let result = decoder.decode(&logits_with_margin(&[O, PORT, O], 6, 6.0), &encoding, text, "r");
    assert_eq!(result.entities.len(), 1);
    assert_eq!(result.entities[0].label, "PORT");
}

#[test]
fn out_of_range_label_is_non_entity() {
    let labels = LabelSet::new(["O", "PORT"]).unwrap();
    let decoder = NerDecoder::new(labels, "m");
    let text = "Oslo Bergen";
    let encoding = WhitespaceTokenizer.encode(text).unwrap();
    // Index 2 has no configured label
    let result = decoder.decode(&logits_with_margin(&[0, 1, 2, 0], 3, 6.0), &encoding, text, "r");
    assert_eq!(result.entities.len(), 1);
    assert_eq!(result.entities[0].text, "Oslo");
}

// ============================================================================
// Boundary repair
// ============================================================================

#[test]
fn offsets_past_the_text_are_clamped() {
    let text = "Oslo";
    let encoding = TokenEncoding::new(
        vec![1, 2],
        vec!["oslo".into(), "harbour".into()],
        vec![(0, 4), (5, 12)],
        vec![1, 1],
    )
    .unwrap();
    let result = decoder().decode(&logits(&[PORT, PORT]), &encoding, text, "r");
    assert_invariants(&result, text);
    assert_eq!(result.entities[0].text, "Oslo");
}

#[test]
fn empty_text_drops_every_span() {
    let encoding =
        TokenEncoding::new(vec![1], vec!["ghost".into()], vec![(0, 3)], vec![1]).unwrap();
    let result = decoder().decode(&logits(&[PORT]), &encoding, "", "r");
    assert!(result.is_empty());
}

#[test]
fn non_finite_rows_fall_back_to_non_entity() {
    let text = "Oslo";
    let encoding = WhitespaceTokenizer.encode(text).unwrap();
    let mut data = vec![f32::NEG_INFINITY; 3 * LABELS];
    data[LABELS + PORT] = f32::NAN;
    let tensor = TensorDescriptor::fp32("logits", vec![1, 3, LABELS], data).unwrap();
    let result = decoder().decode(&tensor, &encoding, text, "r");
    assert!(result.is_empty());
}
