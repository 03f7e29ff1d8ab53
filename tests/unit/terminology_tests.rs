/*!
 * Tests for terminology substitution
 */

use std::collections::HashMap;

use folio::terminology::{Terminology, TerminologyEntry};

fn dictionary(pairs: &[(&str, &str)]) -> Terminology {
    let map: HashMap<String, String> = pairs.iter().map(|(s, t)| (s.to_string(), t.to_string())).collect();
    Terminology::from_map(&map)
}

/// Test the documented Cyrillic example
#[test]
fn test_apply_withCyrillicTarget_shouldReplaceInsideSentence() {
    let terminology = dictionary(&[("Neural Network", "Нейронная сеть")]);
    assert_eq!(terminology.apply("a Neural Network model"), "a Нейронная сеть model");
}

/// Test that case is restored from the occurrence
#[test]
fn test_apply_withDifferentCasings_shouldFollowOccurrence() {
    let terminology = dictionary(&[("machine learning", "apprentissage automatique")]);
    assert_eq!(
        terminology.apply("MACHINE LEARNING and Machine learning and machine learning"),
        "APPRENTISSAGE AUTOMATIQUE and Apprentissage automatique and apprentissage automatique"
    );
}

/// Test that substitution is idempotent over many inputs
#[test]
fn test_apply_shouldBeIdempotentForEveryInput() {
    let terminology = Terminology::new(vec![
        TerminologyEntry::new("GPU", "processeur graphique"),
        TerminologyEntry::new("graphics processor", "processeur graphique"),
        TerminologyEntry::new("cloud", "nuage"),
        TerminologyEntry::new("data", "données").verbatim(),
    ]);
    let inputs = [
        "The GPU renders frames",
        "A graphics processor in the cloud",
        "cloud data, CLOUD DATA, Cloud Data",
        "processeur graphique already translated",
        "",
        "nothing to do here",
    ];
    for input in inputs {
        let once = terminology.apply(input);
        assert_eq!(terminology.apply(&once), once, "not idempotent for {:?}", input);
    }
}

/// Test that partial words are left alone
#[test]
fn test_apply_withTermInsideWord_shouldNotReplace() {
    let terminology = dictionary(&[("cat", "chat")]);
    assert_eq!(terminology.apply("concatenate the cat"), "concatenate the chat");
}

/// Test dictionary sizes
#[test]
fn test_from_map_shouldKeepEveryDistinctSource() {
    let terminology = dictionary(&[("alpha", "α"), ("beta", "β")]);
    assert_eq!(terminology.len(), 2);
    assert!(!terminology.is_empty());
    assert!(Terminology::default().is_empty());
}
