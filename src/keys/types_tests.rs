use super::*;

#[test]
fn test_parse_single_stroke() {
    let stroke = KeyStroke::parse("CTRL+A").unwrap();
    assert_eq!(stroke.key, 'A' as u32);
    assert_eq!(stroke.modifiers, ModifierMask::CTRL);
}

#[test]
fn test_parse_is_case_insensitive() {
    let a = KeyStroke::parse("ctrl+shift+k").unwrap();
    let b = KeyStroke::parse("SHIFT+CTRL+K").unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_parse_multi_stroke_sequence() {
    let seq = TriggerSequence::parse("CTRL+5 CTRL+A").unwrap();
    assert_eq!(seq.len(), 2);
    assert_eq!(seq.strokes()[0], KeyStroke::new(ModifierMask::CTRL, '5' as u32));
    assert_eq!(seq.strokes()[1], KeyStroke::new(ModifierMask::CTRL, 'A' as u32));
}

#[test]
fn test_parse_errors() {
    assert_eq!(TriggerSequence::parse("   "), Err(TriggerParseError::Empty));
    assert!(matches!(
        KeyStroke::parse("CTRL+SHIFT"),
        Err(TriggerParseError::MissingKey(_))
    ));
    assert!(matches!(
        KeyStroke::parse("CTRL+A+B"),
        Err(TriggerParseError::UnknownToken(_))
    ));
    assert!(matches!(
        KeyStroke::parse("CTRL+NOPE"),
        Err(TriggerParseError::UnknownKey(_))
    ));
}

#[test]
fn test_parse_named_and_function_keys() {
    assert_eq!(KeyStroke::parse("ESC").unwrap().key, key_codes::ESC);
    assert_eq!(KeyStroke::parse("enter").unwrap().key, key_codes::CR);
    assert_eq!(KeyStroke::parse("F1").unwrap().key, key_codes::F1);
    assert_eq!(KeyStroke::parse("F12").unwrap().key, key_codes::F1 + 11);
    assert!(KeyStroke::parse("F21").is_err());
}

#[test]
fn test_parse_plus_key() {
    let stroke = KeyStroke::parse("CTRL++").unwrap();
    assert_eq!(stroke.key, '+' as u32);
    assert_eq!(stroke.modifiers, ModifierMask::CTRL);
}

#[test]
fn test_m1_depends_on_platform() {
    let mac = KeyStroke::parse_for_platform("M1+S", Platform::MacOS).unwrap();
    let linux = KeyStroke::parse_for_platform("M1+S", Platform::Linux).unwrap();
    assert_eq!(mac.modifiers, ModifierMask::COMMAND);
    assert_eq!(linux.modifiers, ModifierMask::CTRL);
}

#[test]
fn test_format_uses_formal_modifier_order() {
    let stroke = KeyStroke::new(
        ModifierMask::SHIFT | ModifierMask::CTRL | ModifierMask::ALT,
        'x' as u32,
    );
    assert_eq!(stroke.format(), "ALT+CTRL+SHIFT+X");
    assert_eq!(
        TriggerSequence::parse("ctrl+x  arrow_up").unwrap().to_string(),
        "CTRL+X ARROW_UP"
    );
}

#[test]
fn test_display_per_platform() {
    let stroke = KeyStroke::parse("CTRL+SHIFT+K").unwrap();
    assert_eq!(stroke.display_for_platform(Platform::MacOS), "⌃⇧K");
    assert_eq!(stroke.display_for_platform(Platform::Linux), "Ctrl+Shift+K");
}

#[test]
fn test_equality_ignores_character() {
    let a = KeyStroke::new(ModifierMask::SHIFT, '9' as u32).with_character(Some('('));
    let b = KeyStroke::new(ModifierMask::SHIFT, '9' as u32);
    assert_eq!(a, b);

    let mut set = std::collections::HashSet::new();
    set.insert(a);
    assert!(set.contains(&b));
}

#[test]
fn test_strict_prefix() {
    let short = TriggerSequence::parse("CTRL+5").unwrap();
    let long = TriggerSequence::parse("CTRL+5 CTRL+A").unwrap();
    assert!(short.is_strict_prefix_of(&long));
    assert!(!long.is_strict_prefix_of(&short));
    assert!(!long.is_strict_prefix_of(&long));

    let prefixes: Vec<_> = long.strict_prefixes().collect();
    assert_eq!(prefixes, vec![short]);
}

#[test]
fn test_sequence_serde_uses_formal_string() {
    let seq = TriggerSequence::parse("CTRL+5 CTRL+A").unwrap();
    let json = serde_json::to_string(&seq).unwrap();
    assert_eq!(json, "\"CTRL+5 CTRL+A\"");
    let back: TriggerSequence = serde_json::from_str(&json).unwrap();
    assert_eq!(back, seq);
    assert!(serde_json::from_str::<TriggerSequence>("\"\"").is_err());
}

#[test]
fn test_unnamed_key_codes_survive_serde() {
    let media = key_codes::KEYCODE_BIT + 100;
    let seq = TriggerSequence::new(vec![
        KeyStroke::new(ModifierMask::CTRL, 0x01),
        KeyStroke::new(ModifierMask::empty(), media),
    ])
    .unwrap();
    assert_eq!(seq.format(), format!("CTRL+#1 #{}", media));

    let json = serde_json::to_string(&seq).unwrap();
    let back: TriggerSequence = serde_json::from_str(&json).unwrap();
    assert_eq!(back, seq);
    assert_eq!(KeyStroke::parse("ALT+#").unwrap().key, '#' as u32);
    assert!(KeyStroke::parse("#x1").is_err());
}

#[test]
fn test_modifier_only_event_has_no_candidates() {
    let event = KeyEvent::key_down(ModifierMask::CTRL.bits(), ModifierMask::empty(), None);
    assert!(event.is_modifier_only());
    assert!(event.keystrokes().is_empty());
}

#[test]
fn test_event_candidates_include_character_form() {
    let event = KeyEvent::key_down('9' as u32, ModifierMask::SHIFT, Some('('));
    let candidates = event.keystrokes();
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0], KeyStroke::new(ModifierMask::SHIFT, '9' as u32));
    assert_eq!(candidates[1], KeyStroke::new(ModifierMask::empty(), '(' as u32));
}

#[test]
fn test_event_letter_is_normalised() {
    let event = KeyEvent::key_down('a' as u32, ModifierMask::CTRL, None);
    let candidates = event.keystrokes();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0], KeyStroke::parse("CTRL+A").unwrap());
}

#[test]
fn test_event_kind_codes_roundtrip() {
    for kind in [KeyEventKind::KeyDown, KeyEventKind::KeyUp, KeyEventKind::Traverse] {
        assert_eq!(KeyEventKind::from_code(kind.code()), Some(kind));
    }
    assert_eq!(KeyEventKind::from_code(99), None);
}
