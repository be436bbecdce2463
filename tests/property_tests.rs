//! Property-based tests for plan generation
//!
//! These tests verify:
//! - Rendering is deterministic and re-parses to the same tree (JSON and YAML)
//! - Chosen heredoc markers never occur as a payload line
//! - Architecture filtering removes exactly the foreign boot-loader packages
//! - Storage validation accepts exactly the dependency-ordered node lists

use autoinstall::embed::has_marker_line;
use autoinstall::engine::storage::{NodeKind, StorageNode, validate_nodes};
use autoinstall::{
    Arch, CollisionPolicy, EmbeddedFile, Embedder, LayoutVariant, Mapping, RenderStyle,
    StagingPolicy, Value, calculate_storage_layout, render, render_document, resolve_packages,
};
use proptest::prelude::*;
use std::collections::HashSet;

// =============================================================================
// Document strategies
// =============================================================================

/// Strings mixing plain words, YAML-significant characters, newlines and
/// arbitrary Unicode, including noncharacters such as U+FFFE.
fn string_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ._/=-]{0,16}",
        "[ -~\n\t]{0,24}",
        any::<String>(),
        Just("# \u{fffe}\u{ffff}\u{85}".to_string()),
        Just("=".to_string()),
        Just("<<".to_string()),
        Just("yes".to_string()),
        Just("null".to_string()),
        Just("0x1F".to_string()),
        Just("2024-01-31".to_string()),
        Just("- item".to_string()),
        Just("key: value # comment".to_string()),
        Just("multi\nline\n".to_string()),
        Just("caf\u{e9} \u{2028}".to_string()),
    ]
}

fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        string_strategy().prop_map(Value::Str),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::List),
            prop::collection::vec(("[a-z][a-z0-9_-]{0,8}", inner), 0..6)
                .prop_map(|entries| Value::Map(entries.into_iter().collect::<Mapping>())),
        ]
    })
}

/// Expected re-parse result for a tree.
fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.to_string(), to_json(v))).collect(),
        ),
    }
}

proptest! {
    /// Rendering the same tree twice yields byte-identical output
    #[test]
    fn render_is_deterministic(value in value_strategy()) {
        for style in [RenderStyle::Compact, RenderStyle::Indented] {
            let tree = value.clone();
            prop_assert_eq!(render_document(&value, style), render_document(&tree, style));
        }
    }

    /// Compact output re-parses as JSON to the same tree
    #[test]
    fn compact_roundtrips_through_json(value in value_strategy()) {
        let text = render(&value, RenderStyle::Compact);
        prop_assert!(!text.contains('\n'), "compact output must be one line: {:?}", text);
        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| TestCaseError::fail(format!("{e}: {text}")))?;
        prop_assert_eq!(parsed, to_json(&value));
    }

    /// Indented output re-parses as YAML to the same tree
    #[test]
    fn indented_roundtrips_through_yaml(value in value_strategy()) {
        let text = render(&value, RenderStyle::Indented);
        let parsed: serde_json::Value = serde_yaml::from_str(&text)
            .map_err(|e| TestCaseError::fail(format!("{e}:\n{text}")))?;
        prop_assert_eq!(parsed, to_json(&value));
    }

    /// Any string, quoted or plain, survives as a mapping value
    #[test]
    fn strings_roundtrip_in_both_styles(s in string_strategy()) {
        let tree = Value::Map(Mapping::new().with("k", s.clone()));
        let json: serde_json::Value =
            serde_json::from_str(&render(&tree, RenderStyle::Compact)).unwrap();
        prop_assert_eq!(json["k"].as_str(), Some(s.as_str()));
        let yaml: serde_json::Value =
            serde_yaml::from_str(&render(&tree, RenderStyle::Indented)).unwrap();
        prop_assert_eq!(yaml["k"].as_str(), Some(s.as_str()));
    }
}

// =============================================================================
// Heredoc marker properties
// =============================================================================

fn payload_strategy() -> impl Strategy<Value = String> {
    let line = prop_oneof![
        Just("EOFX".to_string()),
        Just("EOFX_1".to_string()),
        Just("EOFX_2".to_string()),
        Just("EOFX\r".to_string()),
        Just(" EOFX".to_string()),
        "[a-z $'\"]{0,12}",
    ];
    prop::collection::vec(line, 0..24).prop_map(|lines| lines.join("\n"))
}

proptest! {
    /// The chosen marker never appears as a payload line, and the heredoc
    /// body up to the first marker line is the complete payload
    #[test]
    fn embedded_marker_is_collision_free(payload in payload_strategy()) {
        let embedder = Embedder::new("/target", true, CollisionPolicy::Rotate);
        let file = EmbeddedFile::text("/tmp/payload.sh", &payload, "EOFX");
        let embedding = embedder.embed(&file).unwrap();

        prop_assert!(!has_marker_line(&payload, &embedding.marker));

        let command = &embedding.materialize[0];
        let body_start = command.find('\n').unwrap() + 1;
        let body: Vec<&str> = command[body_start..]
            .split('\n')
            .take_while(|line| *line != embedding.marker)
            .collect();
        let expected: Vec<&str> = if payload.is_empty() {
            Vec::new()
        } else {
            payload.strip_suffix('\n').unwrap_or(&payload).split('\n').collect()
        };
        prop_assert_eq!(body, expected);
    }

    /// Under the reject policy an embedding either keeps the preferred
    /// marker or fails
    #[test]
    fn reject_policy_never_renames(payload in payload_strategy()) {
        let embedder = Embedder::new("/target", true, CollisionPolicy::Reject);
        let file = EmbeddedFile::text("/tmp/payload.sh", &payload, "EOFX");
        match embedder.embed(&file) {
            Ok(embedding) => prop_assert_eq!(embedding.marker, "EOFX"),
            Err(_) => prop_assert!(has_marker_line(&payload, "EOFX")),
        }
    }
}

// =============================================================================
// Architecture filter properties
// =============================================================================

fn package_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("grub-efi-amd64".to_string()),
        Just("grub-efi-arm64".to_string()),
        Just("grub-pc".to_string()),
        "[a-z][a-z0-9-]{0,10}",
    ]
}

proptest! {
    /// Resolution drops exactly the foreign packages and keeps order
    #[test]
    fn arch_filter_preserves_order(
        names in prop::collection::vec(package_name(), 0..20),
        arm in any::<bool>(),
    ) {
        let arch = if arm { Arch::Arm64 } else { Arch::Amd64 };
        let excluded: &[&str] = if arm {
            &["grub-efi-amd64", "grub-pc"]
        } else {
            &["grub-efi-arm64"]
        };
        let content = names.join("\n");

        let expected: Vec<String> = names
            .iter()
            .filter(|n| !excluded.contains(&n.as_str()))
            .cloned()
            .collect();
        prop_assert_eq!(resolve_packages(&content, arch), expected);
    }
}

// =============================================================================
// Storage layout properties
// =============================================================================

fn variants() -> Vec<(LayoutVariant, StagingPolicy, Arch)> {
    let mut all = Vec::new();
    for variant in [LayoutVariant::Simple, LayoutVariant::Matched] {
        for staging in [StagingPolicy::Filesystem, StagingPolicy::SwapTyped] {
            for arch in [Arch::Amd64, Arch::Arm64] {
                all.push((variant, staging, arch));
            }
        }
    }
    all
}

/// Independent statement of the ordering rule.
fn dependency_ordered(nodes: &[StorageNode]) -> bool {
    let mut seen: Vec<(&str, NodeKind)> = Vec::new();
    let mut last = NodeKind::Disk;
    for node in nodes {
        if node.kind() < last {
            return false;
        }
        last = node.kind();
        if let Some((target, kind)) = node.reference() {
            if !seen.contains(&(target, kind)) {
                return false;
            }
        }
        seen.push((node.id(), node.kind()));
    }
    true
}

proptest! {
    /// Every generated layout references only earlier nodes
    #[test]
    fn generated_layouts_are_topologically_valid(index in 0usize..8) {
        let (variant, staging, arch) = variants()[index];
        let layout = calculate_storage_layout(variant, staging, arch).unwrap();
        prop_assert!(dependency_ordered(layout.nodes()));

        let ids: HashSet<&str> = layout.nodes().iter().map(StorageNode::id).collect();
        prop_assert_eq!(ids.len(), layout.nodes().len());
    }

    /// Validation accepts a shuffled node list exactly when it is still
    /// dependency-ordered
    #[test]
    fn validation_matches_ordering_rule(
        (index, order) in (0usize..8).prop_flat_map(|i| {
            let (variant, staging, arch) = variants()[i];
            let len = calculate_storage_layout(variant, staging, arch).unwrap().nodes().len();
            (Just(i), Just((0..len).collect::<Vec<_>>()).prop_shuffle())
        })
    ) {
        let (variant, staging, arch) = variants()[index];
        let layout = calculate_storage_layout(variant, staging, arch).unwrap();
        let shuffled: Vec<StorageNode> =
            order.iter().map(|&i| layout.nodes()[i].clone()).collect();

        prop_assert_eq!(validate_nodes(&shuffled).is_ok(), dependency_ordered(&shuffled));
    }
}
