//! Integration tests for the rule tables shipped with the fixer
//!
//! These tests verify:
//! - Both embedded tables load through the public registry
//! - Hash chains in the zzz table resolve to the newest hash in one run
//! - Missing sibling sections are added from the zzz table
//! - hsr position overrides are converted with the embedded trios

use modfix::games::GameRegistry;
use modfix::models::FixOptions;
use modfix::services::{FixPipeline, StdFileSystem};

fn fix(game: &str, input: &str) -> modfix::services::FixOutput {
    let registry = GameRegistry::builtin().unwrap();
    let table = registry.resolve(game).unwrap();
    FixPipeline::new(table, &StdFileSystem, FixOptions::default()).run(input, None)
}

#[test]
fn test_builtin_registry_loads_both_games() {
    let registry = GameRegistry::builtin().unwrap();

    let hsr = registry.resolve("hsr").unwrap();
    assert!(hsr.trio_by_position("468acfca").is_some());

    let zzz = registry.resolve("ZZZ").unwrap();
    assert!(zzz.actions_for("39538886").is_some());
}

#[test]
fn test_zzz_texcoord_chain_reaches_newest_hash() {
    let input = "[TextureOverrideJaneHairTexcoord]\nhash = c8ad344e\nvb1 = ResourceJaneHairTexcoord\n";
    let output = fix("zzz", input);

    assert!(output.changed);
    assert_eq!(
        output.text,
        "[TextureOverrideJaneHairTexcoord]\n\
         hash = acec29f8\n\
         ;hash = 257a90d6\n\
         ;hash = c8ad344e\n\
         vb1 = ResourceJaneHairTexcoord\n\
         \n"
    );

    let steps: Vec<(&str, &str)> = output
        .report
        .rules
        .upgrades
        .iter()
        .map(|u| (u.from.as_str(), u.to.as_str()))
        .collect();
    assert_eq!(steps, vec![("c8ad344e", "257a90d6"), ("257a90d6", "acec29f8")]);
    // The texcoord buffer stride change is reported, not applied
    assert_eq!(
        output.report.rules.unsupported,
        vec!["257a90d6:shrink_texcoord_color".to_string()]
    );
}

#[test]
fn test_zzz_anby_hair_texcoord_upgrade() {
    let output = fix("zzz", "[TextureOverrideAnbyHairTexcoord]\nhash = 39538886\n");

    assert!(output.text.contains("hash = 496a781d\n;hash = 39538886\n"));
    assert_eq!(output.report.rules.upgrades.len(), 1);
}

#[test]
fn test_zzz_adds_missing_index_buffer_and_resolution() {
    let input = "[TextureOverrideAnbyHairA.Diffuse.2048]\nhash = 6ea0023c\nthis = ResourceAnbyHairADiffuse\n";
    let output = fix("zzz", input);

    assert!(output.changed);
    assert!(output.text.contains(
        "[TextureOverrideAnby.Hair.IB]\nhash = 5c0240db\nrun = CommandListSkinTexture\nmatch_priority = 0\n"
    ));
    assert!(output.text.contains(
        "[TextureOverrideAnby.HairA.Diffuse.1024]\nhash = 7c7f96d2\nthis = ResourceAnbyHairADiffuse\n"
    ));
    assert_eq!(output.report.rules.added, vec!["5c0240db".to_string()]);
    assert_eq!(output.report.rules.multiplied, vec!["7c7f96d2".to_string()]);

    let again = fix("zzz", &output.text);
    assert!(!again.changed);
    assert_eq!(again.text, output.text);
}

#[test]
fn test_hsr_position_override_uses_embedded_trio() {
    let input = "[TextureOverrideAnaxaHairPosition]\n\
                 hash = 468acfca\n\
                 vb0 = ResourceAnaxaHairPosition\n\
                 vb2 = ResourceAnaxaHairBlend\n\
                 draw = 3000, 0\n";
    let output = fix("hsr", input);

    assert_eq!(
        output.text,
        "[TextureOverrideAnaxaHairBlend]\n\
         hash = 1db60089\n\
         handling = skip\n\
         vb2 = ResourceAnaxaHairBlend\n\
         if DRAW_TYPE == 1\n\
         \tvb0 = ResourceAnaxaHairPosition\n\
         \tdraw = 3000, 0\n\
         endif\n\
         \n"
    );
    assert_eq!(output.report.pos_to_blend.converted.len(), 1);

    let again = fix("hsr", &output.text);
    assert!(!again.changed);
}
