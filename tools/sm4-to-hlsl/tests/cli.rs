#![cfg(not(target_arch = "wasm32"))]

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const PASSTHROUGH_PS: &str = "\
// Input signature:
//
// Name                 Index   Mask Register SysValue  Format   Used
// -------------------- ----- ------ -------- -------- ------- ------
// COLOR                    0   xyzw        0     NONE   float   xyzw
//
//
// Output signature:
//
// Name                 Index   Mask Register SysValue  Format   Used
// -------------------- ----- ------ -------- -------- ------- ------
// SV_Target                0   xyzw        0   TARGET   float   xyzw
//
ps_4_0
dcl_input_ps linear v0.xyzw
dcl_output o0.xyzw
mov o0.xyzw, v0.xyzw
ret
";

fn cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sm4-to-hlsl"))
}

#[test]
fn writes_stage_suffixed_file_next_to_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("tint.asm");
    fs::write(&input, PASSTHROUGH_PS).unwrap();

    cmd().arg(&input).assert().success();

    let hlsl = fs::read_to_string(dir.path().join("tint_ps.hlsl")).unwrap();
    assert!(hlsl.contains("struct PSInput\n{\n    float4 Color : COLOR;\n};"));
    assert!(hlsl.contains("PSOutput main(PSInput input)"));
    assert!(hlsl.contains("    output.Target = input.Color;\n"));
}

#[test]
fn output_base_and_entry_point_flags() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("tint.asm");
    fs::write(&input, PASSTHROUGH_PS).unwrap();
    let base = dir.path().join("out").join("shader");
    fs::create_dir(dir.path().join("out")).unwrap();

    cmd()
        .arg(&input)
        .args(["-e", "PSMain", "--output"])
        .arg(&base)
        .assert()
        .success();

    let hlsl = fs::read_to_string(dir.path().join("out").join("shader_ps.hlsl")).unwrap();
    assert!(hlsl.contains("PSOutput PSMain(PSInput input)"));
    assert!(!dir.path().join("tint_ps.hlsl").exists());
}

#[test]
fn strict_mode_fails_on_open_blocks() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("open.asm");
    fs::write(&input, "ps_4_0\nif_nz r0.x\nmov r0.y, r0.x\n").unwrap();

    cmd()
        .arg(&input)
        .arg("--strict")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: decompile"))
        .stderr(predicate::str::contains("depth 1"));
    assert!(!dir.path().join("open_ps.hlsl").exists());

    cmd()
        .arg(&input)
        .assert()
        .success()
        .stderr(predicate::str::contains("depth 1"));
    assert!(dir.path().join("open_ps.hlsl").exists());
}

#[test]
fn listing_without_profile_is_rejected() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("empty.asm");
    fs::write(&input, "// nothing here\n").unwrap();

    cmd()
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no shader profile token"));
    let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(leftovers.len(), 1);
}

#[test]
fn missing_input_reports_the_path() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("absent.asm");

    cmd()
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.asm"));
}
