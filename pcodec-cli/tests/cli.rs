// pcodec
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Black-box integration tests that run the compiled `pcodec` binary end-to-end over real temp
//! files, the way a user would invoke it from a shell.

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::tempdir;

fn pcodec() -> Command {
    Command::cargo_bin("pcodec").unwrap()
}

#[test]
fn copy_pipeline_round_trips_bytes() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    fs::write(&input, b"HELLO").unwrap();

    pcodec()
        .args([input.to_str().unwrap(), output.to_str().unwrap(), "encode", "copy", "blocksize=8"])
        .assert()
        .success();

    assert_eq!(fs::read(&output).unwrap(), b"HELLO");
}

#[test]
fn bac_pipeline_round_trips_through_two_invocations() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let coded = dir.path().join("coded.bin");
    let decoded = dir.path().join("decoded.bin");
    fs::write(&input, [0x00u8, 0xFF, 0x55]).unwrap();

    pcodec().args([input.to_str().unwrap(), coded.to_str().unwrap(), "encode", "bac", "adaptive"]).assert().success();
    pcodec().args([coded.to_str().unwrap(), decoded.to_str().unwrap(), "decode", "bac", "adaptive"]).assert().success();

    assert_eq!(fs::read(&decoded).unwrap(), fs::read(&input).unwrap());
}

#[test]
fn diff_then_seg_pipeline_round_trips() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let coded = dir.path().join("coded.bin");
    let decoded = dir.path().join("decoded.bin");
    fs::write(&input, [0x05u8, 0x07, 0x06, 0x09]).unwrap();

    pcodec()
        .args([input.to_str().unwrap(), coded.to_str().unwrap(), "encode", "diff", "valuesize=8", "#", "encode", "seg", "valuesize=8"])
        .assert()
        .success();
    pcodec()
        .args([coded.to_str().unwrap(), decoded.to_str().unwrap(), "decode", "seg", "valuesize=8", "#", "decode", "diff", "valuesize=8"])
        .assert()
        .success();

    assert_eq!(fs::read(&decoded).unwrap(), fs::read(&input).unwrap());
}

#[test]
fn unknown_stage_name_is_a_nonzero_exit() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    fs::write(&input, b"x").unwrap();

    pcodec()
        .args([input.to_str().unwrap(), output.to_str().unwrap(), "encode", "not-a-stage"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown stage"));
}

#[test]
fn unknown_option_name_is_a_nonzero_exit() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    fs::write(&input, b"x").unwrap();

    pcodec()
        .args([input.to_str().unwrap(), output.to_str().unwrap(), "encode", "copy", "not_an_option=1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognised option"));
}

#[test]
fn out_of_range_option_value_is_a_nonzero_exit() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    fs::write(&input, b"x").unwrap();

    pcodec()
        .args([input.to_str().unwrap(), output.to_str().unwrap(), "encode", "diff", "valuesize=128"])
        .assert()
        .failure();
}
