// SPDX-License-Identifier: AGPL-3.0-only

//! End-to-end verification flow: export init files, compute golden tensors
//! from the files, and compare against simulator-format output.

use std::fs;
use std::path::Path;

use lenet_chip::files;
use lenet_chip::layers::{CONV1, CONV2, FC3};
use lenet_golden::dump::{read_dump, write_trace};
use lenet_golden::hexfile;
use lenet_golden::layout::{decode_bias, decode_conv_weights};
use lenet_golden::prelude::*;
use lenet_golden::{write_image, write_sim_output, LaneOrder, LayerTrace, LayoutDescriptor};

const SEED: u64 = 2024;

/// Export a full init directory and read it back the way `verify` does
fn exported(dir: &Path, pattern: InputPattern) -> (ParameterSet, Tensor) {
    let params = ParameterSet::synthetic(SEED).expect("synthetic parameters");
    params
        .write_init_files(dir, BiasFormat::Column)
        .expect("write init files");
    write_image(dir.join(files::INPUT_IMAGE), &pattern.image().unwrap()).expect("write image");

    let params = ParameterSet::read_init_files(dir, BiasFormat::Column).expect("read init files");
    let image = read_image(dir.join(files::INPUT_IMAGE)).expect("read image");
    (params, image)
}

fn traces(params: &ParameterSet, image: &Tensor) -> Vec<LayerTrace> {
    params.network().unwrap().run(image).unwrap()
}

/// Rewrite one value of a simulator output file
fn poke(path: &Path, line: usize, lane: usize, f: impl Fn(i32) -> i32) -> (i32, i32) {
    let text = fs::read_to_string(path).unwrap();
    let mut lines: Vec<String> = text.lines().map(str::to_owned).collect();
    let mut values: Vec<i32> = lines[line]
        .split_whitespace()
        .map(|v| v.parse().unwrap())
        .collect();
    let before = values[lane];
    values[lane] = f(before);
    lines[line] = values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    fs::write(path, lines.join("\n")).unwrap();
    (before, values[lane])
}

#[test]
fn conv1_ramp_matches_correct_sim_output() {
    let dir = tempfile::tempdir().unwrap();
    let (params, image) = exported(dir.path(), InputPattern::Ramp);
    let traces = traces(&params, &image);

    let conv1 = &traces[0];
    assert_eq!(conv1.padded_input.dims(), &[1, 32, 32]);
    assert_eq!(conv1.record.accumulated.dims(), &[6, 28, 28]);
    assert_eq!(conv1.record.output().dims(), &[6, 14, 14]);

    let sim = dir.path().join(files::SIM_OUTPUT);
    write_sim_output(&sim, conv1.record.output(), 6).unwrap();
    let format = SimOutputFormat::for_layer(&LayerConfig::from_geometry(&CONV1));
    let actual = read_sim_output(&sim, &format).unwrap();

    let report = ComparisonReport::new("conv1", &hwc_view(conv1.record.output()).unwrap(), &actual)
        .unwrap();
    assert!(report.is_match(), "{}", report.render(10));
}

#[test]
fn one_flipped_bit_is_one_divergence() {
    let dir = tempfile::tempdir().unwrap();
    let (params, image) = exported(dir.path(), InputPattern::Ramp);
    let golden = hwc_view(traces(&params, &image)[0].record.output()).unwrap();

    let sim = dir.path().join(files::SIM_OUTPUT);
    write_sim_output(&sim, &golden, 6).unwrap();
    // pixel (3, 4) is line 3 * 14 + 4; flip bit 0 of channel 2
    let (before, after) = poke(&sim, 3 * 14 + 4, 2, |v| v ^ 1);

    let format = SimOutputFormat::for_layer(&LayerConfig::from_geometry(&CONV1));
    let actual = read_sim_output(&sim, &format).unwrap();
    let found = compare(&golden, &actual).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].index, vec![3, 4, 2]);
    assert_eq!(found[0].expected, before);
    assert_eq!(found[0].actual, after);
    assert_eq!(found[0].diff, i64::from(before) - i64::from(after));
}

#[test]
fn msb_first_lane_order_disagrees_with_golden() {
    let dir = tempfile::tempdir().unwrap();
    let (params, image) = exported(dir.path(), InputPattern::Diagonal);
    let golden = traces(&params, &image).remove(0).record;

    let words = hexfile::read_words(dir.path().join(files::weights("conv1")), 48).unwrap();
    let bias_words =
        hexfile::read_words(dir.path().join(files::bias("conv1")), 32).unwrap();
    let bias = decode_bias(&bias_words, 6, &LayoutDescriptor::BIASES, BiasFormat::Column).unwrap();
    let config = LayerConfig::from_geometry(&CONV1);

    let run_with = |order: LaneOrder| {
        let desc = LayoutDescriptor::WEIGHTS.with_order(order);
        let weights = decode_conv_weights(&words, 6, 1, 5, &desc).unwrap();
        let layer = LayerEmulator::new(config.clone(), weights, bias.clone()).unwrap();
        layer.trace(&image).unwrap().record
    };

    let lsb = run_with(LaneOrder::LsbFirst);
    assert!(compare(&golden.accumulated, &lsb.accumulated).unwrap().is_empty());

    let msb = run_with(LaneOrder::MsbFirst);
    assert!(!compare(&golden.accumulated, &msb.accumulated).unwrap().is_empty());
}

#[test]
fn conv2_three_pass_output_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let (params, image) = exported(dir.path(), InputPattern::Ramp);
    let traces = traces(&params, &image);
    let conv2 = traces[1].record.output();
    assert_eq!(conv2.dims(), &[16, 5, 5]);

    let sim = dir.path().join("l2_sim.txt");
    write_sim_output(&sim, conv2, 6).unwrap();
    assert_eq!(fs::read_to_string(&sim).unwrap().lines().count(), 75);

    // third pass, pixel (1, 2), lane 1 is channel 13
    poke(&sim, 50 + 7, 1, |v| if v == 0 { 5 } else { 0 });
    let format = SimOutputFormat::for_layer(&LayerConfig::from_geometry(&CONV2));
    let actual = read_sim_output(&sim, &format).unwrap();
    let found = compare(&hwc_view(conv2).unwrap(), &actual).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].index, vec![1, 2, 13]);
}

#[test]
fn truncated_sim_output_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (params, image) = exported(dir.path(), InputPattern::Ramp);
    let conv1 = traces(&params, &image).remove(0).record;

    let sim = dir.path().join(files::SIM_OUTPUT);
    write_sim_output(&sim, conv1.output(), 6).unwrap();
    let text = fs::read_to_string(&sim).unwrap();
    let short: Vec<&str> = text.lines().take(195).collect();
    fs::write(&sim, short.join("\n")).unwrap();

    let format = SimOutputFormat::for_layer(&LayerConfig::from_geometry(&CONV1));
    let err = read_sim_output(&sim, &format).unwrap_err();
    assert!(err.is_fatal_input());
}

#[test]
fn logits_compare_as_vector() {
    let dir = tempfile::tempdir().unwrap();
    let (params, image) = exported(dir.path(), InputPattern::Diagonal);
    let traces = traces(&params, &image);
    let logits = traces[4].record.output();
    assert_eq!(logits.dims(), &[10]);

    let sim = dir.path().join("fc3_sim.txt");
    write_sim_output(&sim, logits, 6).unwrap();
    let format = SimOutputFormat::for_layer(&LayerConfig::from_geometry(&FC3));
    let actual = read_sim_output(&sim, &format).unwrap();
    assert!(compare(&hwc_view(logits).unwrap(), &actual).unwrap().is_empty());

    let class = params.network().unwrap().classify(&image).unwrap();
    let best = logits.data().iter().copied().max().unwrap();
    assert_eq!(logits.data()[class], best);
}

#[test]
fn debug_dumps_reload_to_stage_tensors() {
    let dir = tempfile::tempdir().unwrap();
    let (params, image) = exported(dir.path(), InputPattern::Ramp);
    let traces = traces(&params, &image);

    let written = write_trace(dir.path(), &traces[0]).unwrap();
    assert_eq!(written.len(), 6);
    let pooled = read_dump(
        dir.path().join("conv1_debug_4_pooled.txt"),
        [6, 14, 14],
        AxisOrder::Chw,
        BitWidth::W32,
    )
    .unwrap();
    assert_eq!(&pooled, traces[0].record.stage(Stage::Pooled));

    let written = write_trace(dir.path(), &traces[2]).unwrap();
    let acc = read_dump(&written[1], [120], AxisOrder::Linear, BitWidth::W32).unwrap();
    assert_eq!(&acc, &traces[2].record.accumulated);
}

#[test]
fn image_file_is_the_quantized_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let (_, image) = exported(dir.path(), InputPattern::Diagonal);
    assert_eq!(image, InputPattern::Diagonal.image().unwrap());
    let lines = hexfile::read_hex_lines(dir.path().join(files::INPUT_IMAGE)).unwrap();
    assert_eq!(lines.len(), 784);
    assert!(lines.iter().all(|l| l.len() == 2));
}
