/*
 * Copyright 2019 The Regents of the University of California
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 *
 */

extern crate criterion;
extern crate num_complex;
extern crate num_traits;
extern crate vd628x_flicker;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use num_complex::Complex32;
use num_traits::Zero;
use vd628x_flicker::fft::{select_peaks, window_stats, Transform};

const SAMPLING_FREQUENCY: u32 = 4096;

fn tone_samples(freq_hz: f32, len: usize) -> Vec<i16> {
    (0..len)
        .map(|n| {
            let t = n as f32 / SAMPLING_FREQUENCY as f32;
            (8000.0 * (2.0 * std::f32::consts::PI * freq_hz * t).sin()) as i16
        })
        .collect()
}

fn benchmark_window_stats(c: &mut Criterion) {
    let samples = tone_samples(120.0, SAMPLING_FREQUENCY as usize);
    c.bench_function("window_stats_one_second", |b| {
        b.iter(|| window_stats(&samples))
    });
}

fn benchmark_dc_removal(c: &mut Criterion) {
    let samples = tone_samples(120.0, SAMPLING_FREQUENCY as usize);
    let stats = window_stats(&samples);
    c.bench_function("dc_removal_one_second", |b| {
        b.iter_batched(
            || samples.clone(),
            |samples| {
                let removed: Vec<i16> = samples
                    .iter()
                    .map(|&s| (f32::from(s) - stats.avg) as i16)
                    .collect();
                removed
            },
            BatchSize::SmallInput,
        )
    });
}

fn benchmark_fft(c: &mut Criterion) {
    let window_lens = [
        (SAMPLING_FREQUENCY as usize / 4, "quarter_second"),
        (SAMPLING_FREQUENCY as usize / 2, "half_second"),
        (SAMPLING_FREQUENCY as usize, "one_second"),
    ];
    let mut group = c.benchmark_group("fft_process");
    for &(len, label) in window_lens.iter() {
        let samples = tone_samples(120.0, len);
        group.bench_function(label, |b| {
            b.iter_batched(
                || (Transform::new(len), vec![Complex32::zero(); len]),
                |(mut transform, mut buffer)| {
                    transform.process(&samples, &mut buffer);
                    buffer
                },
                BatchSize::SmallInput,
            )
        });
    }
}

fn benchmark_select_peaks(c: &mut Criterion) {
    let len = SAMPLING_FREQUENCY as usize;
    let samples = tone_samples(120.0, len);
    let mut transform = Transform::new(len);
    let mut spectrum = vec![Complex32::zero(); len];
    transform.process(&samples, &mut spectrum);

    c.bench_function("select_peaks_one_second", |b| {
        b.iter(|| select_peaks(&spectrum, SAMPLING_FREQUENCY))
    });
}

criterion_group!(
    benches,
    benchmark_window_stats,
    benchmark_dc_removal,
    benchmark_fft,
    benchmark_select_peaks,
);
criterion_main!(benches);
