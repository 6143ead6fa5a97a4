// ============================================================================
// SEAMLESS + NORMALIZE PROPERTIES — proptest over sizes, radii and content
// ============================================================================

use proptest::prelude::*;

use mapforge::buffer::PixelBuffer;
use mapforge::ops::CpuBackend;
use mapforge::ops::sampling::hash_f32;
use mapforge::passes::{Axis, Pass, PassBackend, RandomTilingPass};
use mapforge::pipeline::frame::Frame;
use mapforge::pipeline::height::normalize;
use mapforge::pipeline::normalize::MIN_RANGE;
use mapforge::pipeline::pool::ScratchPool;

fn noisy(w: u32, h: u32, seed: u32) -> PixelBuffer {
    let mut b = PixelBuffer::new(w, h).unwrap();
    for y in 0..h {
        for x in 0..w {
            let v = hash_f32(x, y, seed);
            b.set(x, y, [v, hash_f32(y, x, seed ^ 0x55), 1.0 - v, 1.0]);
        }
    }
    b.quantize_in_place();
    b
}

fn run(pass: &Pass, src: &PixelBuffer) -> PixelBuffer {
    let mut backend = CpuBackend::new();
    let (w, h) = src.dimensions();
    let mut out = backend.create_target(w, h).unwrap();
    backend.run(pass, &[src, src], &mut out).unwrap();
    out
}

fn left_matches_right(out: &PixelBuffer) -> bool {
    let (w, h) = out.dimensions();
    (0..h).all(|y| out.get(0, y) == out.get(w - 1, y))
}

fn top_matches_bottom(out: &PixelBuffer) -> bool {
    let (w, h) = out.dimensions();
    (0..w).all(|x| out.get(x, 0) == out.get(x, h - 1))
}

proptest! {
    #[test]
    fn simple_blend_matches_its_axis(
        w in 2u32..24, h in 2u32..24, radius in 1u32..12, seed in any::<u32>(),
        strength in 0.0f32..1.0, power in 0.5f32..3.0,
    ) {
        let src = noisy(w, h, seed);
        let horizontal = run(&Pass::SeamlessSimple { radius, axis: Axis::Horizontal, strength, power }, &src);
        prop_assert!(left_matches_right(&horizontal));
        let vertical = run(&Pass::SeamlessSimple { radius, axis: Axis::Vertical, strength, power }, &src);
        prop_assert!(top_matches_bottom(&vertical));
    }

    #[test]
    fn mirror_blend_matches_both_edges(
        w in 2u32..24, h in 2u32..24, radius in 1u32..12, seed in any::<u32>(),
        strength in 0.0f32..1.0,
    ) {
        let src = noisy(w, h, seed);
        let pass = Pass::SeamlessMirror { radius, mirror_x: true, mirror_y: true, strength, power: 1.0 };
        let out = run(&pass, &src);
        prop_assert!(left_matches_right(&out));
        prop_assert!(top_matches_bottom(&out));
    }

    #[test]
    fn random_blend_matches_both_edges(
        w in 2u32..24, h in 2u32..24, radius in 1u32..12, seed in any::<u32>(),
        angles in prop::array::uniform3(-3.0f32..3.0), phase in -1.0f32..1.0,
        inner in 0.0f32..0.5, gap in 0.05f32..0.5,
    ) {
        let src = noisy(w, h, seed);
        let random = RandomTilingPass { angles, phase, inner_radius: inner, outer_radius: inner + gap };
        let out = run(&Pass::SeamlessRandom { radius, strength: 0.0, power: 1.0, random }, &src);
        prop_assert!(left_matches_right(&out));
        prop_assert!(top_matches_bottom(&out));
    }

    #[test]
    fn normalize_stays_in_unit_range(
        w in 1u32..16, h in 1u32..16, seed in any::<u32>(), scale in -4.0f32..4.0, offset in -2.0f32..2.0,
    ) {
        let mut work = noisy(w, h, seed);
        for px in work.pixels_mut() {
            for c in px.iter_mut().take(3) {
                *c = *c * scale + offset;
            }
        }
        work.quantize_in_place();
        let spread: Vec<bool> = (0..3)
            .map(|c| {
                let (lo, hi) = work
                    .pixels()
                    .iter()
                    .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p[c]), hi.max(p[c])));
                hi - lo >= MIN_RANGE
            })
            .collect();

        let mut backend = CpuBackend::new();
        let mut pool = ScratchPool::new();
        let mut frame = Frame::new(&mut backend, &mut pool);
        let range = normalize(&mut frame, &mut work, None).unwrap();
        for c in 0..3 {
            prop_assert!(range.max[c] > range.min[c]);
        }
        for px in work.pixels() {
            for c in 0..3 {
                prop_assert!(px[c].is_finite());
                if spread[c] {
                    prop_assert!((-1e-3..=1.0 + 1e-3).contains(&px[c]), "{}", px[c]);
                }
            }
        }
    }
}
