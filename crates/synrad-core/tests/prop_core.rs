// ─────────────────────────────────────────────────────────────────────
// SynRad — Property-Based Tests (proptest) for synrad-core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for synrad-core using proptest.
//!
//! Covers: Boris energy conservation, summation scaling, polarization
//! completeness, surface generation, per-particle RNG streams.

use proptest::prelude::*;
use rand::Rng;
use synrad_core::beam::particle_rng;
use synrad_core::field::FieldSample;
use synrad_core::radiation::{FieldAccumulator, Polarization, SummationMode};
use synrad_core::surface::{Plane, RectangleSpec, Surface};
use synrad_core::trajectory::boris_push;
use synrad_math::vector::{Vector3, Vector3C};
use synrad_types::constants::{M_ELECTRON, Q_ELEMENTARY};

fn vec3(scale: f64) -> impl Strategy<Value = Vector3> {
    (-scale..scale, -scale..scale, -scale..scale).prop_map(|(x, y, z)| Vector3::new(x, y, z))
}

fn cvec3() -> impl Strategy<Value = Vector3C> {
    (vec3(5.0), vec3(5.0)).prop_map(|(re, im)| Vector3C::from_parts(re, im))
}

// ── Trajectory ───────────────────────────────────────────────────────

proptest! {
    /// A pure magnetic Boris step only rotates u.
    #[test]
    fn boris_conserves_momentum_in_b(u in vec3(1e4), b in vec3(2.0), dt in 1e-13f64..1e-10) {
        let field = FieldSample::magnetic(b);
        let next = boris_push(u, &field, -Q_ELEMENTARY, M_ELECTRON, dt);
        prop_assert!((next.norm() - u.norm()).abs() <= 1e-12 * (1.0 + u.norm()));
    }
}

// ── Summation ────────────────────────────────────────────────────────

proptest! {
    /// N identical particles: N× incoherent, N²× coherent.
    #[test]
    fn identical_particles_scale(e in cvec3(), n in 1usize..20) {
        let single = e.norm_sqr();
        let mut inc = FieldAccumulator::new(SummationMode::Incoherent, 1);
        let mut coh = FieldAccumulator::new(SummationMode::Coherent, 1);
        for _ in 0..n {
            inc.add(1.0, &[e]).unwrap();
            coh.add(1.0, &[e]).unwrap();
        }
        let nf = n as f64;
        prop_assert!((inc.intensities()[0] - nf * single).abs() <= 1e-12 * nf * (1.0 + single));
        prop_assert!((coh.intensities()[0] - nf * nf * single).abs() <= 1e-12 * nf * nf * (1.0 + single));
    }

    /// Linear and circular bases each split the transverse intensity.
    #[test]
    fn polarization_bases_are_complete(e in cvec3()) {
        let transverse = e.x.norm_sqr() + e.y.norm_sqr();
        let linear = Polarization::LinearHorizontal.project(e).norm_sqr()
            + Polarization::LinearVertical.project(e).norm_sqr();
        let circular = Polarization::CircularLeft.project(e).norm_sqr()
            + Polarization::CircularRight.project(e).norm_sqr();
        prop_assert!((linear - transverse).abs() <= 1e-12 * (1.0 + transverse));
        prop_assert!((circular - transverse).abs() <= 1e-12 * (1.0 + transverse));
    }

    /// Projection is idempotent.
    #[test]
    fn projection_is_idempotent(e in cvec3(), re in vec3(1.0), im in vec3(1.0)) {
        prop_assume!(re.norm() + im.norm() > 1e-3);
        let p = Polarization::custom(Vector3C::from_parts(re, im)).unwrap();
        let once = p.project(e);
        let twice = p.project(once);
        prop_assert!((once - twice).norm_sqr() <= 1e-20 * (1.0 + e.norm_sqr()));
        prop_assert!(once.norm_sqr() <= e.norm_sqr() * (1.0 + 1e-12) + 1e-20);
    }
}

// ── Surfaces ─────────────────────────────────────────────────────────

proptest! {
    /// Rectangles have nu·nv points centred on the translation.
    #[test]
    fn rectangle_is_centred(
        nu in 1usize..12,
        nv in 1usize..12,
        w in 0.001f64..2.0,
        h in 0.001f64..2.0,
        t in vec3(10.0),
        rot in vec3(3.0),
    ) {
        let spec = RectangleSpec::new(Plane::XZ, [w, h], [nu, nv])
            .translated(t)
            .rotated([rot.x, rot.y, rot.z]);
        let s = Surface::rectangle(&spec).unwrap();
        prop_assert_eq!(s.len(), nu * nv);
        let mean = s.points().iter().fold(Vector3::ZERO, |acc, p| acc + p.position) / (nu * nv) as f64;
        prop_assert!((mean - t).norm() < 1e-9 * (1.0 + t.norm()));
        for p in s.points() {
            let local = (p.position - t).norm();
            prop_assert!(local <= 0.5 * (w * w + h * h).sqrt() * (1.0 + 1e-9));
            let n = p.normal.unwrap();
            prop_assert!((n.norm() - 1.0).abs() < 1e-12);
            prop_assert!((p.position - t).dot(n).abs() < 1e-9);
        }
    }
}

// ── Random Streams ───────────────────────────────────────────────────

proptest! {
    /// Streams are a pure function of (seed, index).
    #[test]
    fn particle_streams_are_reproducible(seed in any::<u64>(), index in 0u64..1_000_000) {
        let a: [f64; 4] = particle_rng(seed, index).gen();
        let b: [f64; 4] = particle_rng(seed, index).gen();
        let c: [f64; 4] = particle_rng(seed, index + 1).gen();
        prop_assert_eq!(a, b);
        prop_assert_ne!(a, c);
    }
}
