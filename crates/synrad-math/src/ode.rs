//! Explicit Runge–Kutta stepping for fixed-size first-order systems.
//!
//! The state is a plain `[f64; N]` array so steppers can be monomorphized
//! for the 6-component particle state without allocation.

/// First-order system `dy/dt = f(t, y)`.
pub trait OdeSystem<const N: usize> {
    fn derivative(&self, t: f64, y: &[f64; N]) -> [f64; N];
}

impl<const N: usize, F> OdeSystem<N> for F
where
    F: Fn(f64, &[f64; N]) -> [f64; N],
{
    fn derivative(&self, t: f64, y: &[f64; N]) -> [f64; N] {
        self(t, y)
    }
}

fn axpy<const N: usize>(y: &[f64; N], a: f64, k: &[f64; N]) -> [f64; N] {
    let mut out = *y;
    for (o, ki) in out.iter_mut().zip(k.iter()) {
        *o += a * ki;
    }
    out
}

/// One classical RK4 step from `(t, y)` with step `dt` (may be negative).
pub fn rk4_step<const N: usize, S: OdeSystem<N>>(system: &S, t: f64, y: &[f64; N], dt: f64) -> [f64; N] {
    if !dt.is_finite() || dt == 0.0 {
        return *y;
    }

    let k1 = system.derivative(t, y);
    let k2 = system.derivative(t + 0.5 * dt, &axpy(y, 0.5 * dt, &k1));
    let k3 = system.derivative(t + 0.5 * dt, &axpy(y, 0.5 * dt, &k2));
    let k4 = system.derivative(t + dt, &axpy(y, dt, &k3));

    let mut out = *y;
    for i in 0..N {
        out[i] += dt * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]) / 6.0;
    }
    out
}

/// Integrate `steps` RK4 steps, returning every state including the initial one.
pub fn integrate_rk4<const N: usize, S: OdeSystem<N>>(
    system: &S,
    t0: f64,
    initial: [f64; N],
    dt: f64,
    steps: usize,
) -> Vec<[f64; N]> {
    let mut traj = Vec::with_capacity(steps + 1);
    let mut y = initial;
    traj.push(y);
    for n in 0..steps {
        y = rk4_step(system, t0 + n as f64 * dt, &y, dt);
        traj.push(y);
    }
    traj
}
