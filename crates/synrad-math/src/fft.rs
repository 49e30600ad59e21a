//! 1D FFT wrappers around rustfft.
//!
//! Convention matches numpy:
//! - Forward FFT (fft): unnormalized, kernel e^{-2πikn/N}
//! - Inverse FFT (ifft): normalized by 1/N

use num_complex::Complex64;
use rustfft::FftPlanner;

/// Forward FFT. Matches `numpy.fft.fft()`.
pub fn fft(input: &[Complex64]) -> Vec<Complex64> {
    let mut data = input.to_vec();
    if data.is_empty() {
        return data;
    }
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(data.len()).process(&mut data);
    data
}

/// Forward FFT of a real signal.
pub fn fft_real(input: &[f64]) -> Vec<Complex64> {
    let data: Vec<Complex64> = input.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    fft(&data)
}

/// Inverse FFT. Matches `numpy.fft.ifft()`.
pub fn ifft(input: &[Complex64]) -> Vec<Complex64> {
    let mut data = input.to_vec();
    if data.is_empty() {
        return data;
    }
    let n = data.len();
    let mut planner = FftPlanner::new();
    planner.plan_fft_inverse(n).process(&mut data);
    let norm = 1.0 / n as f64;
    for v in data.iter_mut() {
        *v *= norm;
    }
    data
}

/// Sample frequencies in cycles per unit of `d`. Matches `numpy.fft.fftfreq()`.
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let scale = 1.0 / (n as f64 * d);
    (0..n)
        .map(|k| {
            let signed = if k < n.div_ceil(2) {
                k as isize
            } else {
                k as isize - n as isize
            };
            signed as f64 * scale
        })
        .collect()
}
