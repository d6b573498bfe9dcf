use serde::Serialize;

/// One Gaussian component of the beat model, expressed relative to the beat
/// duration and amplitude.
#[derive(Debug, Clone, Copy)]
struct Wave {
    center: f64,
    width: f64,
    gain: f64,
}

const PQRST: [Wave; 5] = [
    // P
    Wave {
        center: 0.20,
        width: 0.025,
        gain: 0.1,
    },
    // Q
    Wave {
        center: 0.35,
        width: 0.010,
        gain: -0.2,
    },
    // R
    Wave {
        center: 0.40,
        width: 0.012,
        gain: 0.7,
    },
    // S
    Wave {
        center: 0.45,
        width: 0.010,
        gain: -0.3,
    },
    // T
    Wave {
        center: 0.60,
        width: 0.050,
        gain: 0.2,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatWaveform {
    pub samples: Vec<f64>,
    /// Index of the R-apex (first maximum) within `samples`.
    pub r_index: usize,
}

impl BeatWaveform {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Sum of five Gaussian waves over `round(duration * fs)` samples.
/// A non-positive duration yields an empty beat.
pub fn synthesize_beat(duration: f64, amplitude: f64, fs: f64) -> BeatWaveform {
    let n = if duration > 0.0 && fs > 0.0 {
        (duration * fs).round() as usize
    } else {
        0
    };
    let samples: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64 / fs;
            PQRST
                .iter()
                .map(|wave| {
                    let mu = wave.center * duration;
                    let sigma = wave.width * duration;
                    wave.gain * amplitude * (-0.5 * ((t - mu) / sigma).powi(2)).exp()
                })
                .sum()
        })
        .collect();
    let r_index = argmax(&samples);
    BeatWaveform { samples, r_index }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
