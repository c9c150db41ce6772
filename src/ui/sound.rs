/// Sound engine: procedural 8-bit style sound effects via rodio.
///
/// All fixed sounds are generated as in-memory WAV buffers at init time;
/// the tip jingle is synthesized per play so its pitch can climb with the
/// combo. Playback is fire-and-forget via rodio's Sink.
///
/// Compile without the "sound" feature to disable audio entirely
/// (the stub SoundEngine does nothing).

#[cfg(feature = "sound")]
mod inner {
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};

    const SAMPLE_RATE: u32 = 22050;
    const TAU: f32 = 2.0 * std::f32::consts::PI;

    /// Pre-generated WAV buffers for each sound effect.
    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        sfx_door: Arc<Vec<u8>>,
        sfx_board: Arc<Vec<u8>>,
        sfx_scare: Arc<Vec<u8>>,
        sfx_vanish: Arc<Vec<u8>>,
        sfx_overflow: Arc<Vec<u8>>,
        sfx_renovate: Arc<Vec<u8>>,
        sfx_combo_break: Arc<Vec<u8>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = OutputStream::try_default().ok()?;

            Some(SoundEngine {
                _stream: stream,
                handle,
                sfx_door: Arc::new(make_wav(&gen_door_chime())),
                sfx_board: Arc::new(make_wav(&gen_board_blip())),
                sfx_scare: Arc::new(make_wav(&gen_scare())),
                sfx_vanish: Arc::new(make_wav(&gen_vanish())),
                sfx_overflow: Arc::new(make_wav(&gen_overflow())),
                sfx_renovate: Arc::new(make_wav(&gen_renovate())),
                sfx_combo_break: Arc::new(make_wav(&gen_combo_break())),
            })
        }

        fn play(&self, buf: &Arc<Vec<u8>>) {
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }

        /// Coin jingle for a paid tip; each combo step raises the key.
        pub fn play_tip(&self, combo: u32) {
            let shift = 1.0594631_f32.powi(combo.min(12) as i32); // semitones
            let buf = make_wav(&gen_tip(shift));
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf);
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach();
                }
            }
        }

        pub fn play_door(&self) { self.play(&self.sfx_door); }
        pub fn play_board(&self) { self.play(&self.sfx_board); }
        pub fn play_scare(&self) { self.play(&self.sfx_scare); }
        pub fn play_vanish(&self) { self.play(&self.sfx_vanish); }
        pub fn play_overflow(&self) { self.play(&self.sfx_overflow); }
        pub fn play_renovate(&self) { self.play(&self.sfx_renovate); }
        pub fn play_combo_break(&self) { self.play(&self.sfx_combo_break); }
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators — all produce Vec<f32> mono samples
    // ════════════════════════════════════════════════════════════

    /// Tip payout: quick ascending arpeggio, transposed by `shift`.
    fn gen_tip(shift: f32) -> Vec<f32> {
        let notes = [880.0_f32, 1109.0, 1319.0]; // A5, C#6, E6
        let note_dur = 0.05;
        let mut samples = Vec::new();
        for &base in &notes {
            let freq = base * shift;
            let n = (SAMPLE_RATE as f32 * note_dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).powf(0.5);
                // Sine + 3rd harmonic for a square-ish retro timbre
                let wave = (t * freq * TAU).sin() * 0.7
                    + (t * freq * 3.0 * TAU).sin() * 0.3;
                samples.push(wave * env * 0.25);
            }
        }
        samples
    }

    /// Elevator arrival: soft ding-dong.
    fn gen_door_chime() -> Vec<f32> {
        let pairs = [(988.0_f32, 0.09), (784.0, 0.16)]; // B5, G5
        let mut samples = Vec::new();
        for &(freq, dur) in &pairs {
            let n = (SAMPLE_RATE as f32 * dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).powf(0.6);
                let wave = (t * freq * TAU).sin() * 0.8
                    + (t * freq * 2.0 * TAU).sin() * 0.2;
                samples.push(wave * env * 0.22);
            }
        }
        samples
    }

    /// A passenger steps over the threshold.
    fn gen_board_blip() -> Vec<f32> {
        let duration = 0.05;
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - i as f32 / n as f32;
                (t * 520.0 * TAU).sin() * env * 0.18
            })
            .collect()
    }

    /// Ghost scare: slow wobble sliding downward.
    fn gen_scare() -> Vec<f32> {
        let duration = 0.5;
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let prog = i as f32 / n as f32;
                let freq = 300.0 - prog * 140.0;
                let wobble = 1.0 + 0.04 * (t * 9.0 * TAU).sin();
                let env = (1.0 - prog).powf(0.4);
                (t * freq * wobble * TAU).sin() * env * 0.3
            })
            .collect()
    }

    /// Ghost vanish: thin shimmer fading upward.
    fn gen_vanish() -> Vec<f32> {
        let duration = 0.4;
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let prog = i as f32 / n as f32;
                let freq = 700.0 + prog * 900.0;
                let env = (1.0 - prog).powf(1.5);
                ((t * freq * TAU).sin() * 0.6 + (t * freq * 1.5 * TAU).sin() * 0.4)
                    * env
                    * 0.2
            })
            .collect()
    }

    /// Overflow: harsh two-tone buzzer.
    fn gen_overflow() -> Vec<f32> {
        let duration = 0.7;
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let prog = i as f32 / n as f32;
                // Alternate between two low tones every 80ms
                let freq = if (t / 0.08) as u32 % 2 == 0 { 196.0 } else { 147.0 };
                let sq = if (t * freq * TAU).sin() >= 0.0 { 1.0 } else { -1.0 };
                let env = 1.0 - prog * 0.4;
                sq * env * 0.16
            })
            .collect()
    }

    /// Renovation start: hammering noise bursts.
    fn gen_renovate() -> Vec<f32> {
        let duration = 0.45;
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        let mut rng: u32 = 424242;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                // Three hits, each decaying fast
                let hit_t = (t % 0.15) / 0.15;
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                let thud = (t * 90.0 * TAU).sin();
                let env = (1.0 - hit_t).powf(3.0);
                (noise * 0.5 + thud * 0.5) * env * 0.3
            })
            .collect()
    }

    /// Combo broken: short dejected slide down.
    fn gen_combo_break() -> Vec<f32> {
        let duration = 0.18;
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let prog = i as f32 / n as f32;
                let freq = 440.0 - prog * 220.0;
                let env = (1.0 - prog).powf(0.7);
                (t * freq * TAU).sin() * env * 0.2
            })
            .collect()
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder — wraps f32 samples into a valid WAV buffer
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let num_channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let byte_rate = SAMPLE_RATE * (num_channels as u32) * (bits_per_sample as u32) / 8;
        let block_align = num_channels * bits_per_sample / 8;
        let data_size = samples.len() as u32 * 2; // 16-bit = 2 bytes per sample
        let file_size = 36 + data_size;

        let mut buf = Vec::with_capacity(44 + data_size as usize);

        // RIFF header
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        // fmt chunk
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
        buf.extend_from_slice(&num_channels.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());

        // data chunk
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());

        for &s in samples {
            let clamped = s.max(-1.0).min(1.0);
            let val = (clamped * 32767.0) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }

        buf
    }
}

// ════════════════════════════════════════════════════════════
//  Public API — compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play_tip(&self, _combo: u32) {}
    pub fn play_door(&self) {}
    pub fn play_board(&self) {}
    pub fn play_scare(&self) {}
    pub fn play_vanish(&self) {}
    pub fn play_overflow(&self) {}
    pub fn play_renovate(&self) {}
    pub fn play_combo_break(&self) {}
}
