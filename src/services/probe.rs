use async_trait::async_trait;
use std::io::Cursor;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::ProbeError;

/// Exact spoken duration of encoded audio, in seconds.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration(&self, audio: &[u8]) -> Result<f64, ProbeError>;
}

/// Frames / sample rate of a PCM WAV.
///
/// Streamed responses carry `0` or `0xFFFFFFFF` as the data chunk size.
/// For those, and for sizes past the end of the buffer, the frames actually
/// present after the `data` header are counted instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDurationProbe;

impl WavDurationProbe {
    pub fn measure(audio: &[u8]) -> Result<f64, ProbeError> {
        if let Some(layout) = WavLayout::parse(audio) {
            if !layout.declared_len_fits(audio.len()) {
                return layout.streamed_duration(audio.len());
            }
        }

        let reader = hound::WavReader::new(Cursor::new(audio))?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return Err(ProbeError::InvalidDuration("sample rate is zero".to_string()));
        }
        Ok(reader.duration() as f64 / spec.sample_rate as f64)
    }
}

const UNSIZED_CHUNK: u32 = u32::MAX;

/// Just enough of the RIFF chunk list to find the PCM payload.
#[derive(Debug, Clone, Copy, PartialEq)]
struct WavLayout {
    sample_rate: u32,
    block_align: u16,
    data_offset: usize,
    data_len: u32,
}

impl WavLayout {
    fn parse(audio: &[u8]) -> Option<Self> {
        if audio.get(0..4)? != b"RIFF" || audio.get(8..12)? != b"WAVE" {
            return None;
        }

        let mut format: Option<(u32, u16)> = None;
        let mut pos = 12;
        while let Some(header) = audio.get(pos..pos + 8) {
            let id = &header[0..4];
            let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            let body = pos + 8;

            if id == b"data" {
                let (sample_rate, block_align) = format?;
                return Some(Self {
                    sample_rate,
                    block_align,
                    data_offset: body,
                    data_len: len,
                });
            }
            if id == b"fmt " {
                let fmt = audio.get(body..body + 16)?;
                let sample_rate = u32::from_le_bytes([fmt[4], fmt[5], fmt[6], fmt[7]]);
                let block_align = u16::from_le_bytes([fmt[12], fmt[13]]);
                format = Some((sample_rate, block_align));
            }
            if len == UNSIZED_CHUNK {
                return None;
            }
            // Chunks are word aligned.
            pos = body.checked_add(len as usize + (len as usize & 1))?;
        }
        None
    }

    fn declared_len_fits(&self, total: usize) -> bool {
        self.data_len != 0
            && self.data_len != UNSIZED_CHUNK
            && self.data_offset + self.data_len as usize <= total
    }

    fn streamed_duration(&self, total: usize) -> Result<f64, ProbeError> {
        if self.sample_rate == 0 || self.block_align == 0 {
            return Err(ProbeError::InvalidDuration(format!(
                "sample rate {} / block align {}",
                self.sample_rate, self.block_align
            )));
        }
        let available = total.saturating_sub(self.data_offset);
        let frames = available / self.block_align as usize;
        Ok(frames as f64 / self.sample_rate as f64)
    }
}

#[async_trait]
impl DurationProbe for WavDurationProbe {
    async fn duration(&self, audio: &[u8]) -> Result<f64, ProbeError> {
        Self::measure(audio)
    }
}

/// Pipes the audio into `ffprobe` and reads `format=duration`. Handles any
/// container ffprobe understands.
#[derive(Debug, Clone)]
pub struct FfprobeDurationProbe {
    program: String,
}

impl Default for FfprobeDurationProbe {
    fn default() -> Self {
        Self {
            program: "ffprobe".to_string(),
        }
    }
}

impl FfprobeDurationProbe {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl DurationProbe for FfprobeDurationProbe {
    async fn duration(&self, audio: &[u8]) -> Result<f64, ProbeError> {
        let mut child = Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=nokey=1:noprint_wrappers=1",
                "-i",
                "pipe:0",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // ffprobe may stop reading once it has the header.
            match stdin.write_all(audio).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e.into()),
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ProbeError::Tool(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }
}

pub fn parse_duration(stdout: &str) -> Result<f64, ProbeError> {
    let trimmed = stdout.trim();
    let secs: f64 = trimmed
        .parse()
        .map_err(|_| ProbeError::InvalidDuration(trimmed.to_string()))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(ProbeError::InvalidDuration(trimmed.to_string()));
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ffprobe_output() {
        assert_eq!(parse_duration("2.500000\n").unwrap(), 2.5);
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("-1.0").is_err());
        assert!(parse_duration("inf").is_err());
    }

    fn header(data_len: u32) -> Vec<u8> {
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&u32::MAX.to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&1u16.to_le_bytes()); // mono
        wav.extend_from_slice(&8_000u32.to_le_bytes());
        wav.extend_from_slice(&16_000u32.to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        wav
    }

    #[test]
    fn unsized_and_overlong_data_chunks_count_present_frames() {
        for declared in [0, u32::MAX, 64_000] {
            let mut wav = header(declared);
            wav.extend(std::iter::repeat(0u8).take(4_000));
            let secs = WavDurationProbe::measure(&wav).unwrap();
            assert!((secs - 0.25).abs() < 1e-9, "declared {}: {}", declared, secs);
        }
    }

    #[test]
    fn data_before_format_is_rejected() {
        let mut wav = b"RIFF\0\0\0\0WAVEdata\0\0\0\0".to_vec();
        wav.extend([0u8; 8]);
        assert!(WavLayout::parse(&wav).is_none());
        assert!(WavDurationProbe::measure(&wav).is_err());
    }
}
