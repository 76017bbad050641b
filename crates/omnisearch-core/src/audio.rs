//! Speech decoding and playback glue.
//!
//! The speech model answers with raw little-endian 16-bit PCM, base64 encoded.
//! Decoding scales every sample into `[-1.0, 1.0)` and splits interleaved
//! channels; playback writes a WAV file and optionally hands it to an external
//! player command.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::config::AudioConfig;
use crate::errors::SearchError;

const PCM_SCALE: f32 = 32768.0;

/// Decoded audio, one sample vector per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }
}

/// Decode a base64 payload, ignoring any embedded whitespace.
pub fn decode_base64_audio(data: &str) -> Result<Vec<u8>, SearchError> {
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| SearchError::Audio(format!("Invalid base64 audio payload: {}", e)))
}

/// Convert interleaved 16-bit PCM into per-channel float samples.
///
/// A trailing odd byte and an incomplete trailing frame are dropped.
pub fn decode_pcm16(data: &[u8], sample_rate: u32, channels: u16) -> Result<AudioBuffer, SearchError> {
    if channels == 0 {
        return Err(SearchError::Audio("Channel count must be greater than 0".to_string()));
    }

    let samples: Vec<i16> = data
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let channel_count = channels as usize;
    let frame_count = samples.len() / channel_count;
    let mut decoded = vec![Vec::with_capacity(frame_count); channel_count];

    for frame in samples.chunks_exact(channel_count) {
        for (channel, sample) in frame.iter().enumerate() {
            decoded[channel].push(*sample as f32 / PCM_SCALE);
        }
    }

    Ok(AudioBuffer {
        sample_rate,
        channels: decoded,
    })
}

/// Encode the buffer as a 16-bit PCM RIFF/WAVE file.
///
/// Channels shorter than the first one are padded with silence.
pub fn encode_wav(buffer: &AudioBuffer) -> Vec<u8> {
    let channels = buffer.channel_count().max(1);
    let frames = buffer.frame_count();
    let block_align = channels as u32 * 2;
    let data_len = frames as u32 * block_align;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&buffer.sample_rate.to_le_bytes());
    out.extend_from_slice(&(buffer.sample_rate * block_align).to_le_bytes());
    out.extend_from_slice(&(block_align as u16).to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());

    for frame in 0..frames {
        for channel in &buffer.channels {
            let sample = channel.get(frame).copied().unwrap_or(0.0);
            let scaled = (sample * PCM_SCALE).round().clamp(i16::MIN as f32, i16::MAX as f32);
            out.extend_from_slice(&(scaled as i16).to_le_bytes());
        }
    }

    out
}

pub async fn write_wav<P: AsRef<Path>>(buffer: &AudioBuffer, path: P) -> Result<(), SearchError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, encode_wav(buffer)).await?;
    log::debug!(
        "Wrote {} frames ({:.2}s) to {}",
        buffer.frame_count(),
        buffer.duration().as_secs_f64(),
        path.display()
    );
    Ok(())
}

/// Writes decoded speech to disk and plays it with the configured command.
pub struct AudioPlayer {
    output_dir: PathBuf,
    player: Option<String>,
}

impl AudioPlayer {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            player: config.player.clone(),
        }
    }

    pub fn can_play(&self) -> bool {
        self.player.is_some()
    }

    /// Save the buffer under the output directory and play it when a player is
    /// configured. Returns the path of the written file.
    pub async fn play(&self, buffer: &AudioBuffer) -> Result<PathBuf, SearchError> {
        let file_name = format!("speech-{}.wav", uuid::Uuid::new_v4().simple());
        let path = self.output_dir.join(file_name);
        write_wav(buffer, &path).await?;

        if let Some(player) = &self.player {
            Self::run_player(player, &path).await?;
        }

        Ok(path)
    }

    async fn run_player(player: &str, path: &Path) -> Result<(), SearchError> {
        let mut parts = player.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| SearchError::Audio("Empty player command".to_string()))?;

        log::info!("Playing {} with {}", path.display(), program);
        let status = Command::new(program)
            .args(parts)
            .arg(path)
            .status()
            .await
            .map_err(|e| SearchError::Audio(format!("Failed to start player '{}': {}", program, e)))?;

        if !status.success() {
            return Err(SearchError::Audio(format!(
                "Player '{}' exited with {}",
                program, status
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_mono_scaling() {
        let buffer = decode_pcm16(&pcm(&[0, 16384, -32768, 32767]), 24000, 1).unwrap();
        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.frame_count(), 4);
        assert_eq!(buffer.channels[0][0], 0.0);
        assert_eq!(buffer.channels[0][1], 0.5);
        assert_eq!(buffer.channels[0][2], -1.0);
        assert!(buffer.channels[0][3] < 1.0);
    }

    #[test]
    fn test_stereo_deinterleaves() {
        let buffer = decode_pcm16(&pcm(&[100, -100, 200, -200, 300]), 48000, 2).unwrap();
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.channels[0], vec![100.0 / 32768.0, 200.0 / 32768.0]);
        assert_eq!(buffer.channels[1], vec![-100.0 / 32768.0, -200.0 / 32768.0]);
    }

    #[test]
    fn test_odd_byte_dropped() {
        let mut data = pcm(&[1000, 2000]);
        data.push(0x7f);
        let buffer = decode_pcm16(&data, 24000, 1).unwrap();
        assert_eq!(buffer.frame_count(), 2);
    }

    #[test]
    fn test_zero_channels_rejected() {
        assert!(decode_pcm16(&pcm(&[1]), 24000, 0).is_err());
    }

    #[test]
    fn test_duration() {
        let buffer = decode_pcm16(&vec![0u8; 48000], 24000, 1).unwrap();
        assert_eq!(buffer.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_base64_ignores_whitespace() {
        let bytes = decode_base64_audio("AAEC\nAwQF\r\n").unwrap();
        assert_eq!(bytes, vec![0, 1, 2, 3, 4, 5]);
        assert!(decode_base64_audio("not*base64").is_err());
    }

    #[test]
    fn test_wav_preserves_samples() {
        let original = pcm(&[0, 12345, -12345, 32767]);
        let buffer = decode_pcm16(&original, 24000, 1).unwrap();
        let wav = encode_wav(&buffer);

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), 24000);
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 8);
        assert_eq!(&wav[44..], original.as_slice());
    }

    #[test]
    fn test_wav_pads_short_channels() {
        let buffer = AudioBuffer {
            sample_rate: 24000,
            channels: vec![vec![0.5, 0.5], vec![0.25]],
        };
        let wav = encode_wav(&buffer);

        assert_eq!(wav.len(), 44 + 8);
        assert_eq!(&wav[44..46], &16384i16.to_le_bytes());
        assert_eq!(&wav[46..48], &8192i16.to_le_bytes());
        assert_eq!(&wav[50..52], &0i16.to_le_bytes());
    }

    #[tokio::test]
    async fn test_player_without_command_only_writes() {
        let dir = tempfile::tempdir().unwrap();
        let player = AudioPlayer::new(&AudioConfig {
            output_dir: dir.path().to_path_buf(),
            ..AudioConfig::default()
        });
        assert!(!player.can_play());

        let buffer = decode_pcm16(&pcm(&[1, 2, 3]), 24000, 1).unwrap();
        let path = player.play(&buffer).await.unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(tokio::fs::read(&path).await.unwrap().len(), 44 + 6);
    }
}
