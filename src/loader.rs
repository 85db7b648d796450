use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::voice::SoundBuffer;

fn decode_err(path: &Path, e: impl ToString) -> EngineError {
  EngineError::Decode { path: path.display().to_string(), reason: e.to_string() }
}

/// Decodes the first audio track of `path` into interleaved f32 at the
/// file's own rate and channel count.
pub fn decode_file(path: &Path) -> EngineResult<SoundBuffer> {
  let file = File::open(path)?;
  let mss = MediaSourceStream::new(Box::new(file), Default::default());
  let mut hint = Hint::new();
  if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
    hint.with_extension(ext);
  }
  let probed = symphonia::default::get_probe()
    .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
    .map_err(|e| decode_err(path, e))?;
  let mut reader = probed.format;
  let track = reader
    .tracks()
    .iter()
    .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
    .ok_or_else(|| decode_err(path, "no supported audio tracks"))?;
  let mut decoder = symphonia::default::get_codecs()
    .make(&track.codec_params, &DecoderOptions::default())
    .map_err(|e| decode_err(path, e))?;
  let track_id = track.id;
  let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
  let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

  let mut data = Vec::<f32>::new();
  let mut scratch: Option<SampleBuffer<f32>> = None;
  loop {
    let packet = match reader.next_packet() {
      Ok(packet) => packet,
      Err(Error::ResetRequired) => break,
      Err(Error::IoError(_)) => break,
      Err(e) => return Err(decode_err(path, e)),
    };
    while !reader.metadata().is_latest() { reader.metadata().pop(); }
    if packet.track_id() != track_id { continue; }

    let decoded = match decoder.decode(&packet) {
      Ok(d) => d,
      // a corrupt packet is skipped, the rest of the file still plays
      Err(Error::DecodeError(e)) => {
        log::warn!("{}: skipping bad packet: {e}", path.display());
        continue;
      }
      Err(e) => return Err(decode_err(path, e)),
    };
    let spec = *decoded.spec();
    sample_rate = spec.rate;
    channels = spec.channels.count();
    if scratch.as_ref().map_or(true, |b| b.capacity() < decoded.capacity() * channels) {
      scratch = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
    }
    if let Some(buf) = scratch.as_mut() {
      buf.copy_interleaved_ref(decoded);
      data.extend_from_slice(buf.samples());
    }
  }

  if channels == 0 || sample_rate == 0 {
    return Err(decode_err(path, "stream has no audio"));
  }
  Ok(SoundBuffer::new(data, channels, sample_rate))
}

/// Makes a decoded buffer playable on a stream of `sample_rate`/`channels`.
/// Mono is duplicated to every channel; any other mismatch is rejected.
pub fn conform(buf: SoundBuffer, path: &Path, sample_rate: u32, channels: usize) -> EngineResult<SoundBuffer> {
  if buf.sample_rate != sample_rate {
    return Err(EngineError::SampleRateMismatch {
      path: path.display().to_string(),
      found: buf.sample_rate,
      expected: sample_rate,
    });
  }
  if buf.channels == channels {
    return Ok(buf);
  }
  if buf.channels == 1 {
    let data = buf.data.iter().flat_map(|&s| std::iter::repeat(s).take(channels)).collect();
    return Ok(SoundBuffer::new(data, channels, sample_rate));
  }
  Err(EngineError::ChannelMismatch { path: path.display().to_string(), found: buf.channels, expected: channels })
}

pub fn load_sound(path: &Path, sample_rate: u32, channels: usize) -> EngineResult<SoundBuffer> {
  let buf = conform(decode_file(path)?, path, sample_rate, channels)?;
  log::info!("loaded {} ({} frames)", path.display(), buf.frames());
  Ok(buf)
}
