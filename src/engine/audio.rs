use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::config::EngineConfig;
use super::error::{EngineError, EngineResult};
use super::live::{CaptureSender, EffectStream};
use super::mixer::MixingEngine;
use super::relay::RelayChannel;

fn device_err(e: impl ToString) -> EngineError { EngineError::Device(e.to_string()) }

fn pick(devices: impl Iterator<Item = cpal::Device>, name: &str) -> Option<cpal::Device> {
  let needle = name.to_lowercase();
  devices.into_iter().find(|d| d.name().map(|n| n.to_lowercase().contains(&needle)).unwrap_or(false))
}

/// First output device whose name contains `name` (case-insensitive), or the
/// host default when no name is given.
pub fn find_output_device(host: &cpal::Host, name: Option<&str>) -> EngineResult<cpal::Device> {
  match name {
    Some(n) => pick(host.output_devices().map_err(device_err)?, n)
      .ok_or_else(|| EngineError::Device(format!("no output device matching '{n}'"))),
    None => host.default_output_device().ok_or_else(|| device_err("no output device")),
  }
}

pub fn find_input_device(host: &cpal::Host, name: Option<&str>) -> EngineResult<cpal::Device> {
  match name {
    Some(n) => pick(host.input_devices().map_err(device_err)?, n)
      .ok_or_else(|| EngineError::Device(format!("no input device matching '{n}'"))),
    None => host.default_input_device().ok_or_else(|| device_err("no input device")),
  }
}

pub fn stream_config(sample_rate: u32, channels: u16, block_size: u32) -> cpal::StreamConfig {
  cpal::StreamConfig {
    channels,
    sample_rate: cpal::SampleRate(sample_rate),
    // fixed period so every callback sees the same block length
    buffer_size: cpal::BufferSize::Fixed(block_size),
  }
}

/// A running stream. Dropping it pauses and releases the device, on error
/// paths too.
pub struct ActiveStream {
  stream: cpal::Stream,
  label: &'static str,
}

impl Drop for ActiveStream {
  fn drop(&mut self) {
    let _ = self.stream.pause();
    log::info!("{} stream closed", self.label);
  }
}

/// Runs `render` and turns a panic into a silent block. After the first
/// fault the stream stays silent instead of re-entering broken state.
fn contained<F: FnMut(&mut [f32])>(mut render: F, label: &'static str) -> impl FnMut(&mut [f32]) {
  let faulted = AtomicBool::new(false);
  move |data: &mut [f32]| {
    if faulted.load(Ordering::Relaxed) {
      data.fill(0.0);
      return;
    }
    if catch_unwind(AssertUnwindSafe(|| render(data))).is_err() {
      faulted.store(true, Ordering::Relaxed);
      data.fill(0.0);
      log::error!("{label} render faulted, output silenced");
    }
  }
}

pub fn open_output<F>(device: &cpal::Device, cfg: &cpal::StreamConfig, render: F, label: &'static str) -> EngineResult<ActiveStream>
where
  F: FnMut(&mut [f32]) + Send + 'static,
{
  let mut render = contained(render, label);
  let err_fn = move |e: cpal::StreamError| log::warn!("{label} stream error: {e}");
  let stream = device
    .build_output_stream(cfg, move |data: &mut [f32], _| render(data), err_fn, None)
    .map_err(device_err)?;
  stream.play().map_err(device_err)?;
  log::info!(
    "{label} stream opened on {} ({} Hz, {} ch)",
    device.name().unwrap_or_else(|_| "?".into()),
    cfg.sample_rate.0,
    cfg.channels
  );
  Ok(ActiveStream { stream, label })
}

pub fn open_input<F>(device: &cpal::Device, cfg: &cpal::StreamConfig, mut capture: F, label: &'static str) -> EngineResult<ActiveStream>
where
  F: FnMut(&[f32]) + Send + 'static,
{
  let faulted = AtomicBool::new(false);
  let data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
    if faulted.load(Ordering::Relaxed) { return; }
    if catch_unwind(AssertUnwindSafe(|| capture(data))).is_err() {
      faulted.store(true, Ordering::Relaxed);
      log::error!("{label} capture faulted, input dropped");
    }
  };
  let err_fn = move |e: cpal::StreamError| log::warn!("{label} stream error: {e}");
  let stream = device.build_input_stream(cfg, data_fn, err_fn, None).map_err(device_err)?;
  stream.play().map_err(device_err)?;
  log::info!("{label} stream opened on {}", device.name().unwrap_or_else(|_| "?".into()));
  Ok(ActiveStream { stream, label })
}

/// Streams kept alive for the duration of a run.
#[derive(Default)]
pub struct Session {
  streams: Vec<ActiveStream>,
}

impl Session {
  pub fn len(&self) -> usize { self.streams.len() }
  pub fn is_empty(&self) -> bool { self.streams.is_empty() }
}

fn open_secondary(host: &cpal::Host, cfg: &EngineConfig, relay: Arc<RelayChannel>) -> EngineResult<Option<ActiveStream>> {
  let Some(name) = cfg.secondary_device.as_deref() else { return Ok(None) };
  let device = find_output_device(host, Some(name))?;
  let stream_cfg = stream_config(cfg.sample_rate, cfg.channels, cfg.block_size);
  let stream = open_output(&device, &stream_cfg, move |out| { relay.pop_into(out); }, "secondary")?;
  Ok(Some(stream))
}

/// Soundboard: mixer on the primary device, relay consumer on the secondary.
pub fn start_board(cfg: &EngineConfig, mut engine: MixingEngine, relay: Arc<RelayChannel>) -> EngineResult<Session> {
  let host = cpal::default_host();
  let device = find_output_device(&host, cfg.primary_device.as_deref())?;
  let stream_cfg = stream_config(cfg.sample_rate, cfg.channels, cfg.block_size);
  let mut session = Session::default();
  session.streams.push(open_output(&device, &stream_cfg, move |out| engine.render(out), "primary")?);
  if let Some(s) = open_secondary(&host, cfg, relay)? {
    session.streams.push(s);
  }
  Ok(session)
}

/// Voice changer: mic capture into the effect stream on the primary device,
/// relayed to the secondary device when one is configured.
pub fn start_live(
  cfg: &EngineConfig,
  capture: CaptureSender,
  mut stream: EffectStream,
  relay: Option<Arc<RelayChannel>>,
) -> EngineResult<Session> {
  let host = cpal::default_host();
  let input = find_input_device(&host, cfg.input_device.as_deref())?;
  let output = find_output_device(&host, cfg.primary_device.as_deref())?;
  let in_cfg = stream_config(cfg.sample_rate, cfg.input_channels, cfg.block_size);
  let out_cfg = stream_config(cfg.sample_rate, cfg.channels, cfg.block_size);

  let mut session = Session::default();
  // output first so captured blocks have somewhere to go
  session.streams.push(open_output(&output, &out_cfg, move |out| stream.render(out), "primary")?);
  session.streams.push(open_input(&input, &in_cfg, move |data| capture.capture(data), "input")?);
  if let Some(relay) = relay {
    if let Some(s) = open_secondary(&host, cfg, relay)? {
      session.streams.push(s);
    }
  }
  Ok(session)
}
