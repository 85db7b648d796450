pub mod engine {
  pub mod audio;
  pub mod chain;
  pub mod config;
  pub mod dsp;
  pub mod error;
  pub mod live;
  pub mod mixer;
  pub mod params;
  pub mod relay;
  pub mod signal;
  pub mod voice;
}
pub mod commands;
pub mod loader;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;

use commands::{run_control, Controller, GainTarget};
use engine::chain::{chain_pair, EffectChain};
use engine::config::{default_config_path, load_config, EngineConfig};
use engine::live::{live_pair, LiveConfig};
use engine::mixer::mixer_pair;
use engine::params::{Gains, ParamStore};
use engine::relay::RelayChannel;
use engine::signal::{self, DropMonitor, ManualSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  /// Soundboard: one-shot voices mixed and relayed.
  Board,
  /// Voice changer: mic through the effect chain.
  Live,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
  pub mode: Mode,
  pub config_path: PathBuf,
}

impl Options {
  /// `voxrelay [board|live] [--config <path>]`
  pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Self> {
    let mut mode = Mode::Board;
    let mut config_path = None;
    let mut it = args.into_iter();
    while let Some(a) = it.next() {
      match a.as_str() {
        "board" => mode = Mode::Board,
        "live" => mode = Mode::Live,
        "--config" | "-c" => config_path = Some(PathBuf::from(it.next().context("--config needs a path")?)),
        other => anyhow::bail!("unexpected argument '{other}' (usage: voxrelay [board|live] [--config <path>])"),
      }
    }
    Ok(Self { mode, config_path: config_path.unwrap_or_else(default_config_path) })
  }
}

fn initial_chain(cfg: &EngineConfig) -> EffectChain {
  let sr = cfg.sample_rate as f32;
  EffectChain::from_names(&cfg.effects, sr).unwrap_or_else(|e| {
    log::warn!("config effects ignored: {e}");
    EffectChain::empty()
  })
}

pub fn run() -> anyhow::Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    .format_timestamp_millis()
    .filter_module("symphonia_core", log::LevelFilter::Warn)
    .init();

  let opts = Options::from_args(std::env::args().skip(1))?;
  let cfg = load_config(&opts.config_path);
  log::info!("voxrelay starting in {:?} mode", opts.mode);

  let params = Arc::new(ParamStore::new());
  cfg.apply_params(&params);
  let gains = Arc::new(Gains::new(cfg.master_gain, cfg.mic_gain));
  let mute = Arc::new(AtomicBool::new(false));
  let manual = ManualSignal::new();
  let sr = cfg.sample_rate;
  let channels = cfg.channels as usize;

  // streams and watcher must outlive the control loop
  let (mut ctl, session, _watcher) = match opts.mode {
    Mode::Board => {
      let relay = Arc::new(RelayChannel::new(cfg.relay_capacity));
      let (handle, engine) = mixer_pair(sr, channels, gains.clone(), mute.clone(), relay.clone());
      let mut ctl = Controller::new(params, gains, GainTarget::Master, sr as f32, manual.clone()).with_mixer(handle.clone());
      for (slot, sound) in &cfg.sounds {
        match loader::load_sound(&sound.path, sr, channels) {
          Ok(buf) => ctl.add_sound(*slot, Arc::new(buf), sound.gain),
          Err(e) => log::warn!("slot {slot} left empty: {e}"),
        }
      }
      let monitor = DropMonitor::new().track("relay blocks", relay.clone());
      let session = engine::audio::start_board(&cfg, engine, relay).context("failed to open board streams")?;
      let watcher = signal::watch_with(manual, mute, move || {
        if let Err(e) = handle.stop_all() { log::warn!("flush on mute failed: {e}"); }
      }, monitor, signal::TICK);
      (ctl, session, watcher)
    }
    Mode::Live => {
      let relay = cfg.secondary_device.as_ref().map(|_| Arc::new(RelayChannel::new(cfg.relay_capacity)));
      let (installer, slot) = chain_pair(initial_chain(&cfg));
      let live_cfg = LiveConfig {
        block_size: cfg.block_size as usize,
        input_channels: cfg.input_channels as usize,
        output_channels: channels,
      };
      let (capture, stream) = live_pair(live_cfg, slot, params.clone(), gains.clone(), mute.clone(), relay.clone());
      let ctl = Controller::new(params, gains, GainTarget::Mic, sr as f32, manual.clone()).with_chain(installer);
      let mut monitor = DropMonitor::new().track("captured blocks", capture.dropped());
      if let Some(r) = &relay { monitor = monitor.track("relay blocks", r.clone()); }
      let session = engine::audio::start_live(&cfg, capture, stream, relay.clone()).context("failed to open live streams")?;
      let watcher = signal::watch_with(manual, mute, move || {
        if let Some(r) = &relay { r.clear(); }
      }, monitor, signal::TICK);
      (ctl, session, watcher)
    }
  };

  anyhow::ensure!(!session.is_empty(), "no audio streams were opened");
  log::info!("{} audio streams running", session.len());
  println!("voxrelay ready, type 'help' for commands");
  let stdin = std::io::stdin();
  run_control(&mut ctl, stdin.lock(), std::io::stdout()).context("control channel failed")?;
  log::info!("shutting down");
  Ok(())
}
