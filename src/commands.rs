use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::engine::chain::{ChainInstaller, EffectChain};
use crate::engine::dsp::EffectKind;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::mixer::MixerHandle;
use crate::engine::params::{Gains, ParamStore};
use crate::engine::signal::{KeySignal, ManualSignal};
use crate::engine::voice::SoundBuffer;

pub const HELP: &str = "\
commands:
  effect <name[,name...]>    install an effect chain
  effect add <name[,...]|all> append effects to the chain (all: every effect)
  effect remove <index|name|all> drop one effect (index from 0, name by prefix)
  effect off                 bypass all effects
  effect param <key> <value> set an effect parameter
  effect list                show the chain and available effects
  effect list all            show every available effect
  effect params              show every parameter
  gain <value>               mic gain (live) or master gain (board)
  gain <slot> <value>        set a loaded sound's own gain
  master <value>             master gain
  play <slot> [gain]         play a loaded sound
  stop                       stop every sound and flush the relay
  mute [on|off]              mute output (toggles without argument)
  help                       this text
  quit                       exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Additions {
  All,
  Names(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Removal {
  All,
  Index(usize),
  Prefix(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
  Effect(Vec<String>),
  EffectAdd(Additions),
  EffectRemove(Removal),
  EffectOff,
  EffectParam { key: String, value: f32 },
  EffectList,
  EffectListAll,
  EffectParams,
  Gain(f32),
  SlotGain { slot: u32, gain: f32 },
  Master(f32),
  Play { slot: u32, gain: Option<f32> },
  Stop,
  Mute(Option<bool>),
  Help,
  Quit,
}

fn parse_f32(s: &str) -> EngineResult<f32> {
  match s.parse::<f32>() {
    Ok(v) if v.is_finite() => Ok(v),
    _ => Err(EngineError::InvalidNumber(s.to_string())),
  }
}

fn arg<'a>(it: &mut impl Iterator<Item = &'a str>, name: &'static str) -> EngineResult<&'a str> {
  it.next().ok_or(EngineError::MissingArgument(name))
}

fn parse_slot(s: &str) -> EngineResult<u32> { s.parse::<u32>().map_err(|_| EngineError::InvalidNumber(s.to_string())) }

/// "pitch,reverb" and "pitch, reverb" both work; empty names are skipped.
fn effect_names<'a>(words: impl Iterator<Item = &'a str>, cmd: &'static str) -> EngineResult<Vec<String>> {
  let joined = words.collect::<Vec<_>>().join(",");
  let names: Vec<String> = joined.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect();
  if names.is_empty() { return Err(EngineError::MissingArgument(cmd)); }
  Ok(names)
}

/// Parses one control line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> EngineResult<Option<Command>> {
  let mut it = line.split_whitespace();
  let Some(word) = it.next() else { return Ok(None) };
  let cmd = match word.to_ascii_lowercase().as_str() {
    "effect" => {
      let first = arg(&mut it, "effect")?;
      match first.to_ascii_lowercase().as_str() {
        "off" => Command::EffectOff,
        "list" => match it.next() {
          Some(w) if w.eq_ignore_ascii_case("all") => Command::EffectListAll,
          _ => Command::EffectList,
        },
        "params" => Command::EffectParams,
        "add" => {
          let names = effect_names(it, "effect add")?;
          if names.len() == 1 && names[0].eq_ignore_ascii_case("all") {
            Command::EffectAdd(Additions::All)
          } else {
            Command::EffectAdd(Additions::Names(names))
          }
        }
        "remove" => {
          let key = arg(&mut it, "effect remove")?.to_ascii_lowercase();
          let removal = if key == "all" {
            Removal::All
          } else if let Ok(i) = key.parse::<usize>() {
            Removal::Index(i)
          } else {
            Removal::Prefix(key)
          };
          Command::EffectRemove(removal)
        }
        "param" => {
          let key = arg(&mut it, "effect param")?.to_string();
          let value = parse_f32(arg(&mut it, "effect param")?)?;
          Command::EffectParam { key, value }
        }
        _ => Command::Effect(effect_names(std::iter::once(first).chain(it), "effect")?),
      }
    }
    "gain" => {
      let first = arg(&mut it, "gain")?;
      match it.next() {
        Some(v) => Command::SlotGain { slot: parse_slot(first)?, gain: parse_f32(v)? },
        None => Command::Gain(parse_f32(first)?),
      }
    }
    "master" => Command::Master(parse_f32(arg(&mut it, "master")?)?),
    "play" => {
      let slot = parse_slot(arg(&mut it, "play")?)?;
      let gain = it.next().map(parse_f32).transpose()?;
      Command::Play { slot, gain }
    }
    "stop" => Command::Stop,
    "mute" => match it.next().map(|s| s.to_ascii_lowercase()) {
      None => Command::Mute(None),
      Some(s) if s == "on" => Command::Mute(Some(true)),
      Some(s) if s == "off" => Command::Mute(Some(false)),
      Some(s) => return Err(EngineError::UnknownCommand(format!("mute {s}"))),
    },
    "help" | "?" => Command::Help,
    "quit" | "exit" => Command::Quit,
    _ => return Err(EngineError::UnknownCommand(word.to_string())),
  };
  Ok(Some(cmd))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
  Reply(String),
  Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainTarget {
  Mic,
  Master,
}

struct LoadedSound {
  buffer: Arc<SoundBuffer>,
  gain: f32,
}

/// Control-thread side of the engine. Owns every writer handle; nothing here
/// touches audio-thread state directly.
pub struct Controller {
  params: Arc<ParamStore>,
  gains: Arc<Gains>,
  target: GainTarget,
  sample_rate: f32,
  chain: Option<ChainInstaller>,
  mixer: Option<MixerHandle>,
  sounds: HashMap<u32, LoadedSound>,
  mute: ManualSignal,
}

impl Controller {
  pub fn new(params: Arc<ParamStore>, gains: Arc<Gains>, target: GainTarget, sample_rate: f32, mute: ManualSignal) -> Self {
    Self { params, gains, target, sample_rate, chain: None, mixer: None, sounds: HashMap::new(), mute }
  }

  pub fn with_chain(mut self, chain: ChainInstaller) -> Self { self.chain = Some(chain); self }
  pub fn with_mixer(mut self, mixer: MixerHandle) -> Self { self.mixer = Some(mixer); self }

  pub fn add_sound(&mut self, slot: u32, buffer: Arc<SoundBuffer>, gain: f32) {
    self.sounds.insert(slot, LoadedSound { buffer, gain });
  }

  /// Loaded slots in ascending order.
  pub fn sound_slots(&self) -> Vec<u32> {
    let mut slots: Vec<u32> = self.sounds.keys().copied().collect();
    slots.sort_unstable();
    slots
  }

  pub fn handle_line(&mut self, line: &str) -> EngineResult<Option<Outcome>> {
    match parse_command(line)? {
      Some(cmd) => self.apply(cmd).map(Some),
      None => Ok(None),
    }
  }

  /// A rejected command leaves every piece of engine state as it was.
  pub fn apply(&mut self, cmd: Command) -> EngineResult<Outcome> {
    log::debug!("command: {cmd:?}");
    let reply = match cmd {
      Command::Effect(names) => {
        let sr = self.sample_rate;
        let installer = self.chain.as_mut().ok_or(EngineError::Unsupported("effect"))?;
        installer.install(EffectChain::from_names(&names, sr)?)?;
        format!("effect chain: {}", describe(installer.current()))
      }
      Command::EffectAdd(additions) => {
        let sr = self.sample_rate;
        let installer = self.chain.as_mut().ok_or(EngineError::Unsupported("effect"))?;
        let kinds = match additions {
          Additions::All => EffectKind::ALL.iter().copied().filter(|&k| k != EffectKind::PassThrough).collect(),
          Additions::Names(names) => {
            // resolve everything first so a bad name changes nothing
            let added = names.iter().map(|n| EffectKind::from_name(n)).collect::<EngineResult<Vec<_>>>()?;
            let mut kinds = installer.current().to_vec();
            for k in added {
              if k.is_exclusive() { kinds.retain(|&c| c != k); }
              kinds.push(k);
            }
            kinds
          }
        };
        installer.install(EffectChain::from_kinds(&kinds, sr))?;
        format!("effect chain: {}", describe(installer.current()))
      }
      Command::EffectRemove(removal) => {
        let sr = self.sample_rate;
        let installer = self.chain.as_mut().ok_or(EngineError::Unsupported("effect"))?;
        let mut kinds = installer.current().to_vec();
        match removal {
          Removal::All => kinds.clear(),
          Removal::Index(i) if i < kinds.len() => { kinds.remove(i); }
          Removal::Index(i) => return Err(EngineError::NotInChain(i.to_string())),
          Removal::Prefix(p) => {
            let i = kinds.iter().position(|k| k.name().starts_with(&p)).ok_or(EngineError::NotInChain(p))?;
            kinds.remove(i);
          }
        }
        installer.install(EffectChain::from_kinds(&kinds, sr))?;
        format!("effect chain: {}", describe(installer.current()))
      }
      Command::EffectOff => {
        let installer = self.chain.as_mut().ok_or(EngineError::Unsupported("effect"))?;
        installer.install(EffectChain::empty())?;
        "effects off".to_string()
      }
      Command::EffectParam { key, value } => {
        self.params.set(&key, value)?;
        format!("{} = {value}", key.to_ascii_uppercase())
      }
      Command::EffectList => {
        let current = self.chain.as_ref().map(|c| describe(c.current())).unwrap_or_else(|| "n/a".into());
        let available = EffectKind::ALL.iter().map(|k| k.name()).collect::<Vec<_>>().join(", ");
        format!("chain: {current}\navailable: {available}")
      }
      Command::EffectListAll => EffectKind::ALL.iter().map(|k| k.name()).collect::<Vec<_>>().join("\n"),
      Command::EffectParams => {
        let mut out = String::new();
        for (k, v) in self.params.entries() {
          let _ = writeln!(out, "{k:<20} {v}");
        }
        out.trim_end().to_string()
      }
      Command::Gain(v) => match self.target {
        GainTarget::Mic => { self.gains.mic.store(v); format!("mic gain = {v}") }
        GainTarget::Master => { self.gains.master.store(v); format!("master gain = {v}") }
      },
      Command::SlotGain { slot, gain } => {
        if self.mixer.is_none() { return Err(EngineError::Unsupported("gain <slot>")); }
        let sound = self.sounds.get_mut(&slot).ok_or(EngineError::EmptySlot(slot))?;
        sound.gain = gain;
        format!("slot {slot} gain = {gain}")
      }
      Command::Master(v) => {
        self.gains.master.store(v);
        format!("master gain = {v}")
      }
      Command::Play { slot, gain } => {
        let mixer = self.mixer.as_ref().ok_or(EngineError::Unsupported("play"))?;
        let sound = self.sounds.get(&slot).ok_or(EngineError::EmptySlot(slot))?;
        mixer.play(sound.buffer.clone(), sound.gain * gain.unwrap_or(1.0))?;
        format!("playing slot {slot}")
      }
      Command::Stop => {
        let mixer = self.mixer.as_ref().ok_or(EngineError::Unsupported("stop"))?;
        mixer.stop_all()?;
        "stopped".to_string()
      }
      Command::Mute(state) => {
        let on = match state {
          Some(on) => { self.mute.set(on); on }
          None => self.mute.toggle(),
        };
        if on { "muted".to_string() } else { "unmuted".to_string() }
      }
      Command::Help if self.mixer.is_some() => {
        let slots = self.sound_slots().iter().map(u32::to_string).collect::<Vec<_>>();
        let loaded = if slots.is_empty() { "(none)".to_string() } else { slots.join(", ") };
        format!("{HELP}\nloaded sounds: {loaded}")
      }
      Command::Help => HELP.to_string(),
      Command::Quit => return Ok(Outcome::Quit),
    };
    Ok(Outcome::Reply(reply))
  }

  pub fn is_muted(&self) -> bool { self.mute.is_on() }
}

/// Reads commands line by line until `quit` or end of input. Replies and
/// diagnostics go to `out`; nothing a line says can stop the loop except quit.
pub fn run_control<R: BufRead, W: Write>(ctl: &mut Controller, input: R, mut out: W) -> std::io::Result<()> {
  for line in input.lines() {
    match ctl.handle_line(&line?) {
      Ok(Some(Outcome::Reply(text))) => writeln!(out, "{text}")?,
      Ok(Some(Outcome::Quit)) => break,
      Ok(None) => {}
      Err(e) => {
        if !e.is_config() { log::warn!("command failed: {e}"); }
        writeln!(out, "error: {e}")?;
      }
    }
    out.flush()?;
  }
  Ok(())
}

fn describe(kinds: &[EffectKind]) -> String {
  if kinds.is_empty() {
    return "(none)".to_string();
  }
  kinds.iter().map(|k| k.name()).collect::<Vec<_>>().join(" -> ")
}
