use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use voxrelay::commands::{run_control, Controller, GainTarget};
use voxrelay::engine::mixer::{mixer_pair, MixingEngine};
use voxrelay::engine::params::{Gains, ParamStore};
use voxrelay::engine::relay::RelayChannel;
use voxrelay::engine::signal::ManualSignal;
use voxrelay::engine::voice::SoundBuffer;

const SR: u32 = 48_000;
const BLOCK: usize = 256;

struct Board {
  ctl: Controller,
  engine: MixingEngine,
  relay: Arc<RelayChannel>,
  gains: Arc<Gains>,
}

fn board() -> Board {
  let params = Arc::new(ParamStore::new());
  let gains = Arc::new(Gains::new(1.0, 1.0));
  let mute = Arc::new(AtomicBool::new(false));
  let relay = Arc::new(RelayChannel::new(4));
  let (handle, engine) = mixer_pair(SR, 2, gains.clone(), mute, relay.clone());
  let mut ctl = Controller::new(params, gains.clone(), GainTarget::Master, SR as f32, ManualSignal::new()).with_mixer(handle);
  ctl.add_sound(1, Arc::new(SoundBuffer::new(vec![0.25; BLOCK * 2 * 3], 2, SR)), 1.0);
  ctl.add_sound(2, Arc::new(SoundBuffer::new(vec![0.5; BLOCK * 2], 2, SR)), 0.5);
  Board { ctl, engine, relay, gains }
}

fn drive(ctl: &mut Controller, script: &str) -> String {
  let mut out = Vec::new();
  run_control(ctl, Cursor::new(script), &mut out).unwrap();
  String::from_utf8(out).unwrap()
}

#[test]
fn played_sounds_reach_both_outputs() {
  let mut b = board();
  let replies = drive(&mut b.ctl, "play 1\nplay 2\n");
  assert_eq!(replies, "playing slot 1\nplaying slot 2\n");

  let mut primary = vec![0.0f32; BLOCK * 2];
  b.engine.render(&mut primary);
  // 0.25 + 0.5 * 0.5
  assert!(primary.iter().all(|&s| (s - 0.5).abs() < 1e-6));
  assert_eq!(b.engine.active_voices(), 1);

  let mut secondary = vec![0.0f32; BLOCK * 2];
  assert_eq!(b.relay.pop_into(&mut secondary), BLOCK * 2);
  assert_eq!(primary, secondary);
}

#[test]
fn bad_lines_are_reported_and_the_loop_keeps_going() {
  let mut b = board();
  let replies = drive(&mut b.ctl, "play 9\nmaster abc\neffect pitch\ngain 0.5\nquit\nplay 1\n");
  let lines: Vec<&str> = replies.lines().collect();
  assert_eq!(lines.len(), 4);
  assert!(lines[0].starts_with("error: no sound loaded in slot 9"));
  assert!(lines[1].starts_with("error: not a number"));
  assert!(lines[2].starts_with("error:"));
  assert_eq!(lines[3], "master gain = 0.5");
  // quit stopped the loop before the last play
  let mut out = vec![0.0f32; BLOCK * 2];
  b.engine.render(&mut out);
  assert_eq!(b.engine.active_voices(), 0);
  assert_eq!(b.gains.master.load(), 0.5);
}

#[test]
fn stop_flushes_voices_and_relay() {
  let mut b = board();
  drive(&mut b.ctl, "play 1\n");
  let mut out = vec![0.0f32; BLOCK * 2];
  b.engine.render(&mut out);
  b.engine.render(&mut out);
  assert_eq!(b.relay.len(), 2);

  assert_eq!(drive(&mut b.ctl, "stop\n"), "stopped\n");
  b.engine.render(&mut out);
  assert_eq!(b.engine.active_voices(), 0);
  assert!(out.iter().all(|&s| s == 0.0));
  // the pre-stop blocks are gone; only the silent one follows
  assert_eq!(b.relay.len(), 1);
  let mut relayed = vec![1.0f32; BLOCK * 2];
  assert_eq!(b.relay.pop_into(&mut relayed), BLOCK * 2);
  assert!(relayed.iter().all(|&s| s == 0.0));
}

#[test]
fn relay_lag_drops_oldest_blocks_only() {
  let mut b = board();
  drive(&mut b.ctl, "play 1\n");
  let mut out = vec![0.0f32; BLOCK * 2];
  for _ in 0..6 { b.engine.render(&mut out); }
  assert_eq!(b.relay.len(), 4);
  assert_eq!(b.relay.dropped(), 2);
}

#[test]
fn mute_signal_silences_the_mixer() {
  let params = Arc::new(ParamStore::new());
  let gains = Arc::new(Gains::new(1.0, 1.0));
  let mute = Arc::new(AtomicBool::new(false));
  let relay = Arc::new(RelayChannel::new(4));
  let (handle, mut engine) = mixer_pair(SR, 1, gains.clone(), mute.clone(), relay);
  let manual = ManualSignal::new();
  let mut ctl = Controller::new(params, gains, GainTarget::Master, SR as f32, manual.clone()).with_mixer(handle.clone());
  ctl.add_sound(1, Arc::new(SoundBuffer::new(vec![0.3; 4096], 1, SR)), 1.0);

  let watcher = voxrelay::engine::signal::watch(
    manual,
    mute.clone(),
    move || { let _ = handle.stop_all(); },
    std::time::Duration::from_millis(1),
  );
  drive(&mut ctl, "play 1\nmute on\n");
  let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
  while !mute.load(Ordering::Relaxed) && std::time::Instant::now() < deadline {
    std::thread::sleep(std::time::Duration::from_millis(1));
  }
  let mut out = vec![1.0f32; 128];
  engine.render(&mut out);
  assert!(out.iter().all(|&s| s == 0.0));
  drop(watcher);
}

#[test]
fn slot_gain_sticks_for_later_plays() {
  let mut b = board();
  let replies = drive(&mut b.ctl, "gain 1 0.5\nplay 1\ngain 7 0.5\n");
  let lines: Vec<&str> = replies.lines().collect();
  assert_eq!(lines[0], "slot 1 gain = 0.5");
  assert_eq!(lines[1], "playing slot 1");
  assert!(lines[2].starts_with("error: no sound loaded in slot 7"));
  // master untouched by the per-slot form
  assert_eq!(b.gains.master.load(), 1.0);

  let mut out = vec![0.0f32; BLOCK * 2];
  b.engine.render(&mut out);
  assert!(out.iter().all(|&s| (s - 0.125).abs() < 1e-6));

  drive(&mut b.ctl, "play 1 2\n");
  b.engine.render(&mut out);
  // first voice still at 0.125, second at 0.25 * 0.5 * 2
  assert!(out.iter().all(|&s| (s - 0.375).abs() < 1e-6));
}

#[test]
fn help_lists_loaded_slots_on_the_board() {
  let mut b = board();
  let replies = drive(&mut b.ctl, "help\n");
  assert!(replies.trim_end().ends_with("loaded sounds: 1, 2"));
}
