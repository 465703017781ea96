//! Frame-driven playback scheduler.
//!
//! The host calls [`Heartbeat::tick`] once per display frame. Each tick adds
//! the (capped) wall-clock delta to a per-token timer and advances the index
//! whenever the timer covers the current token's required duration,
//! carrying the remainder over so timing never drifts.

use super::PlaybackConfig;
use crate::tokenizer::Token;
use std::time::{Duration, Instant};
use tracing::trace;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running.
    Idle,
    /// Running, but the current token has not elapsed yet (or there are no
    /// tokens yet).
    Waiting,
    /// The index moved forward.
    Advanced { from: usize, to: usize },
    /// Caught up with the last delivered token while more are pending.
    Stalled { at: usize },
    /// The last token of a complete sequence has elapsed. The heartbeat
    /// stopped itself.
    Finished { from: usize, at: usize },
}

/// Per-token timer plus the current index.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    config: PlaybackConfig,
    wpm: u32,
    index: usize,
    /// Seconds accumulated on the current token.
    elapsed: f64,
    last_tick: Option<Instant>,
    running: bool,
    /// Position in the ramp table, `None` once the ramp is spent.
    ramp_step: Option<usize>,
}

impl Heartbeat {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            wpm: config.clamp_wpm(config.wpm),
            config: config.clone(),
            index: 0,
            elapsed: 0.0,
            last_tick: None,
            running: false,
            ramp_step: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn wpm(&self) -> u32 {
        self.wpm
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// True while the slow-start ramp still applies.
    pub fn is_ramping(&self) -> bool {
        self.ramp_multiplier() > 1.0
    }

    /// Starts advancing from the current index.
    ///
    /// A cold start at index 0 arms the ramp; any other position disarms it.
    pub fn start(&mut self, now: Instant) {
        if self.running {
            return;
        }
        self.ramp_step = if self.index == 0 && !self.config.ramp.is_empty() {
            Some(0)
        } else {
            None
        };
        self.running = true;
        self.last_tick = Some(now);
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.last_tick = None;
    }

    /// Moves to `index` clamped to `[0, len - 1]` and resets the token timer.
    pub fn seek(&mut self, index: usize, len: usize, now: Instant) -> usize {
        self.index = index.min(len.saturating_sub(1));
        self.elapsed = 0.0;
        if self.running {
            self.last_tick = Some(now);
        } else if self.index == 0 && !self.config.ramp.is_empty() {
            self.ramp_step = Some(0);
        }
        self.index
    }

    /// Back to a stopped heartbeat at index 0.
    pub fn reset(&mut self) {
        self.stop();
        self.index = 0;
        self.elapsed = 0.0;
        self.ramp_step = None;
    }

    /// Sets the speed, clamped to the configured range. Time already spent
    /// on the current token is kept.
    pub fn set_wpm(&mut self, wpm: u32) -> u32 {
        self.wpm = self.config.clamp_wpm(wpm);
        self.wpm
    }

    fn ramp_multiplier(&self) -> f64 {
        self.ramp_step
            .and_then(|step| self.config.ramp.get(step).copied())
            .unwrap_or(1.0)
    }

    fn boost(&self, token: &Token) -> f64 {
        if token.is_sentence_end {
            let scaled =
                1.0 + self.config.sentence_boost_per_100_wpm * f64::from(self.wpm) / 100.0;
            scaled.min(self.config.max_sentence_boost).max(1.0)
        } else if token.ends_clause() {
            self.config.clause_boost
        } else {
            1.0
        }
    }

    /// Seconds `token` stays on screen at the current speed and ramp step.
    pub fn required_duration(&self, token: &Token) -> f64 {
        let base = 60.0 / f64::from(self.wpm.max(1));
        base * token.duration_multiplier * self.ramp_multiplier() * self.boost(token)
    }

    fn step_ramp(&mut self) {
        self.ramp_step = match self.ramp_step {
            Some(step) if step + 1 < self.config.ramp.len() => Some(step + 1),
            _ => None,
        };
    }

    /// Advances playback to `now`.
    ///
    /// `tokens` is the delivered prefix; `complete` says whether more will
    /// arrive. The heartbeat never moves past the last delivered token.
    pub fn tick(&mut self, tokens: &[Token], complete: bool, now: Instant) -> TickOutcome {
        if !self.running {
            return TickOutcome::Idle;
        }

        let max_delta = Duration::from_millis(self.config.max_frame_delta_ms);
        let delta = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default()
            .min(max_delta);
        self.last_tick = Some(now);

        if tokens.is_empty() {
            if complete {
                self.stop();
                return TickOutcome::Finished { from: 0, at: 0 };
            }
            return TickOutcome::Waiting;
        }

        self.index = self.index.min(tokens.len() - 1);
        self.elapsed += delta.as_secs_f64();
        let from = self.index;

        loop {
            let required = self.required_duration(&tokens[self.index]);
            if self.elapsed < required {
                break;
            }
            if self.index + 1 >= tokens.len() {
                if complete {
                    self.elapsed = 0.0;
                    self.stop();
                    trace!(at = self.index, "heartbeat finished");
                    return TickOutcome::Finished {
                        from,
                        at: self.index,
                    };
                }
                // Hold at the frontier until more tokens land.
                self.elapsed = required;
                if self.index == from {
                    return TickOutcome::Stalled { at: self.index };
                }
                break;
            }
            self.elapsed -= required;
            self.index += 1;
            self.step_ramp();
        }

        if self.index == from {
            TickOutcome::Waiting
        } else {
            TickOutcome::Advanced {
                from,
                to: self.index,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(index: usize) -> Token {
        Token {
            global_index: index,
            original_text: "word".to_string(),
            left_segment: "w".to_string(),
            center_character: "o".to_string(),
            right_segment: "rd".to_string(),
            punctuation: None,
            duration_multiplier: 1.0,
            is_sentence_end: false,
            is_paragraph_end: false,
            start_offset: index * 5,
        }
    }

    fn tokens(n: usize) -> Vec<Token> {
        (0..n).map(token).collect()
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    /// Ticks every 10 ms and records when each index was first shown.
    fn dwell_times(hb: &mut Heartbeat, tokens: &[Token], start: Instant, total_ms: u64) -> Vec<u64> {
        let mut shown_at = vec![0u64];
        let mut t = 0;
        while t < total_ms {
            t += 10;
            if let TickOutcome::Advanced { to, .. } = hb.tick(tokens, true, start + ms(t)) {
                while shown_at.len() <= to {
                    shown_at.push(t);
                }
            }
        }
        shown_at.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[test]
    fn idle_until_started() {
        let mut hb = Heartbeat::new(&PlaybackConfig::default());
        assert_eq!(hb.tick(&tokens(3), true, Instant::now()), TickOutcome::Idle);
    }

    #[test]
    fn cold_start_ramps_first_three_tokens_once() {
        let mut hb = Heartbeat::new(&PlaybackConfig::default());
        let toks = tokens(8);
        let start = Instant::now();
        hb.start(start);
        assert!(hb.is_ramping());

        let dwell = dwell_times(&mut hb, &toks, start, 1_500);
        // 0.2 s baseline slowed by 2.0, 1.5 and 1.2.
        for (got, want) in dwell.iter().zip([400u64, 300, 240, 200, 200]) {
            assert!(got.abs_diff(want) <= 10, "dwell {got} ms, expected {want} ms");
        }
        assert!(!hb.is_ramping());
    }

    #[test]
    fn resuming_mid_sequence_never_ramps() {
        let mut hb = Heartbeat::new(&PlaybackConfig::default());
        let toks = tokens(8);
        let start = Instant::now();
        hb.seek(3, toks.len(), start);
        hb.start(start);
        assert!(!hb.is_ramping());
        assert_eq!(hb.tick(&toks, true, start + ms(100)), TickOutcome::Waiting);
        assert_eq!(
            hb.tick(&toks, true, start + ms(210)),
            TickOutcome::Advanced { from: 3, to: 4 }
        );
    }

    #[test]
    fn remainder_carries_over() {
        let mut hb = Heartbeat::new(&PlaybackConfig::default());
        hb.set_wpm(1000); // 60 ms per token
        let toks = tokens(10);
        let start = Instant::now();
        hb.seek(1, toks.len(), start);
        hb.start(start);

        assert_eq!(
            hb.tick(&toks, true, start + ms(100)),
            TickOutcome::Advanced { from: 1, to: 2 }
        );
        // 40 ms carried over plus 30 ms covers the next 60 ms token.
        assert_eq!(
            hb.tick(&toks, true, start + ms(130)),
            TickOutcome::Advanced { from: 2, to: 3 }
        );
    }

    #[test]
    fn several_tokens_can_pass_in_one_frame() {
        let mut hb = Heartbeat::new(&PlaybackConfig::default());
        hb.set_wpm(1500); // 40 ms per token
        let toks = tokens(10);
        let start = Instant::now();
        hb.seek(1, toks.len(), start);
        hb.start(start);
        assert_eq!(
            hb.tick(&toks, true, start + ms(100)),
            TickOutcome::Advanced { from: 1, to: 3 }
        );
    }

    #[test]
    fn frame_delta_is_capped() {
        let mut hb = Heartbeat::new(&PlaybackConfig::default());
        let toks = tokens(10);
        let start = Instant::now();
        hb.seek(2, toks.len(), start);
        hb.start(start);
        // A five second stall counts as 100 ms.
        assert_eq!(hb.tick(&toks, true, start + ms(5_000)), TickOutcome::Waiting);
        assert_eq!(
            hb.tick(&toks, true, start + ms(5_110)),
            TickOutcome::Advanced { from: 2, to: 3 }
        );
    }

    #[test]
    fn stalls_at_frontier_until_more_tokens_arrive() {
        let mut hb = Heartbeat::new(&PlaybackConfig::default());
        hb.set_wpm(1500);
        let all = tokens(6);
        let start = Instant::now();
        hb.seek(1, 3, start);
        hb.start(start);

        assert_eq!(
            hb.tick(&all[..3], false, start + ms(100)),
            TickOutcome::Advanced { from: 1, to: 2 }
        );
        assert_eq!(
            hb.tick(&all[..3], false, start + ms(200)),
            TickOutcome::Stalled { at: 2 }
        );
        assert!(hb.is_running());

        // The held token is due, so the next frame moves on at once.
        assert_eq!(
            hb.tick(&all, false, start + ms(210)),
            TickOutcome::Advanced { from: 2, to: 3 }
        );
    }

    #[test]
    fn finishes_at_true_end() {
        let mut hb = Heartbeat::new(&PlaybackConfig::default());
        hb.set_wpm(1500);
        let toks = tokens(3);
        let start = Instant::now();
        hb.seek(2, toks.len(), start);
        hb.start(start);
        assert_eq!(
            hb.tick(&toks, true, start + ms(50)),
            TickOutcome::Finished { from: 2, at: 2 }
        );
        assert!(!hb.is_running());
        assert_eq!(hb.index(), 2);
    }

    #[test]
    fn seek_clamps_and_resets_timer() {
        let mut hb = Heartbeat::new(&PlaybackConfig::default());
        let now = Instant::now();
        assert_eq!(hb.seek(99, 5, now), 4);
        assert_eq!(hb.seek(0, 0, now), 0);
        assert_eq!(hb.seek(3, 5, now), 3);
    }

    #[test]
    fn seek_to_zero_while_stopped_arms_ramp() {
        let mut hb = Heartbeat::new(&PlaybackConfig::default());
        let now = Instant::now();
        hb.seek(0, 5, now);
        assert!(hb.is_ramping());
    }

    #[test]
    fn sentence_boost_grows_with_speed() {
        let mut hb = Heartbeat::new(&PlaybackConfig::default());
        hb.seek(1, 2, Instant::now());
        let mut end = token(0);
        end.is_sentence_end = true;
        end.punctuation = Some(".".to_string());

        hb.set_wpm(100);
        let slow = hb.required_duration(&end) / hb.required_duration(&token(0));
        hb.set_wpm(1000);
        let fast = hb.required_duration(&end) / hb.required_duration(&token(0));
        assert!((slow - 1.05).abs() < 1e-9);
        assert!((fast - 1.5).abs() < 1e-9);

        hb.set_wpm(1500);
        let capped = hb.required_duration(&end) / hb.required_duration(&token(0));
        assert!((capped - 1.6).abs() < 1e-9);
    }

    #[test]
    fn clause_punctuation_gets_fixed_boost() {
        let hb = Heartbeat::new(&PlaybackConfig::default());
        let mut clause = token(0);
        clause.punctuation = Some(",".to_string());
        let ratio = hb.required_duration(&clause) / hb.required_duration(&token(0));
        assert!((ratio - 1.1).abs() < 1e-9);
    }

    #[test]
    fn wpm_is_clamped() {
        let mut hb = Heartbeat::new(&PlaybackConfig::default());
        assert_eq!(hb.set_wpm(0), 50);
        assert_eq!(hb.set_wpm(5_000), 1500);
    }

    #[test]
    fn changing_wpm_keeps_elapsed_time() {
        let mut hb = Heartbeat::new(&PlaybackConfig::default());
        let toks = tokens(5);
        let start = Instant::now();
        hb.seek(1, toks.len(), start);
        hb.start(start);
        // 150 of 200 ms elapsed at 300 WPM.
        hb.tick(&toks, true, start + ms(100));
        hb.tick(&toks, true, start + ms(150));
        // At 600 WPM the token only needs 100 ms, already covered.
        hb.set_wpm(600);
        assert_eq!(
            hb.tick(&toks, true, start + ms(151)),
            TickOutcome::Advanced { from: 1, to: 2 }
        );
    }
}
