// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playback control for timelines.
//!
//! Playback is an explicit state machine advanced by [`Timeline::tick`].
//! Every time change goes through the scheduler, so wraps and stops
//! produce the same crossings as scrubbing would.

use crate::binding::SceneBinder;
use crate::curve::WrapMode;
use crate::error::CutsceneError;
use crate::settings::DirectorContext;
use crate::timeline::Timeline;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Direction of playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayDirection {
    /// Increasing time
    #[default]
    Forward,
    /// Decreasing time
    Backward,
}

impl PlayDirection {
    /// The opposite direction
    pub fn flipped(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

/// How a stop leaves the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopMode {
    /// Jump to the end of the play range in the play direction
    #[default]
    Skip,
    /// Jump back to where playback began
    Rewind,
    /// Stay at the current time
    Hold,
}

/// Notification raised by playback, drained with [`Timeline::take_events`]
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Playback started
    Started,
    /// Playback paused
    Paused,
    /// Playback resumed
    Resumed,
    /// Playback stopped
    Stopped(StopMode),
    /// Loop wrapped around
    Looped,
    /// Ping-pong turned around
    DirectionChanged(PlayDirection),
    /// A section marker was crossed
    SectionReached(String),
}

/// Control request raised from inside a node callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackRequest {
    /// Stop with a mode
    Stop(StopMode),
    /// Pause
    Pause,
}

/// Playback state of a timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    /// Current time
    pub current_time: f32,
    /// A play session is running (possibly paused)
    pub is_active: bool,
    /// Time advancement is suspended
    pub is_paused: bool,
    /// Play direction
    pub direction: PlayDirection,
    /// Behaviour at the end of the play range
    pub wrap: WrapMode,
    /// Start of the play range
    pub play_start: f32,
    /// End of the play range
    pub play_end: f32,
    /// Per-timeline speed multiplier
    pub speed: f32,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            is_active: false,
            is_paused: false,
            direction: PlayDirection::Forward,
            wrap: WrapMode::Once,
            play_start: 0.0,
            play_end: 0.0,
            speed: 1.0,
        }
    }
}

impl PlaybackState {
    /// Playing and not paused
    pub fn is_playing(&self) -> bool {
        self.is_active && !self.is_paused
    }
}

impl Timeline {
    /// Playback state
    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    /// Set the per-timeline speed multiplier
    pub fn set_speed(&mut self, speed: f32) {
        self.playback.speed = speed.max(0.0);
    }

    /// Drain pending playback events
    pub fn take_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    /// Play the whole timeline forward once
    pub fn play_all(&mut self, ctx: &DirectorContext, scene: &mut dyn SceneBinder) -> Result<()> {
        let length = self.length();
        self.play(ctx, scene, 0.0, length, WrapMode::Once, PlayDirection::Forward)
    }

    /// Start playing the range `[start, end]`.
    ///
    /// Backward playback accepts the range in either order. Calling this
    /// on a paused session resumes it.
    pub fn play(
        &mut self,
        ctx: &DirectorContext,
        scene: &mut dyn SceneBinder,
        start: f32,
        end: f32,
        wrap: WrapMode,
        direction: PlayDirection,
    ) -> Result<()> {
        let (start, end) = if start > end {
            if direction != PlayDirection::Backward {
                tracing::warn!(start, end, "Play range start is after its end");
                return Err(CutsceneError::InvalidRange { start, end });
            }
            (end, start)
        } else {
            (start, end)
        };

        if self.playback.is_active {
            if self.playback.is_paused {
                self.resume();
            } else {
                tracing::warn!(timeline = %self.name, "Timeline is already playing");
            }
            return Ok(());
        }

        let length = self.length();
        self.playback = PlaybackState {
            current_time: self.playback.current_time,
            is_active: true,
            is_paused: false,
            direction,
            wrap,
            play_start: start.clamp(0.0, length),
            play_end: end.clamp(0.0, length),
            speed: self.playback.speed,
        };
        let from = match direction {
            PlayDirection::Forward => self.playback.play_start,
            PlayDirection::Backward => self.playback.play_end,
        };
        self.sample_inner(ctx, scene, from);
        self.events.push(PlaybackEvent::Started);
        tracing::info!(
            timeline = %self.name,
            start = self.playback.play_start,
            end = self.playback.play_end,
            ?wrap,
            ?direction,
            "Playback started"
        );
        self.apply_requests(ctx, scene);
        Ok(())
    }

    /// Stop the session.
    ///
    /// Stopping an inactive timeline does nothing.
    pub fn stop(&mut self, ctx: &DirectorContext, scene: &mut dyn SceneBinder, mode: StopMode) {
        if !self.playback.is_active {
            tracing::warn!(timeline = %self.name, "Stop called on an inactive timeline");
            return;
        }
        self.playback.is_active = false;
        self.playback.is_paused = false;

        let forward = self.playback.direction == PlayDirection::Forward;
        let (start, end) = (self.playback.play_start, self.playback.play_end);
        let target = match mode {
            StopMode::Skip => Some(if forward { end } else { start }),
            StopMode::Rewind => Some(if forward { start } else { end }),
            StopMode::Hold => None,
        };
        if let Some(time) = target {
            self.sample_inner(ctx, scene, time);
        }
        self.requests.clear();
        self.events.push(PlaybackEvent::Stopped(mode));
        tracing::info!(timeline = %self.name, ?mode, time = self.current_time(), "Playback stopped");
    }

    /// Suspend time advancement
    pub fn pause(&mut self) {
        if self.playback.is_active && !self.playback.is_paused {
            self.playback.is_paused = true;
            self.events.push(PlaybackEvent::Paused);
            tracing::info!(timeline = %self.name, "Playback paused");
        }
    }

    /// Resume a paused session
    pub fn resume(&mut self) {
        if self.playback.is_paused {
            self.playback.is_paused = false;
            self.events.push(PlaybackEvent::Resumed);
            tracing::info!(timeline = %self.name, "Playback resumed");
        }
    }

    /// Advance playback by `delta_time` seconds.
    ///
    /// A paused session re-samples the current time so externally changed
    /// values are overwritten again.
    pub fn tick(&mut self, ctx: &DirectorContext, scene: &mut dyn SceneBinder, delta_time: f32) {
        if !self.playback.is_active {
            return;
        }
        if self.playback.is_paused {
            let time = self.playback.current_time;
            self.sample_inner(ctx, scene, time);
            self.apply_requests(ctx, scene);
            return;
        }

        let step = delta_time.max(0.0) * ctx.settings.playback_speed * self.playback.speed;
        let PlaybackState {
            current_time,
            play_start,
            play_end,
            direction,
            ..
        } = self.playback;

        match direction {
            PlayDirection::Forward => {
                let time = current_time + step;
                if time < play_end {
                    self.sample_inner(ctx, scene, time);
                } else {
                    self.sample_inner(ctx, scene, play_end);
                    self.wrap_at_boundary(ctx, scene, time - play_end);
                }
            }
            PlayDirection::Backward => {
                let time = current_time - step;
                if time > play_start {
                    self.sample_inner(ctx, scene, time);
                } else {
                    self.sample_inner(ctx, scene, play_start);
                    self.wrap_at_boundary(ctx, scene, play_start - time);
                }
            }
        }
        self.apply_requests(ctx, scene);
    }

    /// Handle reaching the end of the play range in the current direction
    fn wrap_at_boundary(&mut self, ctx: &DirectorContext, scene: &mut dyn SceneBinder, overshoot: f32) {
        let PlaybackState {
            play_start,
            play_end,
            direction,
            wrap,
            ..
        } = self.playback;
        let range = play_end - play_start;
        if wrap == WrapMode::Once || range <= 0.0 {
            self.stop(ctx, scene, ctx.settings.default_stop_mode);
            return;
        }
        let overshoot = overshoot % range;
        let epsilon = ctx.settings.loop_epsilon;

        match wrap {
            WrapMode::Loop => {
                let offset = overshoot.max(epsilon);
                match direction {
                    PlayDirection::Forward => {
                        self.sample_inner(ctx, scene, play_start);
                        self.sample_inner(ctx, scene, (play_start + offset).min(play_end));
                    }
                    PlayDirection::Backward => {
                        self.sample_inner(ctx, scene, play_end);
                        self.sample_inner(ctx, scene, (play_end - offset).max(play_start));
                    }
                }
                self.events.push(PlaybackEvent::Looped);
                tracing::debug!(timeline = %self.name, time = self.current_time(), "Playback looped");
            }
            WrapMode::PingPong => {
                let direction = direction.flipped();
                self.playback.direction = direction;
                let time = match direction {
                    PlayDirection::Forward => play_start + overshoot,
                    PlayDirection::Backward => play_end - overshoot,
                };
                self.sample_inner(ctx, scene, time);
                self.events.push(PlaybackEvent::DirectionChanged(direction));
                tracing::debug!(timeline = %self.name, ?direction, "Playback changed direction");
            }
            WrapMode::Once => {}
        }
    }

    /// Jump to a named section without playing
    pub fn jump_to_section(&mut self, ctx: &DirectorContext, scene: &mut dyn SceneBinder, name: &str) -> Result<()> {
        let time = self
            .section(name)
            .map(|s| s.time)
            .ok_or_else(|| CutsceneError::SectionNotFound(name.to_string()))?;
        self.sample(ctx, scene, time);
        Ok(())
    }

    /// Play from a named section to the next section (or the end)
    pub fn play_section(
        &mut self,
        ctx: &DirectorContext,
        scene: &mut dyn SceneBinder,
        name: &str,
        wrap: WrapMode,
    ) -> Result<()> {
        let start = self
            .section(name)
            .map(|s| s.time)
            .ok_or_else(|| CutsceneError::SectionNotFound(name.to_string()))?;
        let end = self
            .sections()
            .into_iter()
            .map(|s| s.time)
            .find(|t| *t > start)
            .unwrap_or(self.length());
        self.play(ctx, scene, start, end, wrap, PlayDirection::Forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directables::ANIMATE_PROPERTIES;
    use crate::node::NodeState;
    use crate::testing::Fixture;
    use crate::value::ParamValue;

    fn play(fx: &mut Fixture, wrap: WrapMode, direction: PlayDirection) {
        let length = fx.timeline.length();
        fx.timeline
            .play(&fx.ctx, &mut fx.scene, 0.0, length, wrap, direction)
            .unwrap();
    }

    #[test]
    fn test_loop_wraps_and_reenters() {
        let mut fx = Fixture::new();
        let clip = fx.add_probe("A", 0.0, 5.0);
        play(&mut fx, WrapMode::Loop, PlayDirection::Forward);
        fx.tick(6.0);
        fx.clear_log();

        fx.tick(5.0);
        assert!((fx.timeline.current_time() - 1.0).abs() < 1e-4);
        let log = fx.log_for(clip);
        assert!(log.contains(&"reverse".to_string()));
        assert_eq!(log.iter().filter(|l| *l == "enter").count(), 1);
        assert_eq!(fx.timeline.node_state(clip), Some(NodeState::Active));
        assert!(fx.timeline.take_events().contains(&PlaybackEvent::Looped));
    }

    #[test]
    fn test_loop_overshoot_lands_past_start() {
        let mut fx = Fixture::new();
        fx.add_probe("A", 0.0, 5.0);
        play(&mut fx, WrapMode::Loop, PlayDirection::Forward);
        fx.tick(11.0);
        assert!((fx.timeline.current_time() - 1.0).abs() < 1e-4);
        assert!(fx.timeline.playback().is_active);
    }

    #[test]
    fn test_loop_boundary_exits_once_then_enters_once() {
        let mut fx = Fixture::new();
        let clip = fx.add_probe("A", 0.0, 10.0);
        play(&mut fx, WrapMode::Loop, PlayDirection::Forward);
        fx.tick(11.0);
        assert!((fx.timeline.current_time() - 1.0).abs() < 1e-4);

        let log = fx.log_for(clip);
        let count = |entries: &[String], name: &str| entries.iter().filter(|l| *l == name).count();
        assert_eq!(count(&log, "exit"), 1);
        assert_eq!(count(&log, "reverse"), 1);
        assert_eq!(count(&log, "enter"), 2);

        let exit = log.iter().position(|l| l == "exit").unwrap();
        let after_exit = &log[exit + 1..];
        assert_eq!(count(after_exit, "enter"), 1);
        assert_eq!(after_exit.last().map(String::as_str), Some("update 1 0"));
        assert_eq!(fx.timeline.node_state(clip), Some(NodeState::Active));
    }

    #[test]
    fn test_loop_exact_boundary_uses_epsilon() {
        let mut fx = Fixture::new();
        play(&mut fx, WrapMode::Loop, PlayDirection::Forward);
        fx.tick(10.0);
        let t = fx.timeline.current_time();
        assert!(t > 0.0 && t < 0.001);
    }

    #[test]
    fn test_once_stops_at_end() {
        let mut fx = Fixture::new();
        let clip = fx.add_probe("A", 2.0, 3.0);
        play(&mut fx, WrapMode::Once, PlayDirection::Forward);
        fx.tick(4.0);
        fx.tick(8.0);
        assert!(!fx.timeline.playback().is_active);
        assert_eq!(fx.timeline.current_time(), 10.0);
        assert_eq!(fx.timeline.node_state(clip), Some(NodeState::Exited));
        assert!(fx
            .timeline
            .take_events()
            .contains(&PlaybackEvent::Stopped(StopMode::Skip)));
    }

    #[test]
    fn test_ping_pong_reflects_time() {
        let mut fx = Fixture::new();
        play(&mut fx, WrapMode::PingPong, PlayDirection::Forward);
        fx.tick(12.0);
        assert!((fx.timeline.current_time() - 8.0).abs() < 1e-4);
        assert_eq!(fx.timeline.playback().direction, PlayDirection::Backward);

        fx.tick(10.0);
        assert!((fx.timeline.current_time() - 2.0).abs() < 1e-4);
        assert_eq!(fx.timeline.playback().direction, PlayDirection::Forward);
    }

    #[test]
    fn test_backward_play_starts_at_end() {
        let mut fx = Fixture::new();
        let clip = fx.add_probe("A", 2.0, 3.0);
        fx.timeline
            .play(&fx.ctx, &mut fx.scene, 10.0, 0.0, WrapMode::Once, PlayDirection::Backward)
            .unwrap();
        assert_eq!(fx.timeline.current_time(), 10.0);
        assert_eq!(fx.timeline.node_state(clip), Some(NodeState::Exited));

        fx.tick(6.0);
        assert_eq!(fx.timeline.node_state(clip), Some(NodeState::Active));
        fx.tick(6.0);
        assert!(!fx.timeline.playback().is_active);
        assert_eq!(fx.timeline.current_time(), 0.0);
    }

    #[test]
    fn test_forward_reversed_range_is_rejected() {
        let mut fx = Fixture::new();
        let result = fx
            .timeline
            .play(&fx.ctx, &mut fx.scene, 5.0, 1.0, WrapMode::Once, PlayDirection::Forward);
        assert!(matches!(result, Err(CutsceneError::InvalidRange { .. })));
        assert!(!fx.timeline.playback().is_active);
    }

    #[test]
    fn test_stop_modes() {
        let mut fx = Fixture::new();
        let clip = fx.add_clip(ANIMATE_PROPERTIES, 2.0, 4.0);
        fx.add_intensity_keys(clip, &[(0.0, 5.0), (4.0, 9.0)]);

        play(&mut fx, WrapMode::Once, PlayDirection::Forward);
        fx.tick(3.0);
        fx.timeline.stop(&fx.ctx, &mut fx.scene, StopMode::Hold);
        assert_eq!(fx.timeline.current_time(), 3.0);
        assert_eq!(fx.intensity(), Some(ParamValue::Float(6.0)));

        play(&mut fx, WrapMode::Once, PlayDirection::Forward);
        fx.timeline.stop(&fx.ctx, &mut fx.scene, StopMode::Skip);
        assert_eq!(fx.timeline.current_time(), 10.0);
        assert_eq!(fx.intensity(), Some(ParamValue::Float(9.0)));

        play(&mut fx, WrapMode::Once, PlayDirection::Forward);
        fx.timeline.stop(&fx.ctx, &mut fx.scene, StopMode::Rewind);
        assert_eq!(fx.timeline.current_time(), 0.0);
        assert_eq!(fx.intensity(), Some(ParamValue::Float(1.0)));
    }

    #[test]
    fn test_stop_when_inactive_is_noop() {
        let mut fx = Fixture::new();
        fx.timeline.stop(&fx.ctx, &mut fx.scene, StopMode::Skip);
        assert!(fx.timeline.take_events().is_empty());
        assert_eq!(fx.timeline.current_time(), 0.0);
    }

    #[test]
    fn test_pause_keeps_sampling() {
        let mut fx = Fixture::new();
        let clip = fx.add_clip(ANIMATE_PROPERTIES, 0.0, 10.0);
        fx.add_intensity_keys(clip, &[(0.0, 5.0), (10.0, 5.0)]);
        play(&mut fx, WrapMode::Once, PlayDirection::Forward);
        fx.tick(2.0);

        fx.timeline.pause();
        fx.scene.set(fx.actor, &crate::binding::MemberPath::new("Light", "intensity"), ParamValue::Float(0.0));
        fx.tick(1.0);
        assert_eq!(fx.timeline.current_time(), 2.0);
        assert_eq!(fx.intensity(), Some(ParamValue::Float(5.0)));

        play(&mut fx, WrapMode::Once, PlayDirection::Forward);
        assert!(!fx.timeline.playback().is_paused);
        let events = fx.timeline.take_events();
        assert!(events.contains(&PlaybackEvent::Paused));
        assert!(events.contains(&PlaybackEvent::Resumed));
        fx.tick(1.0);
        assert_eq!(fx.timeline.current_time(), 3.0);
    }

    #[test]
    fn test_stop_requested_from_callback() {
        let mut fx = Fixture::new();
        let clip = fx.add_probe("Stopper", 4.0, 2.0);
        fx.set_stopping(clip, "enter", StopMode::Hold);
        play(&mut fx, WrapMode::Once, PlayDirection::Forward);
        fx.tick(5.0);
        assert!(!fx.timeline.playback().is_active);
        assert_eq!(fx.timeline.current_time(), 5.0);
    }

    #[test]
    fn test_speed_multiplier() {
        let mut fx = Fixture::new();
        fx.timeline.set_speed(2.0);
        play(&mut fx, WrapMode::Once, PlayDirection::Forward);
        fx.tick(1.5);
        assert_eq!(fx.timeline.current_time(), 3.0);
    }

    #[test]
    fn test_sections() {
        let mut fx = Fixture::new();
        fx.timeline.add_section(fx.group, "Intro", 0.0).unwrap();
        fx.timeline.add_section(fx.group, "Fight", 4.0).unwrap();
        fx.timeline.add_section(fx.group, "Outro", 7.0).unwrap();

        fx.timeline.jump_to_section(&fx.ctx, &mut fx.scene, "Outro").unwrap();
        assert_eq!(fx.timeline.current_time(), 7.0);
        assert!(matches!(
            fx.timeline.jump_to_section(&fx.ctx, &mut fx.scene, "Missing"),
            Err(CutsceneError::SectionNotFound(_))
        ));

        fx.timeline
            .play_section(&fx.ctx, &mut fx.scene, "Fight", WrapMode::Once)
            .unwrap();
        assert_eq!(fx.timeline.current_time(), 4.0);
        assert_eq!(fx.timeline.playback().play_end, 7.0);
        fx.tick(5.0);
        assert_eq!(fx.timeline.current_time(), 7.0);
        assert!(fx
            .timeline
            .take_events()
            .contains(&PlaybackEvent::SectionReached("Outro".into())));
    }
}
