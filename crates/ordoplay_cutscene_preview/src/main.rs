// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless cutscene preview.
//!
//! Loads a scene and a cutscene from RON files, plays the cutscene at a
//! fixed frame rate and logs playback events and the final member values.
//!
//! ```text
//! cutscene_preview <cutscene.ron> <scene.ron> [--settings <file>] [--wrap once|loop|pingpong] [--duration <secs>]
//! ```

use ordoplay_cutscene::{
    CutsceneError, DirectorContext, MemoryScene, PlayDirection, PlaybackEvent, SequencerSettings, Timeline, WrapMode,
};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Preview failures
#[derive(Debug, thiserror::Error)]
enum PreviewError {
    /// Bad command line
    #[error("{0}\nusage: cutscene_preview <cutscene.ron> <scene.ron> [--settings <file>] [--wrap once|loop|pingpong] [--duration <secs>]")]
    Usage(String),

    /// Cutscene core error
    #[error(transparent)]
    Cutscene(#[from] CutsceneError),
}

/// Parsed command line
struct Options {
    cutscene: PathBuf,
    scene: PathBuf,
    settings: Option<PathBuf>,
    wrap: WrapMode,
    duration: Option<f32>,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, PreviewError> {
        let mut positional = Vec::new();
        let mut settings = None;
        let mut wrap = WrapMode::Once;
        let mut duration = None;

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| PreviewError::Usage(format!("missing value for {flag}")))
            };
            match arg.as_str() {
                "--settings" => settings = Some(PathBuf::from(value("--settings")?)),
                "--wrap" => {
                    wrap = match value("--wrap")?.as_str() {
                        "once" => WrapMode::Once,
                        "loop" => WrapMode::Loop,
                        "pingpong" => WrapMode::PingPong,
                        other => return Err(PreviewError::Usage(format!("unknown wrap mode: {other}"))),
                    }
                }
                "--duration" => {
                    let raw = value("--duration")?;
                    duration = Some(
                        raw.parse()
                            .map_err(|_| PreviewError::Usage(format!("invalid duration: {raw}")))?,
                    );
                }
                _ => positional.push(PathBuf::from(arg)),
            }
        }

        let mut positional = positional.into_iter();
        let (Some(cutscene), Some(scene), None) = (positional.next(), positional.next(), positional.next()) else {
            return Err(PreviewError::Usage("expected a cutscene file and a scene file".into()));
        };
        Ok(Self {
            cutscene,
            scene,
            settings,
            wrap,
            duration,
        })
    }
}

fn run(options: Options) -> Result<(), PreviewError> {
    let settings = match &options.settings {
        Some(path) => SequencerSettings::load(path)?,
        None => SequencerSettings::default(),
    };
    let frame_time = 1.0 / settings.frame_rate.max(1.0);
    let ctx = DirectorContext::new(settings);

    let mut scene = MemoryScene::load(&options.scene)?;
    let mut timeline = Timeline::load(&options.cutscene)?;
    timeline.revalidate(&ctx, &mut scene);

    let length = timeline.length();
    let duration = options.duration.unwrap_or(match options.wrap {
        WrapMode::Once => length,
        WrapMode::Loop | WrapMode::PingPong => length * 2.0,
    });

    timeline.play(&ctx, &mut scene, 0.0, length, options.wrap, PlayDirection::Forward)?;

    let mut elapsed = 0.0;
    while timeline.playback().is_active && elapsed < duration {
        timeline.tick(&ctx, &mut scene, frame_time);
        elapsed += frame_time;
        for event in timeline.take_events() {
            log_event(&event, timeline.current_time());
        }
    }
    if timeline.playback().is_active {
        timeline.stop(&ctx, &mut scene, ctx.settings.default_stop_mode);
    }
    for event in timeline.take_events() {
        log_event(&event, timeline.current_time());
    }

    for id in scene.entity_ids() {
        if let Some(entity) = scene.entity(id) {
            for (member, value) in &entity.members {
                tracing::info!(entity = %entity.name, %member, ?value, "Final value");
            }
        }
    }
    Ok(())
}

fn log_event(event: &PlaybackEvent, time: f32) {
    match event {
        PlaybackEvent::SectionReached(name) => tracing::info!(time, section = %name, "Section reached"),
        other => tracing::info!(time, event = ?other, "Playback event"),
    }
}

fn main() {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["ordoplay_cutscene=debug", "cutscene_preview=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting cutscene preview v{}", env!("CARGO_PKG_VERSION"));

    let result = Options::parse(std::env::args().skip(1)).and_then(run);
    if let Err(e) = result {
        tracing::error!("Preview failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_options() {
        let options = Options::parse(args(&["intro.ron", "scene.ron", "--wrap", "loop", "--duration", "4"])).unwrap();
        assert_eq!(options.cutscene, PathBuf::from("intro.ron"));
        assert_eq!(options.wrap, WrapMode::Loop);
        assert_eq!(options.duration, Some(4.0));
        assert!(options.settings.is_none());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Options::parse(args(&["only_one.ron"])).is_err());
        assert!(Options::parse(args(&["a.ron", "b.ron", "--wrap", "bounce"])).is_err());
        assert!(Options::parse(args(&["a.ron", "b.ron", "--duration"])).is_err());
    }
}
