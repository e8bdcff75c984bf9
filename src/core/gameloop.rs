use std::{
	path::Path,
	time::{Duration, Instant},
};

use anyhow::{Context, Result};
use log::{debug, info, trace};

use super::{
	backend::{headless::HeadlessBackend, wgpu_backend::WgpuBackend, Backend},
	config::{SceneConfig, StartupPolicy},
	display::{HeadlessSurface, Surface, WinitSurface},
	error::SessionError,
	program::Program,
	session::RenderSession,
	ui::{show_panel, FrameState, Gui, PanelResponse, PanelStatus},
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(Debug, Copy, Clone)]
pub struct FrameClock {
	start_time: Instant,
	last_frame_time: Instant,

	pub dt: Duration,
	pub counter_frame: u64,

	pub fps: f32,
	pub smooth_fps: f32,
}

impl FrameClock {
	const SMOOTH_RESPONSIVENESS: f32 = 0.05;
	const REFERENCE_FPS: f32 = 60.0;

	pub fn new() -> Self {
		Self::default()
	}

	/// Mark the start of a new frame.
	pub fn tick(&mut self) {
		let now = Instant::now();
		self.tick_at(now);
	}

	fn tick_at(&mut self, now: Instant) {
		self.dt = now.saturating_duration_since(self.last_frame_time);
		self.last_frame_time = now;
		self.counter_frame += 1;

		if self.dt > Duration::ZERO {
			self.fps = 1.0 / self.dt.as_secs_f32();
			self.smooth_fps = self.smoothed(self.smooth_fps, self.fps);
		}
	}

	pub fn elapsed(&self) -> Duration {
		self.last_frame_time.saturating_duration_since(self.start_time)
	}

	pub fn smoothed(&self, smoothed: f32, raw: f32) -> f32 {
		let response = (Self::SMOOTH_RESPONSIVENESS * Self::REFERENCE_FPS * self.dt.as_secs_f32()).min(1.0);
		(1.0 - response) * smoothed + response * raw
	}
}

impl Default for FrameClock {
	fn default() -> Self {
		Self {
			start_time: Instant::now(),
			last_frame_time: Instant::now(),
			dt: Default::default(),
			counter_frame: Default::default(),
			fps: Default::default(),
			smooth_fps: Default::default(),
		}
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Run one frame of `scene`: begin, panel, uniforms, draw, end.
///
/// A recompile asked for by the panel happens once the frame is over, while the session
/// is idle. Its failure is not an error of the frame, the old program keeps running.
pub fn frame<B: Backend, S: Surface>(
	session: &mut RenderSession<B, S>,
	scene: &SceneConfig,
	state: &mut FrameState,
) -> Result<PanelResponse, SessionError> {
	session.begin_frame()?;

	state.cursor = session.surface().cursor_position();
	state.resolution = session.surface().size();

	let response = match session.ui_context() {
		Some(ctx) if scene.show_ui => show_panel(
			ctx,
			scene,
			state,
			PanelStatus {
				fallback: session.is_fallback(),
				last_error: session.last_error(),
			},
		),
		_ => PanelResponse::default(),
	};

	if response.fragment_changed {
		if let Some(fragment) = scene.fragment_source(state.selected_fragment) {
			session.set_fragment_source(fragment);
		}
	}

	for (name, value) in state.uniforms(scene) {
		session.set_uniform(name, value);
	}

	session.draw()?;
	session.end_frame()?;
	state.frame += 1;

	if response.recompile {
		match session.recompile() {
			Err(SessionError::Shader(err)) => trace!("Recompile failed: {}", err),
			other => other?,
		}
	}

	Ok(response)
}

/// Open a window and preview `scene` until it's closed.
pub fn run_window(scene: &SceneConfig) -> Result<()> {
	let surface = WinitSurface::new(&scene.window)?;
	let backend = WgpuBackend::for_window(surface.window())?;
	let gui = scene.show_ui.then(Gui::new);

	let mut session = RenderSession::new(
		backend,
		surface,
		gui,
		scene.vertex_source(),
		scene.initial_fragment_source(),
		scene.on_startup_failure,
	)
	.context("Couldn't start the preview")?;
	session.set_clear_color(scene.clear_color);

	let mut state = FrameState::new(scene);
	let mut clock = FrameClock::new();

	info!("Starting render loop");

	while session.should_continue() {
		clock.tick();
		state.elapsed = clock.elapsed().as_secs_f32();
		state.fps = clock.smooth_fps;

		frame(&mut session, scene, &mut state)?;
	}

	debug!("Rendered {} frames", clock.counter_frame);
	session.shutdown();
	Ok(())
}

/// Build the scene's vertex shader against every fragment shader it lists, without a GPU.
///
/// Returns whether everything built. Diagnostics go to stderr.
pub fn check(scene: &SceneConfig) -> bool {
	let mut backend = HeadlessBackend::new();
	let vertex = scene.vertex_source();
	let mut all_ok = true;

	for index in 0..scene.fragment_shaders.len() {
		let Some(fragment) = scene.fragment_source(index) else {
			continue;
		};

		match Program::build(&mut backend, &vertex, &fragment) {
			Ok(program) => {
				println!("ok    {}", fragment.origin());
				program.release(&mut backend);
			}
			Err(err) => {
				println!("FAIL  {}", fragment.origin());
				eprintln!("{}\n", err);
				all_ok = false;
			}
		}
	}

	all_ok
}

/// Render the first frame of `scene` offscreen and save it as an image.
pub fn snapshot(scene: &SceneConfig, output: &Path) -> Result<()> {
	let (width, height) = scene.window.size;

	let backend = WgpuBackend::offscreen(width, height)?;
	let surface = HeadlessSurface::new(width, height).with_frame_limit(1);

	let mut session = RenderSession::new(
		backend,
		surface,
		None,
		scene.vertex_source(),
		scene.initial_fragment_source(),
		StartupPolicy::Abort,
	)?;
	session.set_clear_color(scene.clear_color);

	let mut state = FrameState::new(scene);
	frame(&mut session, scene, &mut state)?;

	let backend = session.shutdown();
	let image = backend.read_pixels()?;
	image
		.save(output)
		.with_context(|| format!("Couldn't write snapshot to `{}`", output.display()))?;

	info!("Wrote {}x{} snapshot to `{}`", width, height, output.display());
	Ok(())
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn the_clock_smooths_towards_the_frame_rate() {
		let mut clock = FrameClock::new();
		let start = clock.last_frame_time;

		for frame in 1..=600 {
			clock.tick_at(start + Duration::from_millis(20 * frame));
		}

		assert_eq!(clock.counter_frame, 600);
		assert!((clock.fps - 50.0).abs() < 0.01);
		assert!((clock.smooth_fps - 50.0).abs() < 0.5, "{}", clock.smooth_fps);
		assert!(clock.elapsed() >= Duration::from_secs(12));
	}

	#[test]
	fn clocks_survive_identical_instants() {
		let mut clock = FrameClock::new();
		let now = clock.last_frame_time;

		clock.tick_at(now);
		assert_eq!(clock.fps, 0.0);
		assert!(clock.smooth_fps.is_finite());
	}
}
