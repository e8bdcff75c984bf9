use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use winit::{
	dpi::{PhysicalPosition, PhysicalSize},
	event::{Event, WindowEvent},
	event_loop::EventLoop,
	platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
	window::{Window, WindowBuilder},
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
	pub title: String,
	pub size: (u32, u32),
	pub resizable: bool,
}

impl Default for WindowSettings {
	fn default() -> Self {
		Self {
			title: "Hello, Window!".into(),
			size: (1200, 650),
			resizable: true,
		}
	}
}

/// The window the sandbox renders into, seen from the render loop.
pub trait Surface {
	/// Drain pending events without blocking.
	fn poll_events(&mut self);

	fn should_close(&self) -> bool;

	fn request_close(&mut self);

	fn size(&self) -> (u32, u32);

	/// Cursor position in physical pixels from the top left corner.
	fn cursor_position(&self) -> (f64, f64);

	/// The latest size the surface was resized to since the last call, if any.
	fn take_resize(&mut self) -> Option<(u32, u32)>;

	/// Start capturing input for the UI. `ctx` is the context the input will be fed to.
	fn attach_ui(&mut self, _ctx: &egui::Context) {}

	/// Everything the UI should know about since the last UI frame.
	fn take_ui_input(&mut self) -> egui::RawInput;

	/// Apply what the UI asked for (cursor icon, clipboard, IME).
	fn handle_ui_output(&mut self, _output: egui::PlatformOutput) {}

	/// Called right before the frame is presented.
	fn pre_present(&self) {}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// A winit window driven with `pump_events`, so the render loop stays in charge.
pub struct WinitSurface {
	event_loop: EventLoop<()>,
	// Window needs to be an arc so that a surface can be created from it safely
	window: Arc<Window>,
	egui: Option<egui_winit::State>,

	close_requested: bool,
	pending_resize: Option<(u32, u32)>,
	cursor: (f64, f64),
}

impl WinitSurface {
	pub fn new(settings: &WindowSettings) -> Result<Self> {
		let event_loop = EventLoop::new().context("Couldn't create winit event loop")?;

		let window = WindowBuilder::new()
			.with_title(&settings.title)
			.with_inner_size(PhysicalSize::new(settings.size.0, settings.size.1))
			.with_resizable(settings.resizable)
			.build(&event_loop)
			.context("Couldn't build winit window from event loop")?;

		// Center the window
		if let Some(monitor) = window.current_monitor() {
			let screen_size = monitor.size();
			let window_size = window.outer_size();

			window.set_outer_position(PhysicalPosition {
				x: f64::from(screen_size.width.saturating_sub(window_size.width)) / 2.
					+ f64::from(monitor.position().x),
				y: f64::from(screen_size.height.saturating_sub(window_size.height)) / 2.
					+ f64::from(monitor.position().y),
			});
		}

		debug!("Opened window `{}` at {}x{}", settings.title, settings.size.0, settings.size.1);

		Ok(Self {
			event_loop,
			window: Arc::new(window),
			egui: None,
			close_requested: false,
			pending_resize: None,
			cursor: (0.0, 0.0),
		})
	}

	pub fn window(&self) -> Arc<Window> {
		self.window.clone()
	}
}

impl Surface for WinitSurface {
	fn poll_events(&mut self) {
		let Self {
			event_loop,
			window,
			egui,
			close_requested,
			pending_resize,
			cursor,
		} = self;

		let status = event_loop.pump_events(Some(Duration::ZERO), |event, _| {
			let Event::WindowEvent { window_id, event } = event else {
				return;
			};

			if window_id != window.id() {
				return;
			}

			if let Some(state) = egui.as_mut() {
				let _ = state.on_window_event(window, &event);
			}

			match event {
				WindowEvent::CloseRequested => *close_requested = true,
				WindowEvent::Resized(size) => *pending_resize = Some((size.width, size.height)),
				WindowEvent::CursorMoved { position, .. } => *cursor = (position.x, position.y),
				_ => {}
			}
		});

		if let PumpStatus::Exit(code) = status {
			trace!("Event loop exited with {}", code);
			*close_requested = true;
		}
	}

	fn should_close(&self) -> bool {
		self.close_requested
	}

	fn request_close(&mut self) {
		self.close_requested = true;
	}

	fn size(&self) -> (u32, u32) {
		let size = self.window.inner_size();
		(size.width, size.height)
	}

	fn cursor_position(&self) -> (f64, f64) {
		self.cursor
	}

	fn take_resize(&mut self) -> Option<(u32, u32)> {
		self.pending_resize.take()
	}

	fn attach_ui(&mut self, ctx: &egui::Context) {
		self.egui = Some(egui_winit::State::new(
			ctx.clone(),
			egui::ViewportId::ROOT,
			&*self.window,
			Some(self.window.scale_factor() as f32),
			None,
		));
	}

	fn take_ui_input(&mut self) -> egui::RawInput {
		match self.egui.as_mut() {
			Some(state) => state.take_egui_input(&self.window),
			None => egui::RawInput::default(),
		}
	}

	fn handle_ui_output(&mut self, output: egui::PlatformOutput) {
		if let Some(state) = self.egui.as_mut() {
			state.handle_platform_output(&self.window, output);
		}
	}

	fn pre_present(&self) {
		self.window.pre_present_notify();
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// A surface without a window, for offscreen runs and tests.
///
/// It closes on its own after `frame_limit` polls, and everything a window would report
/// (resizes, cursor moves, UI events) can be scripted.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
	size: (u32, u32),
	cursor: (f64, f64),
	pending_resize: Option<(u32, u32)>,
	ui_events: Vec<egui::Event>,

	polls: u64,
	frame_limit: Option<u64>,
	close_requested: bool,
}

impl HeadlessSurface {
	pub fn new(width: u32, height: u32) -> Self {
		Self {
			size: (width, height),
			..Default::default()
		}
	}

	/// Report a close request once `frames` event polls have happened.
	pub fn with_frame_limit(mut self, frames: u64) -> Self {
		self.frame_limit = Some(frames);
		self
	}

	pub fn polls(&self) -> u64 {
		self.polls
	}

	pub fn resize(&mut self, width: u32, height: u32) {
		self.size = (width, height);
		self.pending_resize = Some((width, height));
	}

	pub fn move_cursor(&mut self, x: f64, y: f64) {
		self.cursor = (x, y);
	}

	/// Queue an event for the next UI frame.
	pub fn push_ui_event(&mut self, event: egui::Event) {
		self.ui_events.push(event);
	}
}

impl Surface for HeadlessSurface {
	fn poll_events(&mut self) {
		self.polls += 1;

		if self.frame_limit.is_some_and(|limit| self.polls >= limit) {
			self.close_requested = true;
		}
	}

	fn should_close(&self) -> bool {
		self.close_requested
	}

	fn request_close(&mut self) {
		self.close_requested = true;
	}

	fn size(&self) -> (u32, u32) {
		self.size
	}

	fn cursor_position(&self) -> (f64, f64) {
		self.cursor
	}

	fn take_resize(&mut self) -> Option<(u32, u32)> {
		self.pending_resize.take()
	}

	fn take_ui_input(&mut self) -> egui::RawInput {
		egui::RawInput {
			screen_rect: Some(egui::Rect::from_min_size(
				egui::Pos2::ZERO,
				egui::vec2(self.size.0 as f32, self.size.1 as f32),
			)),
			events: std::mem::take(&mut self.ui_events),
			..Default::default()
		}
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/
