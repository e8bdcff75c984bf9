use std::{collections::HashSet, io, mem};

use log::{debug, error, info, warn};

use super::{
	backend::{Backend, ProgramHandle},
	config::StartupPolicy,
	display::Surface,
	embed::embedded_shader,
	error::{SessionError, ShaderError},
	program::Program,
	quad::FullscreenQuad,
	shader::{ShaderSource, ShaderStage},
	ui::Gui,
	uniform::UniformValue,
};
use crate::{ShaderAssets, FALLBACK_FRAGMENT, FALLBACK_VERTEX};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
	/// Between frames. The only state in which the program can be swapped.
	Idle,
	FrameActive,
	/// The surface asked to close, nothing more will be rendered.
	Closed,
}

type UnknownUniformHook = Box<dyn FnMut(ProgramHandle, &str)>;

/// A surface, a backend, the active program and the quad it's drawn on, tied together
/// into the frame loop.
///
/// ```text
/// Idle --begin_frame--> FrameActive --end_frame--> Idle
///   |                                               |
///   +------------- should_continue() == false ------+--> Closed
/// ```
pub struct RenderSession<B: Backend, S: Surface> {
	backend: B,
	surface: S,
	gui: Option<Gui>,

	program: Program,
	quad: FullscreenQuad,
	vertex: ShaderSource,
	fragment: ShaderSource,

	state: SessionState,
	fallback: bool,
	last_error: Option<String>,

	on_unknown_uniform: Option<UnknownUniformHook>,
	reported_unknown: HashSet<String>,
}

impl<B: Backend, S: Surface> RenderSession<B, S> {
	/// Build the program from `vertex` and `fragment` and start a session around it.
	///
	/// When the program doesn't build, `policy` decides between running the built-in
	/// fallback program and giving up.
	pub fn new(
		mut backend: B,
		mut surface: S,
		gui: Option<Gui>,
		vertex: ShaderSource,
		fragment: ShaderSource,
		policy: StartupPolicy,
	) -> Result<Self, SessionError> {
		let (width, height) = surface.size();
		backend.resize(width, height);

		if let Some(gui) = &gui {
			surface.attach_ui(gui.context());
		}

		let (program, fallback, last_error) = match Program::build(&mut backend, &vertex, &fragment) {
			Ok(program) => (program, false, None),
			Err(err) if policy == StartupPolicy::Fallback => {
				warn!("Starting with the built-in fallback shader");
				(fallback_program(&mut backend)?, true, Some(err.to_string()))
			}
			Err(err) => return Err(err.into()),
		};

		let quad = FullscreenQuad::new(&mut backend);

		Ok(Self {
			backend,
			surface,
			gui,
			program,
			quad,
			vertex,
			fragment,
			state: SessionState::Idle,
			fallback,
			last_error,
			on_unknown_uniform: None,
			reported_unknown: HashSet::new(),
		})
	}

	fn expect_state(&self, operation: &'static str, expected: SessionState) -> Result<(), SessionError> {
		if self.state == expected {
			Ok(())
		} else {
			Err(SessionError::InvalidState {
				operation,
				state: self.state,
			})
		}
	}

	/// Start a frame: apply a pending resize, clear the target and start capturing UI input.
	pub fn begin_frame(&mut self) -> Result<(), SessionError> {
		self.expect_state("begin_frame", SessionState::Idle)?;

		if let Some((width, height)) = self.surface.take_resize() {
			debug!("Resizing to {}x{}", width, height);
			self.backend.resize(width, height);
		}

		self.backend.begin_frame();

		if let Some(gui) = &mut self.gui {
			gui.begin(self.surface.take_ui_input());
		}

		self.state = SessionState::FrameActive;
		Ok(())
	}

	/// Draw the quad with the active program.
	pub fn draw(&mut self) -> Result<(), SessionError> {
		self.expect_state("draw", SessionState::FrameActive)?;

		self.quad.draw(&mut self.backend, &self.program);
		Ok(())
	}

	/// Finish the UI pass, present the frame and poll the surface.
	pub fn end_frame(&mut self) -> Result<(), SessionError> {
		self.expect_state("end_frame", SessionState::FrameActive)?;

		if let Some(gui) = &mut self.gui {
			let (frame, output) = gui.end();
			self.surface.handle_ui_output(output);
			self.backend.paint_ui(&frame);
		}

		self.surface.pre_present();
		self.backend.end_frame();
		self.surface.poll_events();

		self.state = SessionState::Idle;
		Ok(())
	}

	/// Whether the loop should go on. Once the surface asks to close, the session is
	/// [`Closed`](SessionState::Closed) for good.
	pub fn should_continue(&mut self) -> bool {
		if self.state != SessionState::Closed && self.surface.should_close() {
			info!("Surface closed, ending the session");
			self.state = SessionState::Closed;
		}

		self.state != SessionState::Closed
	}

	/// Rebuild the program from the configured sources and swap it in.
	///
	/// The old program is only released once the new one linked. On failure the old program
	/// stays active and the diagnostic is kept for [`last_error`](Self::last_error).
	pub fn recompile(&mut self) -> Result<(), SessionError> {
		self.expect_state("recompile", SessionState::Idle)?;

		match Program::build(&mut self.backend, &self.vertex, &self.fragment) {
			Ok(program) => {
				let old = mem::replace(&mut self.program, program);
				old.release(&mut self.backend);

				info!("Hot-swapped in {} from `{}`", self.program.handle(), self.fragment.origin());

				self.fallback = false;
				self.last_error = None;
				self.reported_unknown.clear();
				Ok(())
			}
			Err(err) => {
				error!("Recompile failed, keeping {}", self.program.handle());
				self.last_error = Some(err.to_string());
				Err(err.into())
			}
		}
	}

	/// Use `fragment` from the next [`recompile`](Self::recompile) on.
	pub fn set_fragment_source(&mut self, fragment: ShaderSource) {
		debug!("Fragment shader set to `{}`", fragment.origin());
		self.fragment = fragment;
	}

	pub fn fragment_source(&self) -> &ShaderSource {
		&self.fragment
	}

	pub fn vertex_source(&self) -> &ShaderSource {
		&self.vertex
	}

	pub fn set_clear_color(&mut self, color: [f32; 4]) {
		self.backend.set_clear_color(color);
	}

	/// Push `value` to the active program. Returns false when it didn't land.
	///
	/// Names the program doesn't declare are skipped; they're reported to the
	/// [`on_unknown_uniform`](Self::on_unknown_uniform) hook, and logged once per program.
	pub fn set_uniform(&mut self, name: &str, value: UniformValue) -> bool {
		if self.program.set_uniform(&mut self.backend, name, value) {
			return true;
		}

		let handle = self.program.handle();
		if self.backend.uniform_location(handle, name).is_none() {
			if self.reported_unknown.insert(name.to_owned()) {
				debug!("{} doesn't declare `{}`, ignoring it", handle, name);
			}

			if let Some(hook) = &mut self.on_unknown_uniform {
				hook(handle, name);
			}
		}

		false
	}

	pub fn set_int(&mut self, name: &str, value: i32) -> bool {
		self.set_uniform(name, UniformValue::Int(value))
	}

	pub fn set_float(&mut self, name: &str, value: f32) -> bool {
		self.set_uniform(name, UniformValue::Float(value))
	}

	pub fn set_bool(&mut self, name: &str, value: bool) -> bool {
		self.set_uniform(name, UniformValue::Bool(value))
	}

	pub fn set_vec3(&mut self, name: &str, value: [f32; 3]) -> bool {
		self.set_uniform(name, UniformValue::Vec3(value))
	}

	/// Be told about every uniform the active program doesn't declare.
	pub fn on_unknown_uniform(&mut self, hook: impl FnMut(ProgramHandle, &str) + 'static) {
		self.on_unknown_uniform = Some(Box::new(hook));
	}

	pub fn program(&self) -> &Program {
		&self.program
	}

	pub fn backend(&self) -> &B {
		&self.backend
	}

	pub fn backend_mut(&mut self) -> &mut B {
		&mut self.backend
	}

	pub fn surface(&self) -> &S {
		&self.surface
	}

	pub fn surface_mut(&mut self) -> &mut S {
		&mut self.surface
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Whether the built-in fallback program is the active one.
	pub fn is_fallback(&self) -> bool {
		self.fallback
	}

	/// The diagnostic of the last failed build, cleared by a successful recompile.
	pub fn last_error(&self) -> Option<&str> {
		self.last_error.as_deref()
	}

	pub fn ui_context(&self) -> Option<&egui::Context> {
		self.gui.as_ref().map(Gui::context)
	}

	/// Release the program and the quad, and hand the backend back.
	pub fn shutdown(self) -> B {
		let mut backend = self.backend;

		self.program.release(&mut backend);
		self.quad.release(&mut backend);

		backend
	}
}

/// The program used when the configured shaders don't build at startup.
pub fn fallback_program<B: Backend + ?Sized>(backend: &mut B) -> Result<Program, ShaderError> {
	let embedded = |file_path: &str, stage| {
		embedded_shader(&ShaderAssets, file_path, stage).ok_or_else(|| ShaderError::Io {
			origin: file_path.to_owned(),
			source: io::Error::new(io::ErrorKind::NotFound, "not embedded in the binary"),
		})
	};

	let vertex = embedded(FALLBACK_VERTEX, ShaderStage::Vertex)?;
	let fragment = embedded(FALLBACK_FRAGMENT, ShaderStage::Fragment)?;

	Program::build(backend, &vertex, &fragment)
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/
