use std::io;

use derive_more::{Display, Error, From};

use super::{session::SessionState, shader::ShaderStage};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Upper bound on the size of a compile or link diagnostic kept around for logging.
pub const MAX_INFO_LOG: usize = 1024;

/// Everything that can go wrong while turning shader source into a linked program.
///
/// None of these are fatal to the process; the caller decides whether to keep running
/// with the previous program.
#[derive(Debug, Display, Error)]
pub enum ShaderError {
	#[display(fmt = "couldn't read shader `{}`: {}", origin, source)]
	Io { origin: String, source: io::Error },

	#[display(fmt = "{} shader `{}` failed to compile:\n{}", stage, origin, log)]
	Compile { origin: String, stage: ShaderStage, log: String },

	#[display(fmt = "shader program failed to link:\n{}", log)]
	Link { log: String },
}

impl ShaderError {
	/// The backend diagnostic text, if there is one.
	pub fn log(&self) -> Option<&str> {
		match self {
			ShaderError::Io { .. } => None,
			ShaderError::Compile { log, .. } | ShaderError::Link { log } => Some(log),
		}
	}
}

#[derive(Debug, Display, Error, From)]
pub enum SessionError {
	#[display(fmt = "`{}` isn't allowed while the session is {:?}", operation, state)]
	#[from(ignore)]
	InvalidState { operation: &'static str, state: SessionState },

	#[display(fmt = "{}", _0)]
	Shader(ShaderError),
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Cut a backend diagnostic down to [`MAX_INFO_LOG`] bytes without splitting a character.
pub fn bounded_log(log: &str) -> String {
	let log = log.trim_end();
	if log.len() <= MAX_INFO_LOG {
		return log.to_owned();
	}

	let mut end = MAX_INFO_LOG;
	while !log.is_char_boundary(end) {
		end -= 1;
	}
	log[..end].to_owned()
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/
