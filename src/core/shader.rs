use std::{
	collections::HashSet,
	fmt, fs,
	path::{Path, PathBuf},
	sync::OnceLock,
};

use derive_more::Display;
use log::{error, info};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{
	backend::{Backend, StageHandle},
	error::{bounded_log, ShaderError},
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderStage {
	#[display(fmt = "vertex")]
	Vertex,
	#[display(fmt = "fragment")]
	Fragment,
}

impl From<ShaderStage> for naga::ShaderStage {
	fn from(stage: ShaderStage) -> Self {
		match stage {
			ShaderStage::Vertex => naga::ShaderStage::Vertex,
			ShaderStage::Fragment => naga::ShaderStage::Fragment,
		}
	}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderLanguage {
	/// Vulkan-flavoured GLSL (`#version 450`, explicit `set`/`binding`/`location`).
	Glsl,
	Wgsl,
}

impl ShaderLanguage {
	pub fn from_path(path: impl AsRef<Path>) -> Self {
		match path.as_ref().extension().and_then(|ext| ext.to_str()) {
			Some(ext) if ext.eq_ignore_ascii_case("wgsl") => ShaderLanguage::Wgsl,
			_ => ShaderLanguage::Glsl,
		}
	}
}

/// Where the text of a shader comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShaderOrigin {
	File(PathBuf),
	/// Text that lives in the binary (embedded assets, tests). Taken verbatim, includes
	/// aren't expanded.
	Inline { name: String, text: String },
}

impl fmt::Display for ShaderOrigin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ShaderOrigin::File(path) => write!(f, "{}", path.display()),
			ShaderOrigin::Inline { name, .. } => write!(f, "{}", name),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSource {
	origin: ShaderOrigin,
	stage: ShaderStage,
	language: ShaderLanguage,
}

impl ShaderSource {
	pub fn file(path: impl Into<PathBuf>, stage: ShaderStage) -> Self {
		let path = path.into();

		Self {
			language: ShaderLanguage::from_path(&path),
			origin: ShaderOrigin::File(path),
			stage,
		}
	}

	/// `name` doubles as the origin shown in diagnostics and picks the language by its extension.
	pub fn inline(name: impl Into<String>, text: impl Into<String>, stage: ShaderStage) -> Self {
		let name = name.into();

		Self {
			language: ShaderLanguage::from_path(&name),
			origin: ShaderOrigin::Inline {
				name,
				text: text.into(),
			},
			stage,
		}
	}

	pub fn origin(&self) -> &ShaderOrigin {
		&self.origin
	}

	pub fn stage(&self) -> ShaderStage {
		self.stage
	}

	pub fn language(&self) -> ShaderLanguage {
		self.language
	}

	pub fn path(&self) -> Option<&Path> {
		match &self.origin {
			ShaderOrigin::File(path) => Some(path),
			ShaderOrigin::Inline { .. } => None,
		}
	}

	/// The full text of the shader, with every `#include "path"` line replaced by the
	/// (expanded) contents of that file.
	///
	/// Include paths are relative to the including file. A file is only ever included once,
	/// later includes of it (cycles included) expand to nothing.
	pub fn read(&self) -> Result<String, ShaderError> {
		match &self.origin {
			ShaderOrigin::Inline { text, .. } => Ok(text.clone()),
			ShaderOrigin::File(path) => {
				let mut blacklist = HashSet::new();
				expand_file(path, &mut blacklist)
			}
		}
	}
}

fn include_regex() -> &'static Regex {
	static INCLUDE: OnceLock<Regex> = OnceLock::new();
	INCLUDE.get_or_init(|| Regex::new(r#"(?m)^[ \t]*#include[ \t]+"(.+?)"[ \t]*\r?$"#).expect("include pattern is valid"))
}

fn expand_file(path: &Path, blacklist: &mut HashSet<PathBuf>) -> Result<String, ShaderError> {
	let io_error = |source| ShaderError::Io {
		origin: path.display().to_string(),
		source,
	};

	// Check that the file wasn't already included
	let canonical = fs::canonicalize(path).map_err(io_error)?;
	if !blacklist.insert(canonical) {
		return Ok(String::new());
	}

	let source = fs::read_to_string(path).map_err(io_error)?;
	let directory = path.parent().unwrap_or(Path::new(""));

	let mut expanded = String::with_capacity(source.len());
	let mut last = 0;

	for captures in include_regex().captures_iter(&source) {
		let (Some(statement), Some(include)) = (captures.get(0), captures.get(1)) else {
			continue;
		};

		expanded.push_str(&source[last..statement.start()]);
		expanded.push_str(&expand_file(&directory.join(include.as_str()), blacklist)?);
		last = statement.end();
	}

	expanded.push_str(&source[last..]);
	Ok(expanded)
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// One successfully compiled stage, owning its backend handle.
///
/// Either link it (which releases it) or [`release`](CompiledStage::release) it; dropping
/// it leaks the backend stage until the backend goes away.
#[derive(Debug)]
pub struct CompiledStage {
	handle: StageHandle,
	stage: ShaderStage,
	origin: String,
	source: String,
}

impl CompiledStage {
	pub fn compile<B: Backend + ?Sized>(backend: &mut B, source: &ShaderSource) -> Result<Self, ShaderError> {
		let origin = source.origin().to_string();

		let text = source.read().map_err(|err| {
			error!("{}", err);
			err
		})?;

		match backend.compile_stage(source.stage(), source.language(), &text) {
			Ok(handle) => {
				info!("Compiled {} shader `{}`", source.stage(), origin);

				Ok(Self {
					handle,
					stage: source.stage(),
					origin,
					source: text,
				})
			}
			Err(log) => {
				let err = ShaderError::Compile {
					origin,
					stage: source.stage(),
					log: bounded_log(&log),
				};
				error!("{}", err);
				Err(err)
			}
		}
	}

	pub fn handle(&self) -> StageHandle {
		self.handle
	}

	pub fn stage(&self) -> ShaderStage {
		self.stage
	}

	pub fn origin(&self) -> &str {
		&self.origin
	}

	/// The include-expanded text that was compiled.
	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn release<B: Backend + ?Sized>(self, backend: &mut B) {
		backend.release_stage(self.handle);
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use std::time::{SystemTime, UNIX_EPOCH};

	use super::*;
	use crate::core::{backend::headless::HeadlessBackend, error::MAX_INFO_LOG};

	fn scratch_dir(name: &str) -> PathBuf {
		let nonce = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
		let dir = std::env::temp_dir().join(format!("shader-sandbox-{}-{}", name, nonce));
		fs::create_dir_all(&dir).unwrap();
		dir
	}

	#[test]
	fn languages_follow_the_extension() {
		assert_eq!(ShaderLanguage::from_path("a/b.wgsl"), ShaderLanguage::Wgsl);
		assert_eq!(ShaderLanguage::from_path("a/b.WGSL"), ShaderLanguage::Wgsl);
		assert_eq!(ShaderLanguage::from_path("a/b.frag"), ShaderLanguage::Glsl);
		assert_eq!(ShaderLanguage::from_path("shader"), ShaderLanguage::Glsl);
	}

	#[test]
	fn includes_are_expanded_once() {
		let dir = scratch_dir("includes");
		fs::create_dir_all(dir.join("lib")).unwrap();

		fs::write(dir.join("lib/consts.glsl"), "const float PI = 3.14159;\n").unwrap();
		fs::write(
			dir.join("lib/light.glsl"),
			"#include \"consts.glsl\"\nfloat light() { return PI; }\n",
		)
		.unwrap();
		fs::write(
			dir.join("main.frag"),
			"#version 450\n#include \"lib/light.glsl\"\n#include \"lib/consts.glsl\"\nvoid main() {}\n",
		)
		.unwrap();

		let text = ShaderSource::file(dir.join("main.frag"), ShaderStage::Fragment)
			.read()
			.unwrap();

		assert_eq!(text.matches("const float PI").count(), 1);
		assert!(text.find("const float PI").unwrap() < text.find("float light()").unwrap());
		assert!(!text.contains("#include"));
	}

	#[test]
	fn include_cycles_terminate() {
		let dir = scratch_dir("cycles");
		fs::write(dir.join("a.glsl"), "// a\n#include \"b.glsl\"\n").unwrap();
		fs::write(dir.join("b.glsl"), "// b\n#include \"a.glsl\"\n").unwrap();

		let text = ShaderSource::file(dir.join("a.glsl"), ShaderStage::Fragment)
			.read()
			.unwrap();

		assert_eq!(text, "// a\n// b\n\n\n");
	}

	#[test]
	fn missing_includes_name_the_include() {
		let dir = scratch_dir("missing");
		fs::write(dir.join("main.frag"), "#include \"nowhere.glsl\"\n").unwrap();

		let err = ShaderSource::file(dir.join("main.frag"), ShaderStage::Fragment)
			.read()
			.unwrap_err();

		match err {
			ShaderError::Io { origin, .. } => assert!(origin.ends_with("nowhere.glsl"), "{origin}"),
			other => panic!("expected an io error, got {other:?}"),
		}
	}

	#[test]
	fn unreadable_files_fail_to_compile() {
		let mut backend = HeadlessBackend::new();
		let source = ShaderSource::file("definitely/not/here.vert", ShaderStage::Vertex);

		let err = CompiledStage::compile(&mut backend, &source).unwrap_err();

		assert!(matches!(err, ShaderError::Io { .. }));
		assert_eq!(backend.live_resources().stages, 0);
	}

	#[test]
	fn failed_compiles_leave_nothing_behind() {
		let mut backend = HeadlessBackend::new();
		let garbage = "#version 450\n".to_owned() + &"this is not glsl ".repeat(200);
		let source = ShaderSource::inline("broken.frag", garbage, ShaderStage::Fragment);

		let err = CompiledStage::compile(&mut backend, &source).unwrap_err();

		match &err {
			ShaderError::Compile { origin, stage, log } => {
				assert_eq!(origin, "broken.frag");
				assert_eq!(*stage, ShaderStage::Fragment);
				assert!(!log.is_empty() && log.len() <= MAX_INFO_LOG);
			}
			other => panic!("expected a compile error, got {other:?}"),
		}
		assert_eq!(backend.live_resources().stages, 0);
	}

	#[test]
	fn compiled_stages_keep_their_source() {
		let mut backend = HeadlessBackend::new();
		let text = "#version 450\nlayout(location = 0) in vec3 aPos;\nvoid main() { gl_Position = vec4(aPos, 1.0); }\n";
		let source = ShaderSource::inline("quad.vert", text, ShaderStage::Vertex);

		let stage = CompiledStage::compile(&mut backend, &source).unwrap();

		assert_eq!(stage.source(), text);
		assert_eq!(stage.stage(), ShaderStage::Vertex);
		assert_eq!(backend.live_resources().stages, 1);

		stage.release(&mut backend);
		assert_eq!(backend.live_resources().stages, 0);
	}
}
