#![allow(dead_code)]

use std::{
	fs,
	path::PathBuf,
	time::{SystemTime, UNIX_EPOCH},
};

use shader_sandbox::{
	HeadlessBackend, HeadlessSurface, RenderSession, SessionError, ShaderSource, ShaderStage, StartupPolicy,
};

pub const VERTEX: &str = "#version 450
layout(location = 0) in vec3 aPos;
layout(location = 0) out vec2 vUv;
void main() {
	vUv = aPos.xy * 0.5 + 0.5;
	gl_Position = vec4(aPos, 1.0);
}
";

/// Paints `u_albedo * u_roughness`, pulsing with `u_time` while `u_mouseMove` is on.
pub const ALBEDO: &str = "#version 450
layout(location = 0) in vec2 vUv;
layout(location = 0) out vec4 fragColor;
layout(set = 0, binding = 0) uniform Params {
	vec3 u_albedo;
	float u_roughness;
	int u_time;
	int u_mouseMove;
};
void main() {
	fragColor = vec4(u_albedo * u_roughness, 1.0);
	if (u_mouseMove != 0) {
		fragColor.rgb *= 0.5 + 0.5 * sin(float(u_time));
	}
}
";

pub const GRADIENT: &str = "#version 450
layout(location = 0) in vec2 vUv;
layout(location = 0) out vec4 fragColor;
layout(set = 0, binding = 0) uniform Params { float u_ambient; };
void main() {
	fragColor = vec4(vUv, u_ambient, 1.0);
}
";

pub const BROKEN: &str = "#version 450
layout(location = 0) out vec4 fragColor;
void main() {
	fragColor = vec4(1.0) +;
}
";

pub fn vertex() -> ShaderSource {
	ShaderSource::inline("quad.vert", VERTEX, ShaderStage::Vertex)
}

pub fn fragment(name: &str, text: &str) -> ShaderSource {
	ShaderSource::inline(name, text, ShaderStage::Fragment)
}

pub fn headless_session(
	fragment: ShaderSource,
	policy: StartupPolicy,
) -> Result<RenderSession<HeadlessBackend, HeadlessSurface>, SessionError> {
	RenderSession::new(
		HeadlessBackend::new(),
		HeadlessSurface::new(320, 200),
		None,
		vertex(),
		fragment,
		policy,
	)
}

pub fn one_frame(session: &mut RenderSession<HeadlessBackend, HeadlessSurface>) {
	session.begin_frame().unwrap();
	session.draw().unwrap();
	session.end_frame().unwrap();
}

/// A fresh directory under the system temp dir.
pub fn scratch_dir(tag: &str) -> PathBuf {
	let nonce = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|elapsed| elapsed.as_nanos())
		.unwrap_or_default();

	let dir = std::env::temp_dir().join(format!("shader-sandbox-{tag}-{nonce}"));
	fs::create_dir_all(&dir).unwrap();
	dir
}
