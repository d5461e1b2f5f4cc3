// Build script: GLSL -> SPIR-V for the triangle shaders

use std::process::Command;

/// Stages of the triangle pipeline, compiled next to their sources.
const STAGES: [&str; 2] = ["vert", "frag"];

fn main() {
    let sources = STAGES.map(|stage| format!("shaders/triangle.{stage}"));
    for source in &sources {
        println!("cargo:rerun-if-changed={source}");
    }

    for source in &sources {
        if !compile(source, &format!("{source}.spv")) {
            // No compiler: the app reports the missing .spv at startup.
            break;
        }
    }
}

/// Returns false when glslc is not installed.
fn compile(source: &str, spirv: &str) -> bool {
    let output = match Command::new("glslc").args([source, "-o", spirv]).output() {
        Ok(output) => output,
        Err(e) => {
            println!("cargo:warning=glslc unavailable ({e}), shaders left uncompiled");
            println!("cargo:warning=Install the Vulkan SDK or run glslc on shaders/*.vert|frag");
            return false;
        }
    };

    if !output.status.success() {
        panic!(
            "glslc rejected {source} ({:?}):\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    true
}
