// build.rs
// Compiles the GLSL sources under resources/shaders into SPIR-V

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_EXTENSIONS: &[&str] = &["vert", "frag"];

fn main() {
    println!("cargo:rerun-if-changed=../../resources/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let vulkan_sdk = match env::var("VULKAN_SDK") {
        Ok(sdk) => sdk,
        Err(_) => {
            println!("cargo:warning=VULKAN_SDK not set, shader compilation skipped");
            return;
        }
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{}\\Bin\\glslc.exe", vulkan_sdk)
    } else {
        format!("{}/bin/glslc", vulkan_sdk)
    };

    if !Path::new(&glslc).exists() {
        println!("cargo:warning=glslc not found at {}, shader compilation skipped", glslc);
        return;
    }

    let shader_dir = PathBuf::from("../../resources/shaders");
    let target_dir = PathBuf::from("../../target/shaders");

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        println!("cargo:warning=Failed to create {:?}: {}", target_dir, e);
        return;
    }

    let entries = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: No shader directory found at: {:?}", shader_dir);
            return;
        }
    };

    let mut compiled_count = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_shader = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| SHADER_EXTENSIONS.contains(&ext));
        if !is_shader {
            continue;
        }

        // mesh.vert -> mesh.vert.spv, so stages sharing a stem do not collide
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let out_file = target_dir.join(format!("{}.spv", file_name));

        if !needs_compile(&path, &out_file) {
            eprintln!("info: Shader {} is up to date", file_name);
            continue;
        }

        match Command::new(&glslc).arg(&path).arg("-o").arg(&out_file).status() {
            Ok(status) if status.success() => {
                eprintln!("info: Compiled {} -> {:?}", file_name, out_file);
                compiled_count += 1;
            }
            Ok(status) => {
                panic!("glslc failed for {:?} with exit code {}", path, status.code().unwrap_or(-1));
            }
            Err(e) => {
                panic!("Failed to run glslc for {:?}: {}", path, e);
            }
        }
    }

    eprintln!("info: Compiled {} shader(s)", compiled_count);
}

fn needs_compile(source: &Path, output: &Path) -> bool {
    match (
        std::fs::metadata(source).and_then(|meta| meta.modified()),
        std::fs::metadata(output).and_then(|meta| meta.modified()),
    ) {
        (Ok(source_time), Ok(output_time)) => source_time > output_time,
        _ => true,
    }
}
