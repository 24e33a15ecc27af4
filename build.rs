use std::env;
use std::path::PathBuf;

/// Point Windows builds at a vcpkg FFmpeg install when FFMPEG_DIR is unset.
fn main() {
    for variable in ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_TRIPLET"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    if env::var("CARGO_CFG_TARGET_OS").unwrap_or_default() != "windows"
        || env::var_os("FFMPEG_DIR").is_some()
    {
        return;
    }

    let Ok(vcpkg_root) = env::var("VCPKG_ROOT") else {
        println!("cargo:warning=FFMPEG_DIR is not set; install FFmpeg via vcpkg and set FFMPEG_DIR.");
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let install = PathBuf::from(vcpkg_root).join("installed").join(triplet);
    if install.exists() {
        println!(
            "cargo:warning=Found vcpkg FFmpeg at {0}; set FFMPEG_DIR={0} for ffmpeg-sys-next.",
            install.display()
        );
    } else {
        println!("cargo:warning=No vcpkg FFmpeg install at {}.", install.display());
    }
}
