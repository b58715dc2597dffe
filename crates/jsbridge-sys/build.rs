use std::env;
use std::fs;
use std::path::{Path, PathBuf};

// Pinned bun-webkit autobuild from oven-sh/WebKit. Override with BUN_WEBKIT_VERSION.
const BUN_WEBKIT_VERSION: &str = "aaf3f80b1cc701b412f8abfb7c7f413644a229ff";

const LINUX_SYSTEM_LIBS: &[&str] = &["stdc++", "atomic", "dl", "pthread", "m"];

const WINDOWS_SYSTEM_LIBS: &[&str] = &[
    "winmm", "bcrypt", "ntdll", "userenv", "dbghelp", "crypt32", "wsock32", "ws2_32",
    "advapi32", "ole32", "oleaut32", "uuid", "shell32",
];

fn main() {
    println!("cargo:rustc-check-cfg=cfg(has_bmalloc)");
    println!("cargo:rerun-if-env-changed=BUN_WEBKIT_VERSION");
    println!("cargo:rerun-if-changed=build.rs");

    let target_os = env::var("CARGO_CFG_TARGET_OS").expect("CARGO_CFG_TARGET_OS not set");
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").expect("CARGO_CFG_TARGET_ARCH not set");

    match (target_os.as_str(), target_arch.as_str()) {
        ("macos", _) => link_system_framework(),
        ("linux", "x86_64") => link_bun_webkit("linux", "amd64"),
        ("linux", "aarch64") => link_bun_webkit("linux", "arm64"),
        ("windows", "x86_64") => link_bun_webkit("windows", "amd64"),
        (os, arch) => panic!("JavaScriptCore is not available for {os}/{arch}"),
    }
}

/// macOS ships JavaScriptCore as a system framework.
fn link_system_framework() {
    println!("cargo:rustc-link-lib=framework=JavaScriptCore");

    let sdk = std::process::Command::new("xcrun")
        .arg("--show-sdk-path")
        .output();
    if let Ok(out) = sdk {
        let sdk_path = String::from_utf8_lossy(&out.stdout);
        println!(
            "cargo:rustc-link-search=framework={}/System/Library/Frameworks",
            sdk_path.trim()
        );
    }
}

fn link_bun_webkit(os: &str, arch: &str) {
    let root = fetch_bun_webkit(os, arch);
    let lib_dir = locate_lib_dir(&root);
    println!("cargo:rustc-link-search=native={}", lib_dir.display());

    println!("cargo:rustc-link-lib=static=JavaScriptCore");
    println!("cargo:rustc-link-lib=static=WTF");

    // Some Windows builds fold bmalloc into WTF.
    if has_static_lib(&lib_dir, "bmalloc") {
        println!("cargo:rustc-link-lib=static=bmalloc");
        println!("cargo:rustc-cfg=has_bmalloc");
    }

    // Windows archives use the "sicu*" prefix.
    let icu: &[&str] = if has_static_lib(&lib_dir, "icudata") {
        &["icudata", "icui18n", "icuuc"]
    } else if has_static_lib(&lib_dir, "sicudt") {
        &["sicudt", "sicuin", "sicuuc"]
    } else {
        println!("cargo:warning=ICU archives not found in {}", lib_dir.display());
        &[]
    };
    for lib in icu {
        println!("cargo:rustc-link-lib=static={lib}");
    }

    match os {
        "linux" => {
            for lib in LINUX_SYSTEM_LIBS {
                println!("cargo:rustc-link-lib={lib}");
            }
        }
        "windows" => {
            for lib in WINDOWS_SYSTEM_LIBS {
                println!("cargo:rustc-link-lib={lib}");
            }
            println!("cargo:rustc-link-arg=/NODEFAULTLIB:libcmt");
            println!("cargo:rustc-link-lib=msvcrt");
        }
        _ => {}
    }

    let include_dir = root.join("include");
    if include_dir.exists() {
        println!("cargo:include={}", include_dir.display());
    }
}

fn fetch_bun_webkit(os: &str, arch: &str) -> PathBuf {
    let version =
        env::var("BUN_WEBKIT_VERSION").unwrap_or_else(|_| BUN_WEBKIT_VERSION.to_string());
    let target_dir = cache_root().join(&version).join(format!("{os}-{arch}"));
    let marker = target_dir.join(".downloaded");

    if marker.exists() {
        return target_dir;
    }

    let url = format!(
        "https://github.com/oven-sh/WebKit/releases/download/autobuild-{version}/bun-webkit-{os}-{arch}.tar.gz"
    );
    println!("cargo:warning=Downloading bun-webkit from {url}");

    fs::create_dir_all(&target_dir).expect("failed to create bun-webkit cache directory");

    let response = ureq::get(&url)
        .call()
        .unwrap_or_else(|e| panic!("failed to download bun-webkit from {url}: {e}"));

    // Stream the archive straight into the decoder; the tarball is large.
    let decoder = flate2::read::GzDecoder::new(response.into_body().into_reader());
    tar::Archive::new(decoder)
        .unpack(&target_dir)
        .expect("failed to unpack bun-webkit archive");

    fs::write(&marker, "").expect("failed to write bun-webkit marker");
    target_dir
}

fn locate_lib_dir(root: &Path) -> PathBuf {
    let direct = root.join("lib");
    if direct.exists() {
        return direct;
    }

    fs::read_dir(root)
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path().join("lib"))
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| root.to_path_buf())
}

fn has_static_lib(lib_dir: &Path, name: &str) -> bool {
    let unix_prefix = format!("lib{name}");
    fs::read_dir(lib_dir)
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .any(|file| {
            (file.starts_with(name) || file.starts_with(&unix_prefix))
                && (file.ends_with(".a") || file.ends_with(".lib"))
        })
}

fn cache_root() -> PathBuf {
    if let Ok(cargo_home) = env::var("CARGO_HOME") {
        return PathBuf::from(cargo_home).join("cache").join("bun-webkit");
    }

    for var in ["HOME", "USERPROFILE"] {
        if let Ok(home) = env::var(var) {
            return PathBuf::from(home)
                .join(".cargo")
                .join("cache")
                .join("bun-webkit");
        }
    }

    PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set")).join("bun-webkit-cache")
}
