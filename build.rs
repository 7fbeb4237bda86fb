//! Compiles `runtime/anx_rt.c` into a static archive and exposes its path
//! to `src/driver.rs` via `ANX_RUNTIME_LIB_PATH`, so the compiled bytes can
//! be embedded in the `anxc` binary with `include_bytes!` and written back
//! out whenever a user program links against it.

use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").unwrap());

    cc::Build::new()
        .file("runtime/anx_rt.c")
        .warnings(true)
        .compile("anx_rt");

    let lib_path = out_dir.join("libanx_rt.a");
    println!("cargo:rustc-env=ANX_RUNTIME_LIB_PATH={}", lib_path.display());
    println!("cargo:rerun-if-changed=runtime/anx_rt.c");
}
