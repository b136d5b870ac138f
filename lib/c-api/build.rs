use cbindgen::{Builder, Language};
use std::env;
use std::path::PathBuf;

const PRE_HEADER: &str = r#"
// The libhdfs C header file, generated from the Rust sources.
//
// Every function returning a pointer returns NULL on failure, every
// function returning an integer returns -1. The failure is recorded for
// the calling thread: see `hdfsGetLastError`.
"#;

fn main() {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=build.rs");

    let (Ok(crate_dir), Ok(out_dir)) = (env::var("CARGO_MANIFEST_DIR"), env::var("OUT_DIR")) else {
        println!("cargo:warning=CARGO_MANIFEST_DIR or OUT_DIR is not set, skipping hdfs.h");
        return;
    };
    build_hdfs_header(&crate_dir, &out_dir);
}

fn build_hdfs_header(crate_dir: &str, out_dir: &str) {
    let mut out_header_file = PathBuf::from(out_dir);
    out_header_file.push("hdfs.h");

    let bindings = Builder::new()
        .with_language(Language::C)
        .with_crate(crate_dir)
        .with_include_guard("hdfs_H")
        .with_header(PRE_HEADER)
        .with_sys_include("stdint.h")
        .with_sys_include("stddef.h")
        .with_sys_include("time.h")
        .with_sys_include("errno.h")
        .with_cpp_compat(true)
        .with_documentation(true)
        .generate();

    match bindings {
        Ok(bindings) => {
            bindings.write_to_file(&out_header_file);
        }
        Err(e) => println!("cargo:warning=unable to generate hdfs.h: {e}"),
    }
}
