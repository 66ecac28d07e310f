//! Build script for proto compilation.
//!
//! The generated modules for both protocol versions are committed to the
//! repository, so this only does work when the proto files change.
//!
//! To regenerate: `cargo build --features regenerate-proto`
//!
//! The generated files are placed in `src/tfplugin5.rs` and `src/tfplugin6.rs`.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "regenerate-proto")]
    {
        let out_dir = std::path::PathBuf::from("src");
        tonic_prost_build::configure()
            .build_server(false)
            .out_dir(&out_dir)
            .compile_protos(&["proto/tfplugin5.proto", "proto/tfplugin6.proto"], &["proto"])?;
    }

    println!("cargo:rerun-if-changed=proto/tfplugin5.proto");
    println!("cargo:rerun-if-changed=proto/tfplugin6.proto");

    Ok(())
}
