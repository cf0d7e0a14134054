use callbackgen::CodeGenerator;
use std::env;
use std::path::PathBuf;

/// Types to generate, one output file each, included by the declaring module.
const TARGETS: &[&str] = &["crate::user::User", "crate::feed::Feed"];

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    for target in TARGETS {
        let mut codegen = CodeGenerator::new();

        codegen.set_header(format!(
            "Generated callback methods for `{target}`.\n\
             Code generated by callbackgen; DO NOT EDIT."
        ));

        codegen
            .add_source_dir(manifest_dir.join("src"))
            .expect("Failed to parse sources");
        codegen.add_type(*target);

        let output = out_dir.join(CodeGenerator::default_output_name(target));
        let generated = codegen
            .write_to_file(&output)
            .expect("Failed to write callbacks");

        for diagnostic in &generated.diagnostics {
            println!("cargo:warning={diagnostic}");
        }
    }

    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=build.rs");
}
