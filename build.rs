fn main() {
    // Bindings are only generated when building against the vendor library.
    #[cfg(feature = "caen")]
    {
        use std::env;
        use std::path::PathBuf;

        println!("cargo:rerun-if-changed=wrapper.h");
        println!("cargo:rerun-if-env-changed=CAEN_DGTZ_INCLUDE_DIR");
        println!("cargo:rerun-if-env-changed=CAEN_DGTZ_LIB_DIR");

        if let Ok(lib_dir) = env::var("CAEN_DGTZ_LIB_DIR") {
            println!("cargo:rustc-link-search=native={lib_dir}");
        }
        println!("cargo:rustc-link-lib=CAENDigitizer");

        let mut builder = bindgen::Builder::default()
            .header("wrapper.h")
            .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
            .allowlist_function("CAEN_DGTZ_.*")
            .allowlist_type("CAEN_DGTZ_.*")
            .allowlist_var("CAEN_DGTZ_.*");
        if let Ok(include_dir) = env::var("CAEN_DGTZ_INCLUDE_DIR") {
            builder = builder.clang_arg(format!("-I{include_dir}"));
        }
        let bindings = builder
            .generate()
            .expect("Unable to generate CAENDigitizer bindings");

        let out_path = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
        bindings
            .write_to_file(out_path.join("bindings.rs"))
            .expect("Couldn't write bindings!");
    }
}
