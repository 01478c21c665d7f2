fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/metrics.proto");

    let protoc_path = protoc_bin_vendored::protoc_bin_path()?;

    unsafe {
        std::env::set_var("PROTOC", protoc_path);
    }

    // Ordered maps keep the encoded bytes stable between runs.
    prost_build::Config::new()
        .btree_map(["."])
        .compile_protos(&["proto/metrics.proto"], &["proto/"])?;

    Ok(())
}
